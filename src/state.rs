use axum::extract::{FromRef, FromRequestParts, State};
use chrono::NaiveDate;
use std::{ops::Deref, sync::Arc};

use crate::{
    config::Config, database::Database, errors::AppError, mailing::Mailer, sessions::Sessions,
};

/// Source of "today". Listings read it once per request.
#[derive(Clone, Copy, Debug)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => chrono::Local::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

pub struct App {
    pub database: Database,
    pub sessions: Sessions,
    pub mailer: Mailer,
    pub clock: Clock,
    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let database = Database::new(&config.database_url)?;
        Ok(Self {
            sessions: Sessions::new(database.clone()),
            mailer: Mailer::new(&config)?,
            clock: Clock::System,
            database,
            config,
        })
    }

    pub fn stub(clock: Clock) -> Result<Self, AppError> {
        let mut app = Self::new(Config::stub())?;
        app.clock = clock;
        Ok(app)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

#[derive(Clone, FromRequestParts)]
#[from_request(via(State))]
pub struct AppState(pub Arc<App>);

impl AppState {
    pub fn new(app: App) -> Self {
        AppState(Arc::new(app))
    }
}

impl Deref for AppState {
    type Target = App;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Database {
        state.database.clone()
    }
}

impl FromRef<AppState> for Sessions {
    fn from_ref(state: &AppState) -> Sessions {
        state.sessions.clone()
    }
}
