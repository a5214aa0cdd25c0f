use std::{ops::Deref, str::FromStr};

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool, Transaction,
};

use crate::errors::AppError;

const MIGRATIONS_PATH: &str = "./migrations/principal";

#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Database {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // every connection to `:memory:` is its own database, so pin a single one
        if url.contains(":memory:") {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_lazy_with(options);
            return Ok(Self(pool));
        }

        let options = options.journal_mode(SqliteJournalMode::Wal);
        Ok(Self(SqlitePool::connect_lazy_with(options)))
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        Migrator::new(std::path::Path::new(MIGRATIONS_PATH))
            .await?
            .run(&**self)
            .await?;
        Ok(())
    }

    pub async fn start_transaction(&self) -> Result<Transaction<'_, Sqlite>, AppError> {
        self.begin()
            .await
            .map_err(|e| crate::log_and_wrap_custom_internal!(e))
    }
}

/// A migrated in-memory database for tests.
#[cfg(test)]
pub struct TestDatabase(Database);

#[cfg(test)]
impl Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
impl TestDatabase {
    pub async fn setup() -> Self {
        let database = Database::new("sqlite::memory:").expect("valid in-memory url");
        database
            .run_migrations()
            .await
            .expect("migrations should apply to an empty database");
        Self(database)
    }

    pub fn database(&self) -> &Database {
        &self.0
    }
}
