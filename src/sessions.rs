use chrono::{Days, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{database::Database, errors::AppError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug)]
pub struct Session(Arc<RwLock<UserSession>>);

impl Session {
    pub async fn is_authenticated(&self) -> bool {
        self.0.read().await.user_pk.is_some()
    }

    pub async fn user_pk(&self) -> Option<i64> {
        self.0.read().await.user_pk
    }

    pub async fn id(&self) -> String {
        self.0.read().await.session_id.to_owned()
    }

    pub async fn csrf_token(&self, secret: &str) -> String {
        generate_token(secret, &self.0.read().await.session_id)
    }

    pub async fn token_is_valid(&self, secret: &str, token: &str) -> bool {
        self.0.read().await.token_is_valid(secret, token)
    }
}

#[derive(Clone, Debug)]
pub struct Sessions(Database);

impl Sessions {
    pub fn new(database: Database) -> Self {
        Self(database)
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let now = Utc::now().naive_utc();
        let session = match UserSession::from_session_id(session_id, &self.0).await? {
            Some(session) if session.expiration > now => session,
            Some(expired) => {
                expired.delete(&self.0).await?;
                return Ok(None);
            }
            None => return Ok(None),
        };
        Ok(Some(Session(Arc::new(RwLock::new(session)))))
    }

    pub async fn create_session(&self, session_expiration: u64) -> Result<Session, AppError> {
        let session = UserSession::new(None, session_expiration);
        session.save(&self.0).await?;
        Ok(Session(Arc::new(RwLock::new(session))))
    }

    pub async fn touch(&self, session: &Session) -> Result<(), AppError> {
        session
            .0
            .write()
            .await
            .update_last_accessed()
            .update(&self.0)
            .await
    }

    /// Attaches the user to the session under a fresh id so a pre-login id can't be reused.
    pub async fn login(&self, session: &Session, user_pk: i64) -> Result<(), AppError> {
        let mut storage = session.0.write().await;
        storage.delete(&self.0).await?;
        storage
            .new_session_id()
            .update_user(Some(user_pk))
            .save(&self.0)
            .await
    }

    pub async fn logout(&self, session: &Session) -> Result<(), AppError> {
        let mut storage = session.0.write().await;
        storage.delete(&self.0).await?;
        storage
            .new_session_id()
            .update_user(None)
            .save(&self.0)
            .await
    }
}

#[derive(Debug, sqlx::FromRow, Clone)]
struct UserSession {
    session_id: String,
    user_pk: Option<i64>,
    last_accessed: NaiveDateTime,
    expiration: NaiveDateTime,
}

impl UserSession {
    fn new(user_pk: Option<i64>, session_expiration: u64) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            session_id: Uuid::now_v7().to_string(),
            user_pk,
            last_accessed: now,
            expiration: now + Days::new(session_expiration),
        }
    }

    fn token_is_valid(&self, secret: &str, token: &str) -> bool {
        let expected = generate_token(secret, &self.session_id);
        !token.is_empty() && expected.eq(token)
    }

    fn new_session_id(&mut self) -> &mut Self {
        self.session_id = Uuid::now_v7().to_string();
        self
    }

    fn update_user(&mut self, user_pk: Option<i64>) -> &mut Self {
        self.user_pk = user_pk;
        self
    }

    fn update_last_accessed(&mut self) -> &mut Self {
        self.last_accessed = Utc::now().naive_utc();
        self
    }

    async fn from_session_id(
        session_id: &str,
        database: &Database,
    ) -> Result<Option<Self>, AppError> {
        Ok(sqlx::query_as(
            "SELECT session_id, user_pk, last_accessed, expiration FROM web_sessions WHERE session_id = $1;",
        )
        .bind(session_id)
        .fetch_optional(&**database)
        .await?)
    }

    async fn save(&self, database: &Database) -> Result<(), AppError> {
        sqlx::query("INSERT INTO web_sessions(session_id, user_pk, last_accessed, expiration) VALUES ($1, $2, $3, $4);")
            .bind(&self.session_id)
            .bind(self.user_pk)
            .bind(self.last_accessed)
            .bind(self.expiration)
            .execute(&**database)
            .await?;
        Ok(())
    }

    async fn update(&self, database: &Database) -> Result<(), AppError> {
        sqlx::query("UPDATE web_sessions SET last_accessed = $1 WHERE session_id = $2;")
            .bind(self.last_accessed)
            .bind(&self.session_id)
            .execute(&**database)
            .await?;
        Ok(())
    }

    async fn delete(&self, database: &Database) -> Result<(), AppError> {
        sqlx::query("DELETE FROM web_sessions WHERE session_id = $1;")
            .bind(&self.session_id)
            .execute(&**database)
            .await?;
        Ok(())
    }
}

fn generate_token(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}
