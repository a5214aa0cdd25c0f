use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{database::Database, errors::AppError};

#[derive(Debug)]
pub struct EmailValidation {
    pub user_pk: i64,
    pub slug: String,
}

impl EmailValidation {
    pub fn new(user_pk: i64) -> Self {
        Self {
            user_pk,
            slug: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> String {
        format!("/user/activate/{}", self.slug)
    }

    pub async fn save(self, tx: &mut SqliteConnection) -> Result<Self, AppError> {
        sqlx::query("INSERT INTO email_validations (user_pk, slug) VALUES ($1, $2);")
            .bind(self.user_pk)
            .bind(&self.slug)
            .execute(tx)
            .await?;
        Ok(self)
    }

    /// Consumes the token, a slug can only be used once.
    pub async fn delete_and_get_user_pk(
        tx: &mut SqliteConnection,
        slug: String,
    ) -> Result<Self, AppError> {
        let user_pk: i64 =
            sqlx::query_scalar("DELETE FROM email_validations WHERE slug = $1 RETURNING user_pk;")
                .bind(&slug)
                .fetch_optional(tx)
                .await?
                .ok_or(AppError::InvalidToken)?;

        Ok(Self { user_pk, slug })
    }
}

#[derive(Debug)]
pub struct PasswordReset {
    pub user_pk: i64,
    pub slug: String,
    pub expiration: NaiveDateTime,
}

impl PasswordReset {
    pub const VALID_FOR_HOURS: i64 = 24;

    pub fn new(user_pk: i64) -> Self {
        Self {
            user_pk,
            slug: Uuid::new_v4().to_string(),
            expiration: Utc::now().naive_utc() + Duration::hours(Self::VALID_FOR_HOURS),
        }
    }

    pub fn path(&self) -> String {
        format!("/user/password-reset/{}", self.slug)
    }

    pub async fn save(self, database: &Database) -> Result<Self, AppError> {
        sqlx::query("INSERT INTO password_resets (user_pk, slug, expiration) VALUES ($1, $2, $3);")
            .bind(self.user_pk)
            .bind(&self.slug)
            .bind(self.expiration)
            .execute(&**database)
            .await?;
        Ok(self)
    }

    pub async fn is_valid(database: &Database, slug: &str) -> Result<bool, AppError> {
        let expiration: Option<NaiveDateTime> =
            sqlx::query_scalar("SELECT expiration FROM password_resets WHERE slug = $1;")
                .bind(slug)
                .fetch_optional(&**database)
                .await?;
        Ok(expiration.is_some_and(|e| e > Utc::now().naive_utc()))
    }

    pub async fn delete_and_get_user_pk(
        tx: &mut SqliteConnection,
        slug: String,
    ) -> Result<Self, AppError> {
        let (user_pk, expiration): (i64, NaiveDateTime) = sqlx::query_as(
            "DELETE FROM password_resets WHERE slug = $1 RETURNING user_pk, expiration;",
        )
        .bind(&slug)
        .fetch_optional(tx)
        .await?
        .ok_or(AppError::InvalidToken)?;

        if expiration <= Utc::now().naive_utc() {
            return Err(AppError::InvalidToken);
        }

        Ok(Self {
            user_pk,
            slug,
            expiration,
        })
    }
}
