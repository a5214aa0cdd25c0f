use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{prelude::FromRow, SqliteConnection};

use crate::{database::Database, errors::AppError};

use super::Role;

const USER_COLUMNS: &str = "users.pk, users.username, users.email, users.is_active, users.first_name, users.last_name, users.phone, users.bio, users.address, users.profile_image, users.created_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub pk: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub bio: String,
    pub address: String,
    pub profile_image: String,
    pub created_at: NaiveDateTime,
}

#[derive(FromRow)]
pub struct UserWithPassword {
    #[sqlx(flatten)]
    pub user: User,
    pub password: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserWithGroups {
    pub pk: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub groups: Option<String>,
}

impl UserWithGroups {
    pub fn groups_label(&self) -> &str {
        self.groups.as_deref().unwrap_or("-")
    }
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct ProfileData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub bio: String,
    pub address: String,
}

impl User {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            return self.username.clone();
        }
        full.to_owned()
    }

    pub async fn create_inactive(
        tx: &mut SqliteConnection,
        new_user: &NewUser,
    ) -> Result<Self, AppError> {
        let pk = sqlx::query("INSERT INTO users (username, email, password, is_active, first_name, last_name, created_at) VALUES ($1, $2, $3, 0, $4, $5, $6);")
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(Utc::now().naive_utc())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        Ok(sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE pk = $1;",
            USER_COLUMNS
        ))
        .bind(pk)
        .fetch_one(&mut *tx)
        .await?)
    }

    pub async fn add_to_group(
        self,
        role: Role,
        tx: &mut SqliteConnection,
    ) -> Result<Self, AppError> {
        sqlx::query("INSERT OR IGNORE INTO users_groups_m2m (user_pk, group_pk) VALUES ($1, $2);")
            .bind(self.pk)
            .bind(role as i64)
            .execute(tx)
            .await?;
        Ok(self)
    }

    pub async fn activate(tx: &mut SqliteConnection, pk: i64) -> Result<(), AppError> {
        let affected = sqlx::query("UPDATE users SET is_active = 1 WHERE pk = $1;")
            .bind(pk)
            .execute(tx)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(AppError::not_found("user", pk));
        }
        tracing::info!(user_pk = pk, "user activated");
        Ok(())
    }

    pub async fn set_password(
        tx: &mut SqliteConnection,
        pk: i64,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password = $1 WHERE pk = $2;")
            .bind(password_hash)
            .bind(pk)
            .execute(tx)
            .await?;
        Ok(())
    }

    pub async fn get(database: &Database, pk: i64) -> Result<Self, AppError> {
        sqlx::query_as(&format!("SELECT {} FROM users WHERE pk = $1;", USER_COLUMNS))
            .bind(pk)
            .fetch_optional(&**database)
            .await?
            .ok_or_else(|| AppError::not_found("user", pk))
    }

    pub async fn find_by_username_with_password(
        database: &Database,
        username: &str,
    ) -> Result<Option<UserWithPassword>, AppError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {}, users.password FROM users WHERE users.username = $1;",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&**database)
        .await?)
    }

    pub async fn find_by_email(database: &Database, email: &str) -> Result<Option<Self>, AppError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE users.email = $1;",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&**database)
        .await?)
    }

    /// `excluding` leaves the given user out, so a profile can keep its own address.
    pub async fn email_exists(
        database: &Database,
        email: &str,
        excluding: Option<i64>,
    ) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT pk FROM users WHERE email = $1 AND pk IS NOT $2;")
                .bind(email)
                .bind(excluding)
                .fetch_optional(&**database)
                .await?;
        Ok(found.is_some())
    }

    pub async fn username_exists(database: &Database, username: &str) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT pk FROM users WHERE username = $1;")
            .bind(username)
            .fetch_optional(&**database)
            .await?;
        Ok(found.is_some())
    }

    pub async fn update_profile(
        database: &Database,
        pk: i64,
        data: &ProfileData,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET first_name = $1, last_name = $2, email = $3, phone = $4, bio = $5, address = $6 WHERE pk = $7;")
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.bio)
            .bind(&data.address)
            .bind(pk)
            .execute(&**database)
            .await?;
        Ok(())
    }

    pub async fn list_with_groups(database: &Database) -> Result<Vec<UserWithGroups>, AppError> {
        Ok(sqlx::query_as(
            "SELECT users.pk, users.username, users.email, users.is_active, GROUP_CONCAT(auth_groups.name, ', ') AS groups
                FROM users
                LEFT JOIN users_groups_m2m ON users.pk = users_groups_m2m.user_pk
                LEFT JOIN auth_groups ON auth_groups.pk = users_groups_m2m.group_pk
                GROUP BY users.pk
                ORDER BY users.username;",
        )
        .fetch_all(&**database)
        .await?)
    }
}
