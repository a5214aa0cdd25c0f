use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::prelude::FromRow;

use crate::{database::Database, errors::AppError};

use super::Category;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub pk: i64,
    pub name: String,
    pub category_pk: i64,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub asset: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventData {
    pub name: String,
    pub category_pk: i64,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub asset: Option<String>,
}

impl EventData {
    async fn check_category(&self, database: &Database) -> Result<(), AppError> {
        if Category::exists(database, self.category_pk).await? {
            return Ok(());
        }
        Err(AppError::validation(
            "Select a valid category. That choice is not one of the available choices.",
        ))
    }
}

impl Event {
    pub async fn get(database: &Database, pk: i64) -> Result<Self, AppError> {
        sqlx::query_as(
            "SELECT pk, name, category_pk, description, date, time, location, asset FROM events WHERE pk = $1;",
        )
        .bind(pk)
        .fetch_optional(&**database)
        .await?
        .ok_or_else(|| AppError::not_found("event", pk))
    }

    pub async fn create(database: &Database, data: &EventData) -> Result<i64, AppError> {
        data.check_category(database).await?;
        let pk = sqlx::query(
            "INSERT INTO events (name, category_pk, description, date, time, location, asset) VALUES ($1, $2, $3, $4, $5, $6, $7);",
        )
        .bind(&data.name)
        .bind(data.category_pk)
        .bind(&data.description)
        .bind(data.date)
        .bind(data.time)
        .bind(&data.location)
        .bind(&data.asset)
        .execute(&**database)
        .await?
        .last_insert_rowid();
        tracing::info!(event_pk = pk, name = %data.name, "event created");
        Ok(pk)
    }

    pub async fn update(database: &Database, pk: i64, data: &EventData) -> Result<(), AppError> {
        data.check_category(database).await?;
        let affected = sqlx::query(
            "UPDATE events SET name = $1, category_pk = $2, description = $3, date = $4, time = $5, location = $6, asset = $7 WHERE pk = $8;",
        )
        .bind(&data.name)
        .bind(data.category_pk)
        .bind(&data.description)
        .bind(data.date)
        .bind(data.time)
        .bind(&data.location)
        .bind(&data.asset)
        .bind(pk)
        .execute(&**database)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(AppError::not_found("event", pk));
        }
        Ok(())
    }

    pub async fn delete(database: &Database, pk: i64) -> Result<(), AppError> {
        let affected = sqlx::query("DELETE FROM events WHERE pk = $1;")
            .bind(pk)
            .execute(&**database)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(AppError::not_found("event", pk));
        }
        tracing::info!(event_pk = pk, "event deleted");
        Ok(())
    }

    /// Records the RSVP of `user_pk`. Returns false when it already existed,
    /// the relation is a set so repeating an RSVP changes nothing.
    pub async fn rsvp(database: &Database, pk: i64, user_pk: i64) -> Result<bool, AppError> {
        Self::get(database, pk).await?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO event_rsvps (event_pk, user_pk, created_at) VALUES ($1, $2, $3);",
        )
        .bind(pk)
        .bind(user_pk)
        .bind(Utc::now().naive_utc())
        .execute(&**database)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    pub async fn has_rsvp(database: &Database, pk: i64, user_pk: i64) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM event_rsvps WHERE event_pk = $1 AND user_pk = $2;")
                .bind(pk)
                .bind(user_pk)
                .fetch_optional(&**database)
                .await?;
        Ok(found.is_some())
    }

    pub async fn rsvp_count(database: &Database, pk: i64) -> Result<i64, AppError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM event_rsvps WHERE event_pk = $1;")
                .bind(pk)
                .fetch_one(&**database)
                .await?,
        )
    }

    pub async fn attendees(database: &Database, pk: i64) -> Result<Vec<String>, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT users.username FROM event_rsvps
                INNER JOIN users ON users.pk = event_rsvps.user_pk
                WHERE event_rsvps.event_pk = $1
                ORDER BY users.username;",
        )
        .bind(pk)
        .fetch_all(&**database)
        .await?)
    }
}
