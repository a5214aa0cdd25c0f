use serde::Serialize;
use sqlx::prelude::FromRow;

use crate::{database::Database, errors::AppError};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub pk: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CategoryData {
    pub name: String,
    pub description: String,
}

impl Category {
    pub async fn list(database: &Database) -> Result<Vec<Self>, AppError> {
        Ok(
            sqlx::query_as("SELECT pk, name, description FROM categories ORDER BY name, pk;")
                .fetch_all(&**database)
                .await?,
        )
    }

    pub async fn get(database: &Database, pk: i64) -> Result<Self, AppError> {
        sqlx::query_as("SELECT pk, name, description FROM categories WHERE pk = $1;")
            .bind(pk)
            .fetch_optional(&**database)
            .await?
            .ok_or_else(|| AppError::not_found("category", pk))
    }

    pub async fn exists(database: &Database, pk: i64) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT pk FROM categories WHERE pk = $1;")
            .bind(pk)
            .fetch_optional(&**database)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create(database: &Database, data: &CategoryData) -> Result<i64, AppError> {
        let pk = sqlx::query("INSERT INTO categories (name, description) VALUES ($1, $2);")
            .bind(&data.name)
            .bind(&data.description)
            .execute(&**database)
            .await?
            .last_insert_rowid();
        tracing::info!(category_pk = pk, name = %data.name, "category created");
        Ok(pk)
    }

    pub async fn update(database: &Database, pk: i64, data: &CategoryData) -> Result<(), AppError> {
        let affected = sqlx::query("UPDATE categories SET name = $1, description = $2 WHERE pk = $3;")
            .bind(&data.name)
            .bind(&data.description)
            .bind(pk)
            .execute(&**database)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(AppError::not_found("category", pk));
        }
        Ok(())
    }

    /// Deleting a category deletes its events, and with them their RSVPs.
    pub async fn delete(database: &Database, pk: i64) -> Result<(), AppError> {
        let affected = sqlx::query("DELETE FROM categories WHERE pk = $1;")
            .bind(pk)
            .execute(&**database)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(AppError::not_found("category", pk));
        }
        tracing::info!(category_pk = pk, "category deleted");
        Ok(())
    }
}
