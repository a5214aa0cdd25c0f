use serde::Serialize;
use sqlx::prelude::FromRow;

use crate::{database::Database, errors::AppError};

/// Groups created by the initial migration, the discriminant is their primary key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Role {
    Admin = 1,
    Organizer = 2,
    Participant = 3,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    pub pk: i64,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupWithPermissions {
    pub pk: i64,
    pub name: String,
    pub permissions: Option<String>,
}

impl GroupWithPermissions {
    pub fn permissions_label(&self) -> &str {
        self.permissions.as_deref().unwrap_or("-")
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub pk: i64,
    pub codename: String,
    pub name: String,
}

impl Group {
    pub async fn list(database: &Database) -> Result<Vec<GroupWithPermissions>, AppError> {
        Ok(sqlx::query_as(
            "SELECT auth_groups.pk, auth_groups.name, GROUP_CONCAT(auth_permissions.codename, ', ') AS permissions
                FROM auth_groups
                LEFT JOIN groups_permissions_m2m ON auth_groups.pk = groups_permissions_m2m.group_pk
                LEFT JOIN auth_permissions ON auth_permissions.pk = groups_permissions_m2m.permission_pk
                GROUP BY auth_groups.pk
                ORDER BY auth_groups.pk;",
        )
        .fetch_all(&**database)
        .await?)
    }

    pub async fn get(database: &Database, pk: i64) -> Result<Self, AppError> {
        sqlx::query_as("SELECT pk, name FROM auth_groups WHERE pk = $1;")
            .bind(pk)
            .fetch_optional(&**database)
            .await?
            .ok_or_else(|| AppError::not_found("group", pk))
    }

    pub async fn create(
        database: &Database,
        name: &str,
        permission_pks: &[i64],
    ) -> Result<i64, AppError> {
        let mut tx = database.start_transaction().await?;

        let pk = sqlx::query("INSERT INTO auth_groups (name) VALUES ($1);")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for permission_pk in permission_pks {
            sqlx::query(
                "INSERT OR IGNORE INTO groups_permissions_m2m (group_pk, permission_pk)
                    SELECT $1, pk FROM auth_permissions WHERE pk = $2;",
            )
            .bind(pk)
            .bind(permission_pk)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(group_pk = pk, name, "group created");
        Ok(pk)
    }

    /// The chosen group replaces every membership the user had.
    pub async fn assign_role(
        database: &Database,
        user_pk: i64,
        group_pk: i64,
    ) -> Result<(), AppError> {
        Self::get(database, group_pk).await?;
        let mut tx = database.start_transaction().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT pk FROM users WHERE pk = $1;")
            .bind(user_pk)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found("user", user_pk));
        }

        sqlx::query("DELETE FROM users_groups_m2m WHERE user_pk = $1;")
            .bind(user_pk)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO users_groups_m2m (user_pk, group_pk) VALUES ($1, $2);")
            .bind(user_pk)
            .bind(group_pk)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(user_pk, group_pk, "role assigned");
        Ok(())
    }

    pub async fn user_permissions(
        database: &Database,
        user_pk: i64,
    ) -> Result<Vec<String>, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT DISTINCT auth_permissions.codename FROM users_groups_m2m
                INNER JOIN groups_permissions_m2m ON groups_permissions_m2m.group_pk = users_groups_m2m.group_pk
                INNER JOIN auth_permissions ON auth_permissions.pk = groups_permissions_m2m.permission_pk
                WHERE users_groups_m2m.user_pk = $1
                ORDER BY auth_permissions.codename;",
        )
        .bind(user_pk)
        .fetch_all(&**database)
        .await?)
    }

    pub async fn user_has_permission(
        database: &Database,
        user_pk: i64,
        codename: &str,
    ) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM users_groups_m2m
                INNER JOIN groups_permissions_m2m ON groups_permissions_m2m.group_pk = users_groups_m2m.group_pk
                INNER JOIN auth_permissions ON auth_permissions.pk = groups_permissions_m2m.permission_pk
                WHERE users_groups_m2m.user_pk = $1 AND auth_permissions.codename = $2
                LIMIT 1;",
        )
        .bind(user_pk)
        .bind(codename)
        .fetch_optional(&**database)
        .await?;
        Ok(found.is_some())
    }
}

impl Permission {
    pub async fn list(database: &Database) -> Result<Vec<Self>, AppError> {
        Ok(
            sqlx::query_as("SELECT pk, codename, name FROM auth_permissions ORDER BY pk;")
                .fetch_all(&**database)
                .await?,
        )
    }
}
