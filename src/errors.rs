use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::website::ErrorPage;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid input: {}", .0.join(" "))]
    Validation(Vec<String>),
    #[error("the csrf token is missing or wrong")]
    Csrf,
    #[error("login required to access {0}")]
    LoginRequired(String),
    #[error("permission denied")]
    PermissionDenied,
    #[error("wrong username or password")]
    WrongCredentials,
    #[error("the account is not activated yet")]
    InactiveAccount,
    #[error("the token is invalid or expired")]
    InvalidToken,
    #[error("error hashing the password: {0}")]
    ErrorHashingPassword(argon2::password_hash::Error),
    #[error("template error: {0}")]
    TemplateError(#[from] askama::Error),
    #[error("{0}")]
    CustomInternal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn not_found(entity: &str, pk: i64) -> Self {
        Self::NotFound(format!("{} {}", entity, pk))
    }

    pub fn custom_internal(message: &str) -> Self {
        Self::CustomInternal(message.to_owned())
    }

    pub fn get_status_code_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(e) => match e.as_database_error() {
                Some(db_error) if db_error.is_unique_violation() => (
                    StatusCode::CONFLICT,
                    "Resource already exists".to_owned(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sorry no sorry, something wrong happened".to_owned(),
                ),
            },
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} was not found", what)),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Csrf => (StatusCode::FORBIDDEN, self.to_string()),
            Self::LoginRequired(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::PermissionDenied => (StatusCode::FORBIDDEN, self.to_string()),
            Self::WrongCredentials | Self::InactiveAccount => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Self::InvalidToken => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Migration(_)
            | Self::ErrorHashingPassword(_)
            | Self::TemplateError(_)
            | Self::CustomInternal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sorry no sorry, something wrong happened".to_owned(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::PermissionDenied => return Redirect::to("/no-permission").into_response(),
            Self::LoginRequired(next) => {
                let query = serde_urlencoded::to_string([("next", next)]).unwrap_or_default();
                return Redirect::to(&format!("/user/sign-in?{}", query)).into_response();
            }
            Self::Database(_)
            | Self::Migration(_)
            | Self::ErrorHashingPassword(_)
            | Self::TemplateError(_)
            | Self::CustomInternal(_) => tracing::error!(error = %self, "request failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let (status, message) = self.get_status_code_and_message();
        let body = ErrorPage::render_or_plain(status, &message);
        (status, Html(body)).into_response()
    }
}

#[macro_export]
macro_rules! log_and_wrap_custom_internal {
    ($e:expr) => {{
        let error = $e;
        ::tracing::error!(error = %error, "internal error");
        $crate::errors::AppError::CustomInternal(error.to_string())
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_problem() {
        let error = AppError::Validation(vec![
            "Password must be at least 8 characters long.".into(),
            "Password must contain at least one number.".into(),
        ]);
        let (status, message) = error.get_status_code_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("at least 8 characters"));
        assert!(message.contains("at least one number"));
    }

    #[test]
    fn test_permission_denied_redirects_to_no_permission() {
        let response = AppError::PermissionDenied.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/no-permission"
        );
    }

    #[test]
    fn test_login_required_keeps_next() {
        let response = AppError::LoginRequired("/events/1/rsvp".into()).into_response();
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/user/sign-in?next=%2Fevents%2F1%2Frsvp"
        );
    }

    #[test]
    fn test_not_found_status() {
        let response = AppError::not_found("event", 7).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
