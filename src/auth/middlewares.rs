use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::{headers::Cookie, TypedHeader};
use cookie::{time::Duration, SameSite};

use crate::{
    config::Config, errors::AppError, log_and_wrap_custom_internal, sessions::Session,
    state::AppState,
};

/// Loads the visitor's session, or opens a new one, and hands it to the
/// handlers as an extension. The cookies are refreshed on every response.
pub async fn sessions_middleware(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sessions = &state.sessions;
    let config = &state.config;

    let current_session = match cookie
        .as_ref()
        .and_then(|TypedHeader(cookie)| cookie.get(&config.session_cookie_name))
    {
        Some(session_id) => sessions.find_session(session_id).await?,
        None => None,
    };

    let session = match current_session {
        Some(session) => {
            sessions.touch(&session).await?;
            session
        }
        None => {
            sessions
                .create_session(config.session_expiration.unsigned_abs())
                .await?
        }
    };

    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    set_session_cookies(response.headers_mut(), &session, config).await?;

    Ok(response)
}

pub async fn login_required_middleware(
    Extension(session): Extension<Session>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if session.is_authenticated().await {
        return Ok(next.run(request).await);
    }
    Err(AppError::LoginRequired(request.uri().to_string()))
}

pub async fn set_session_cookies(
    headers: &mut HeaderMap<HeaderValue>,
    session: &Session,
    config: &Config,
) -> Result<(), AppError> {
    let max_age = Duration::days(config.session_expiration);

    let csrf = cookie::Cookie::build((
        config.csrf_cookie_name.as_str(),
        session.csrf_token(&config.session_key).await,
    ))
    .path("/")
    .max_age(max_age)
    .secure(config.secure_cookies())
    .http_only(false)
    .same_site(SameSite::Lax)
    .build();

    headers.append(
        SET_COOKIE,
        HeaderValue::from_str(&csrf.encoded().to_string())
            .map_err(|e| log_and_wrap_custom_internal!(e))?,
    );

    let session_cookie =
        cookie::Cookie::build((config.session_cookie_name.as_str(), session.id().await))
            .path("/")
            .max_age(max_age)
            .secure(config.secure_cookies())
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

    headers.append(
        SET_COOKIE,
        HeaderValue::from_str(&session_cookie.encoded().to_string())
            .map_err(|e| log_and_wrap_custom_internal!(e))?,
    );

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    Ok(())
}
