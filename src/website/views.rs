use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension,
};

use crate::{
    auth::current_user,
    errors::AppError,
    models::{Group, User},
    sessions::Session,
    state::{App, AppState},
};

pub type HtmlResult = Result<Html<String>, AppError>;

pub fn template_to_response<T: Template>(template: &T) -> HtmlResult {
    template
        .render()
        .map(Html)
        .map_err(AppError::TemplateError)
}

/// Renders a form again with its problems, answering with `status`.
pub fn template_with_status<T: Template>(status: StatusCode, template: &T) -> Result<Response, AppError> {
    Ok((status, template_to_response(template)?).into_response())
}

/// What every page needs for the navigation bar and its forms.
#[derive(Debug)]
pub struct Page {
    pub title: String,
    pub csrf_token: String,
    pub user: Option<User>,
    permissions: Vec<String>,
}

impl Page {
    pub async fn load(app: &App, session: &Session, title: &str) -> Result<Self, AppError> {
        let user = current_user(app, session).await?;
        let permissions = match &user {
            Some(user) => Group::user_permissions(&app.database, user.pk).await?,
            None => Vec::new(),
        };
        Ok(Self {
            title: title.to_owned(),
            csrf_token: session.csrf_token(&app.config.session_key).await,
            user,
            permissions,
        })
    }

    pub fn can(&self, codename: &str) -> bool {
        self.permissions.iter().any(|p| p == codename)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn display_name(&self) -> String {
        self.user.as_ref().map(User::full_name).unwrap_or_default()
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    status: u16,
    reason: &'a str,
    message: &'a str,
}

impl ErrorPage<'_> {
    pub fn render_or_plain(status: StatusCode, message: &str) -> String {
        let page = ErrorPage {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
            message,
        };
        page.render().unwrap_or_else(|e| {
            tracing::error!(error = %e, "error page failed to render");
            format!("<h1>{}</h1><p>{}</p>", status, message)
        })
    }
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessagePage {
    pub page: Page,
    pub heading: String,
    pub body: String,
}

impl MessagePage {
    pub async fn render(
        app: &App,
        session: &Session,
        heading: &str,
        body: &str,
    ) -> HtmlResult {
        let page = Page::load(app, session, heading).await?;
        template_to_response(&MessagePage {
            page,
            heading: heading.to_owned(),
            body: body.to_owned(),
        })
    }
}

#[derive(Template)]
#[template(path = "no_permission.html")]
struct NoPermissionTemplate {
    page: Page,
}

pub async fn no_permission(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response, AppError> {
    let page = Page::load(&state, &session, "No permission").await?;
    template_with_status(StatusCode::FORBIDDEN, &NoPermissionTemplate { page })
}

pub async fn error_404() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(ErrorPage::render_or_plain(
            StatusCode::NOT_FOUND,
            "Nothing to see here",
        )),
    )
        .into_response()
}
