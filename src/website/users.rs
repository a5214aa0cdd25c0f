use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;

use crate::{
    auth::{
        self, require_permission, require_user, PasswordReset, PasswordResetForm,
        PasswordResetRequestForm, SignInForm, SignUpForm,
    },
    errors::AppError,
    events::{self, EventCard},
    models::{Group, GroupWithPermissions, Permission, User, UserWithGroups},
    sessions::Session,
    state::AppState,
};

use super::{
    forms::{CsrfOnly, GroupForm, ProfileForm, RoleForm, SecureForm},
    views::{template_to_response, template_with_status, HtmlResult, MessagePage, Page},
};

#[derive(Template)]
#[template(path = "users/sign_up.html")]
struct SignUpTemplate {
    page: Page,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    errors: Vec<String>,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    template_to_response(&SignUpTemplate {
        page: Page::load(&state, &session, "Sign up").await?,
        username: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        errors: Vec::new(),
    })
}

pub async fn post_sign_up(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<SignUpForm>,
) -> Result<Response, AppError> {
    let form = form.data();
    let (username, first_name, last_name, email) = (
        form.username.clone(),
        form.first_name.clone(),
        form.last_name.clone(),
        form.email.clone(),
    );

    match auth::sign_up(&state, form).await {
        Ok(_) => Ok(MessagePage::render(
            &state,
            &session,
            "Check your inbox",
            "A confirmation mail was sent. Follow its link to activate your account.",
        )
        .await?
        .into_response()),
        Err(AppError::Validation(errors)) => {
            let template = SignUpTemplate {
                page: Page::load(&state, &session, "Sign up").await?,
                username,
                first_name,
                last_name,
                email,
                errors,
            };
            template_with_status(StatusCode::BAD_REQUEST, &template)
        }
        Err(e) => Err(e),
    }
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(slug): Path<String>,
) -> HtmlResult {
    auth::activate(&state, slug).await?;
    MessagePage::render(
        &state,
        &session,
        "Account activated",
        "Your account is active, you can sign in now.",
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    next: Option<String>,
}

impl NextParam {
    /// Only paths on this site are followed.
    fn local_path(&self) -> Option<&str> {
        self.next
            .as_deref()
            .filter(|next| next.starts_with('/') && !next.starts_with("//"))
    }
}

#[derive(Template)]
#[template(path = "users/sign_in.html")]
struct SignInTemplate {
    page: Page,
    username: String,
    next: String,
    errors: Vec<String>,
}

pub async fn sign_in(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<NextParam>,
) -> HtmlResult {
    template_to_response(&SignInTemplate {
        page: Page::load(&state, &session, "Sign in").await?,
        username: String::new(),
        next: params.local_path().unwrap_or_default().to_owned(),
        errors: Vec::new(),
    })
}

pub async fn post_sign_in(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<NextParam>,
    form: SecureForm<SignInForm>,
) -> Result<Response, AppError> {
    let form = form.data();
    let username = form.username.clone();

    match auth::sign_in(&state, &session, form).await {
        Ok(_) => {
            let to = params
                .local_path()
                .unwrap_or(&state.config.login_redirect_to);
            Ok(Redirect::to(to).into_response())
        }
        Err(
            e @ (AppError::WrongCredentials | AppError::InactiveAccount | AppError::Validation(_)),
        ) => {
            let (status, _) = e.get_status_code_and_message();
            let errors = match e {
                AppError::Validation(errors) => errors,
                e => vec![e.to_string()],
            };
            let template = SignInTemplate {
                page: Page::load(&state, &session, "Sign in").await?,
                username,
                next: params.local_path().unwrap_or_default().to_owned(),
                errors,
            };
            template_with_status(status, &template)
        }
        Err(e) => Err(e),
    }
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    _form: SecureForm<CsrfOnly>,
) -> Result<Redirect, AppError> {
    auth::sign_out(&state, &session).await?;
    Ok(Redirect::to("/"))
}

#[derive(Template)]
#[template(path = "users/password_reset.html")]
struct PasswordResetRequestTemplate {
    page: Page,
    errors: Vec<String>,
}

pub async fn password_reset(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    template_to_response(&PasswordResetRequestTemplate {
        page: Page::load(&state, &session, "Reset password").await?,
        errors: Vec::new(),
    })
}

pub async fn post_password_reset(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<PasswordResetRequestForm>,
) -> Result<Response, AppError> {
    match auth::request_password_reset(&state, form.data()).await {
        Ok(()) => Ok(MessagePage::render(
            &state,
            &session,
            "Check your inbox",
            "If an account uses that address, a link to choose a new password is on its way.",
        )
        .await?
        .into_response()),
        Err(AppError::Validation(errors)) => {
            let template = PasswordResetRequestTemplate {
                page: Page::load(&state, &session, "Reset password").await?,
                errors,
            };
            template_with_status(StatusCode::BAD_REQUEST, &template)
        }
        Err(e) => Err(e),
    }
}

#[derive(Template)]
#[template(path = "users/password_reset_confirm.html")]
struct PasswordResetConfirmTemplate {
    page: Page,
    slug: String,
    errors: Vec<String>,
}

pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(slug): Path<String>,
) -> HtmlResult {
    if !PasswordReset::is_valid(&state.database, &slug).await? {
        return Err(AppError::InvalidToken);
    }
    template_to_response(&PasswordResetConfirmTemplate {
        page: Page::load(&state, &session, "Choose a new password").await?,
        slug,
        errors: Vec::new(),
    })
}

pub async fn post_password_reset_confirm(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(slug): Path<String>,
    form: SecureForm<PasswordResetForm>,
) -> Result<Response, AppError> {
    match auth::reset_password(&state, slug.clone(), form.data()).await {
        Ok(()) => Ok(MessagePage::render(
            &state,
            &session,
            "Password changed",
            "Your password was changed, you can sign in with it now.",
        )
        .await?
        .into_response()),
        Err(AppError::Validation(errors)) => {
            let template = PasswordResetConfirmTemplate {
                page: Page::load(&state, &session, "Choose a new password").await?,
                slug,
                errors,
            };
            template_with_status(StatusCode::BAD_REQUEST, &template)
        }
        Err(e) => Err(e),
    }
}

#[derive(Template)]
#[template(path = "users/profile.html")]
struct ProfileTemplate {
    page: Page,
    form: ProfileForm,
    errors: Vec<String>,
    saved: bool,
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    let user = require_user(&state, &session).await?;
    template_to_response(&ProfileTemplate {
        page: Page::load(&state, &session, "Profile").await?,
        form: ProfileForm::from_user(&user),
        errors: Vec::new(),
        saved: false,
    })
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<ProfileForm>,
) -> Result<Response, AppError> {
    let user = require_user(&state, &session).await?;
    let form = form.data();

    let mut errors = match auth::validate_form(&form) {
        Ok(()) => Vec::new(),
        Err(AppError::Validation(errors)) => errors,
        Err(e) => return Err(e),
    };
    if User::email_exists(&state.database, &form.email, Some(user.pk)).await? {
        errors.push("Email already exists.".to_owned());
    }

    let status = if errors.is_empty() {
        User::update_profile(&state.database, user.pk, &form.to_data()).await?;
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    let template = ProfileTemplate {
        page: Page::load(&state, &session, "Profile").await?,
        saved: errors.is_empty(),
        form,
        errors,
    };
    template_with_status(status, &template)
}

#[derive(Template)]
#[template(path = "users/rsvps.html")]
struct RsvpsTemplate {
    page: Page,
    events: Vec<EventCard>,
}

pub async fn rsvps(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    let user = require_user(&state, &session).await?;
    let events = events::user_rsvps(&state.database, &user).await?;
    template_to_response(&RsvpsTemplate {
        page: Page::load(&state, &session, "My RSVPs").await?,
        events,
    })
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct AdminUsersTemplate {
    page: Page,
    users: Vec<UserWithGroups>,
    groups: Vec<GroupWithPermissions>,
}

pub async fn admin_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    require_permission(&state, &session, "manage_roles").await?;
    template_to_response(&AdminUsersTemplate {
        page: Page::load(&state, &session, "Users").await?,
        users: User::list_with_groups(&state.database).await?,
        groups: Group::list(&state.database).await?,
    })
}

pub async fn assign_role(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_pk): Path<i64>,
    form: SecureForm<RoleForm>,
) -> Result<Redirect, AppError> {
    require_permission(&state, &session, "manage_roles").await?;
    Group::assign_role(&state.database, user_pk, form.data().group).await?;
    Ok(Redirect::to("/admin/users"))
}

#[derive(Template)]
#[template(path = "admin/groups.html")]
struct AdminGroupsTemplate {
    page: Page,
    groups: Vec<GroupWithPermissions>,
    permissions: Vec<Permission>,
    errors: Vec<String>,
}

async fn render_groups(
    state: &AppState,
    session: &Session,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let template = AdminGroupsTemplate {
        page: Page::load(state, session, "Groups").await?,
        groups: Group::list(&state.database).await?,
        permissions: Permission::list(&state.database).await?,
        errors,
    };
    template_with_status(status, &template)
}

pub async fn admin_groups(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "manage_roles").await?;
    render_groups(&state, &session, Vec::new()).await
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "manage_roles").await?;
    let created = match GroupForm::from_pairs(form.data()) {
        Ok(form) => Group::create(&state.database, &form.name, &form.permissions).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(_) => Ok(Redirect::to("/admin/groups").into_response()),
        Err(AppError::Validation(errors)) => render_groups(&state, &session, errors).await,
        Err(e) => Err(e),
    }
}
