use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::{
    errors::AppError,
    mailing::Notification,
    models::{Group, NewUser, Role, User},
    sessions::Session,
    state::App,
};

use super::{
    forms::{
        check_new_password, validate_form, PasswordResetForm, PasswordResetRequestForm,
        SignInForm, SignUpForm,
    },
    tokens::{EmailValidation, PasswordReset},
};

/// Creates an inactive participant and mails the activation link.
pub async fn sign_up(app: &App, form: SignUpForm) -> Result<User, AppError> {
    let database = &app.database;

    let mut problems = match check_new_password(&form, &form.password, &form.confirm_password) {
        Ok(()) => Vec::new(),
        Err(AppError::Validation(problems)) => problems,
        Err(e) => return Err(e),
    };
    if User::username_exists(database, &form.username).await? {
        problems.push("A user with that username already exists.".to_owned());
    }
    if User::email_exists(database, &form.email, None).await? {
        problems.push("Email already exists.".to_owned());
    }
    if !problems.is_empty() {
        return Err(AppError::Validation(problems));
    }

    let password_hash = hash_password(&form.password)?;
    let mut tx = database.start_transaction().await?;

    let user = User::create_inactive(
        &mut *tx,
        &NewUser {
            username: form.username,
            email: form.email,
            first_name: form.first_name,
            last_name: form.last_name,
            password_hash,
        },
    )
    .await?
    .add_to_group(Role::Participant, &mut *tx)
    .await?;

    let validation = EmailValidation::new(user.pk).save(&mut *tx).await?;

    tx.commit()
        .await
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))?;

    app.mailer
        .notify(
            &app.config,
            &user.email,
            Notification::Activation {
                username: user.username.clone(),
                link: app.config.build_url(&validation.path()),
            },
        )
        .await?;

    tracing::info!(user_pk = user.pk, username = %user.username, "user signed up");
    Ok(user)
}

pub async fn activate(app: &App, slug: String) -> Result<(), AppError> {
    let mut tx = app.database.start_transaction().await?;
    let validation = EmailValidation::delete_and_get_user_pk(&mut *tx, slug).await?;
    User::activate(&mut *tx, validation.user_pk).await?;
    tx.commit()
        .await
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))?;
    Ok(())
}

/// Checks the credentials and binds the session to the user.
pub async fn sign_in(app: &App, session: &Session, form: SignInForm) -> Result<User, AppError> {
    validate_form(&form)?;

    let found = User::find_by_username_with_password(&app.database, &form.username)
        .await?
        .ok_or(AppError::WrongCredentials)?;
    verify_password(&form.password, &found.password)?;

    if !found.user.is_active {
        return Err(AppError::InactiveAccount);
    }

    app.sessions.login(session, found.user.pk).await?;
    tracing::info!(user_pk = found.user.pk, "user signed in");
    Ok(found.user)
}

pub async fn sign_out(app: &App, session: &Session) -> Result<(), AppError> {
    app.sessions.logout(session).await
}

/// Unknown addresses are ignored so the answer doesn't reveal who has an account.
pub async fn request_password_reset(
    app: &App,
    form: PasswordResetRequestForm,
) -> Result<(), AppError> {
    validate_form(&form)?;

    let Some(user) = User::find_by_email(&app.database, &form.email).await? else {
        tracing::debug!("password reset requested for an unknown email");
        return Ok(());
    };

    let reset = PasswordReset::new(user.pk).save(&app.database).await?;
    app.mailer
        .notify(
            &app.config,
            &user.email,
            Notification::PasswordReset {
                username: user.username,
                link: app.config.build_url(&reset.path()),
            },
        )
        .await
}

pub async fn reset_password(
    app: &App,
    slug: String,
    form: PasswordResetForm,
) -> Result<(), AppError> {
    check_new_password(&form, &form.password, &form.confirm_password)?;
    let password_hash = hash_password(&form.password)?;

    let mut tx = app.database.start_transaction().await?;
    let reset = PasswordReset::delete_and_get_user_pk(&mut *tx, slug).await?;
    User::set_password(&mut *tx, reset.user_pk, &password_hash).await?;
    tx.commit()
        .await
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))?;

    tracing::info!(user_pk = reset.user_pk, "password reset");
    Ok(())
}

pub async fn current_user(app: &App, session: &Session) -> Result<Option<User>, AppError> {
    match session.user_pk().await {
        Some(pk) => Ok(Some(User::get(&app.database, pk).await?)),
        None => Ok(None),
    }
}

/// The signed-in user, provided they hold `codename` through one of their groups.
pub async fn require_permission(
    app: &App,
    session: &Session,
    codename: &str,
) -> Result<User, AppError> {
    let user = current_user(app, session)
        .await?
        .ok_or(AppError::PermissionDenied)?;
    if !Group::user_has_permission(&app.database, user.pk, codename).await? {
        tracing::debug!(user_pk = user.pk, codename, "permission denied");
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

pub async fn require_user(app: &App, session: &Session) -> Result<User, AppError> {
    current_user(app, session)
        .await?
        .ok_or_else(|| AppError::LoginRequired(app.config.login_redirect_to.clone()))
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(AppError::ErrorHashingPassword)?
        .to_string())
}

pub fn verify_password(raw_password: &str, db_password: &str) -> Result<(), AppError> {
    let parsed_hash = PasswordHash::new(db_password).map_err(AppError::ErrorHashingPassword)?;
    Argon2::default()
        .verify_password(raw_password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::WrongCredentials)
}
