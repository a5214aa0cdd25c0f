mod common;

use chrono::{Duration, Utc};
use common::{StubApp, PASSWORD};
use evently::{
    auth::{self, PasswordReset, PasswordResetForm, PasswordResetRequestForm, SignInForm, SignUpForm},
    errors::AppError,
    models::{Group, Role, User},
    sessions::Session,
    state::AppState,
};

fn sign_up_form(username: &str, password: &str) -> SignUpForm {
    SignUpForm {
        username: username.into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: format!("{}@example.com", username),
        password: password.into(),
        confirm_password: password.into(),
    }
}

fn sign_in_form(username: &str, password: &str) -> SignInForm {
    SignInForm {
        username: username.into(),
        password: password.into(),
    }
}

async fn new_session(state: &AppState) -> Session {
    state.sessions.create_session(30).await.unwrap()
}

async fn activation_slug(state: &AppState, user_pk: i64) -> String {
    sqlx::query_scalar("SELECT slug FROM email_validations WHERE user_pk = $1;")
        .bind(user_pk)
        .fetch_one(&*state.database)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_weak_password_lists_every_problem() {
    let app = StubApp::new("2024-03-05").await;

    let result = auth::sign_up(app.state(), sign_up_form("ada", "abc")).await;

    let Err(AppError::Validation(problems)) = result else {
        panic!("expected a validation error");
    };
    assert!(problems.contains(&"Password must be at least 8 characters long.".to_owned()));
    assert!(problems.contains(&"Password must contain at least one uppercase letter.".to_owned()));
    assert!(problems.contains(&"Password must contain at least one number.".to_owned()));
    assert!(problems
        .contains(&"Password must contain at least one special character (@#$%^&+=).".to_owned()));
    assert!(!problems.contains(&"Password must contain at least one lowercase letter.".to_owned()));
    assert!(app.state().mailer.sent_messages().await.is_empty());
}

#[tokio::test]
async fn test_passwords_must_match() {
    let app = StubApp::new("2024-03-05").await;
    let mut form = sign_up_form("ada", PASSWORD);
    form.confirm_password = "Other@pass1".into();

    let result = auth::sign_up(app.state(), form).await;

    let Err(AppError::Validation(problems)) = result else {
        panic!("expected a validation error");
    };
    assert_eq!(problems, ["Password and Confirm Password does not match."]);
}

#[tokio::test]
async fn test_username_and_email_are_unique() {
    let app = StubApp::new("2024-03-05").await;
    auth::sign_up(app.state(), sign_up_form("ada", PASSWORD))
        .await
        .unwrap();

    let result = auth::sign_up(app.state(), sign_up_form("ada", PASSWORD)).await;

    let Err(AppError::Validation(problems)) = result else {
        panic!("expected a validation error");
    };
    assert_eq!(
        problems,
        [
            "A user with that username already exists.",
            "Email already exists."
        ]
    );
}

#[tokio::test]
async fn test_sign_up_activate_and_sign_in() {
    let app = StubApp::new("2024-03-05").await;
    let state = app.state();
    let session = new_session(state).await;

    let user = auth::sign_up(state, sign_up_form("ada", PASSWORD))
        .await
        .unwrap();
    assert!(!user.is_active);
    assert_eq!(
        Group::user_permissions(&state.database, user.pk).await.unwrap(),
        ["view_event"]
    );

    let result = auth::sign_in(state, &session, sign_in_form("ada", PASSWORD)).await;
    assert!(matches!(result, Err(AppError::InactiveAccount)));
    assert!(!session.is_authenticated().await);

    let slug = activation_slug(state, user.pk).await;
    let sent = state.mailer.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Subject: Activate your account"));
    assert!(sent[0].contains(&format!("/user/activate/{}", slug)));

    auth::activate(state, slug.clone()).await.unwrap();
    assert!(matches!(
        auth::activate(state, slug).await,
        Err(AppError::InvalidToken)
    ));

    let signed_in = auth::sign_in(state, &session, sign_in_form("ada", PASSWORD))
        .await
        .unwrap();
    assert_eq!(signed_in.pk, user.pk);
    assert_eq!(session.user_pk().await, Some(user.pk));

    auth::sign_out(state, &session).await.unwrap();
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn test_wrong_credentials() {
    let app = StubApp::new("2024-03-05").await;
    let state = app.state();
    let session = new_session(state).await;
    app.user("ada", Role::Participant).await;

    for (username, password) in [("ada", "Wr0ng@pass"), ("nobody", PASSWORD)] {
        let result = auth::sign_in(state, &session, sign_in_form(username, password)).await;
        assert!(matches!(result, Err(AppError::WrongCredentials)));
    }
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn test_password_reset() {
    let app = StubApp::new("2024-03-05").await;
    let state = app.state();
    let session = new_session(state).await;
    let user = app.user("ada", Role::Participant).await;

    auth::request_password_reset(
        state,
        PasswordResetRequestForm {
            email: "nobody@example.com".into(),
        },
    )
    .await
    .unwrap();
    assert!(state.mailer.sent_messages().await.is_empty());

    auth::request_password_reset(
        state,
        PasswordResetRequestForm {
            email: user.email.clone(),
        },
    )
    .await
    .unwrap();
    let slug: String = sqlx::query_scalar("SELECT slug FROM password_resets WHERE user_pk = $1;")
        .bind(user.pk)
        .fetch_one(&*state.database)
        .await
        .unwrap();
    assert!(PasswordReset::is_valid(&state.database, &slug).await.unwrap());
    let sent = state.mailer.sent_messages().await;
    assert!(sent[0].contains("Subject: Reset your password"));
    assert!(sent[0].contains(&format!("/user/password-reset/{}", slug)));

    let new_password = "N3w@password";
    let weak = auth::reset_password(
        state,
        slug.clone(),
        PasswordResetForm {
            password: "short".into(),
            confirm_password: "short".into(),
        },
    )
    .await;
    assert!(matches!(weak, Err(AppError::Validation(_))));

    auth::reset_password(
        state,
        slug.clone(),
        PasswordResetForm {
            password: new_password.into(),
            confirm_password: new_password.into(),
        },
    )
    .await
    .unwrap();
    assert!(!PasswordReset::is_valid(&state.database, &slug).await.unwrap());

    let old = auth::sign_in(state, &session, sign_in_form("ada", PASSWORD)).await;
    assert!(matches!(old, Err(AppError::WrongCredentials)));
    auth::sign_in(state, &session, sign_in_form("ada", new_password))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_password_reset() {
    let app = StubApp::new("2024-03-05").await;
    let state = app.state();
    let user = app.user("ada", Role::Participant).await;
    PasswordReset {
        user_pk: user.pk,
        slug: "expired".into(),
        expiration: Utc::now().naive_utc() - Duration::hours(1),
    }
    .save(&state.database)
    .await
    .unwrap();

    assert!(!PasswordReset::is_valid(&state.database, "expired").await.unwrap());
    let result = auth::reset_password(
        state,
        "expired".into(),
        PasswordResetForm {
            password: "N3w@password".into(),
            confirm_password: "N3w@password".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::InvalidToken)));
}

#[tokio::test]
async fn test_permissions_follow_the_role() {
    let app = StubApp::new("2024-03-05").await;
    let state = app.state();
    let database = &state.database;
    let admin = app.user("admin", Role::Admin).await;
    let organizer = app.user("organizer", Role::Organizer).await;
    let participant = app.user("participant", Role::Participant).await;

    let permissions = |pk| Group::user_permissions(database, pk);
    assert_eq!(permissions(admin.pk).await.unwrap().len(), 9);
    assert!(!permissions(organizer.pk)
        .await
        .unwrap()
        .contains(&"manage_roles".to_owned()));
    assert_eq!(permissions(participant.pk).await.unwrap(), ["view_event"]);

    let session = new_session(state).await;
    assert!(matches!(
        auth::require_permission(state, &session, "view_event").await,
        Err(AppError::PermissionDenied)
    ));

    state.sessions.login(&session, participant.pk).await.unwrap();
    assert!(matches!(
        auth::require_permission(state, &session, "add_event").await,
        Err(AppError::PermissionDenied)
    ));

    Group::assign_role(database, participant.pk, Role::Organizer as i64)
        .await
        .unwrap();
    let user = auth::require_permission(state, &session, "add_event")
        .await
        .unwrap();
    assert_eq!(user.pk, participant.pk);
    assert!(permissions(participant.pk)
        .await
        .unwrap()
        .contains(&"add_event".to_owned()));
    let groups = User::list_with_groups(database).await.unwrap();
    let promoted = groups.iter().find(|row| row.pk == participant.pk).unwrap();
    assert_eq!(promoted.groups.as_deref(), Some("Organizer"));
}

#[tokio::test]
async fn test_custom_group() {
    let app = StubApp::new("2024-03-05").await;
    let database = &app.state().database;
    let user = app.user("ada", Role::Participant).await;

    let group = Group::create(database, "Moderators", &[2, 3, 99])
        .await
        .unwrap();
    Group::assign_role(database, user.pk, group).await.unwrap();

    assert_eq!(
        Group::user_permissions(database, user.pk).await.unwrap(),
        ["change_event", "delete_event"]
    );
    assert!(matches!(
        Group::assign_role(database, user.pk, 404).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        Group::assign_role(database, 404, group).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(
        User::get(database, user.pk).await.unwrap().username,
        "ada"
    );
}
