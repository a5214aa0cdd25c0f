use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;

use crate::{
    auth::{require_permission, require_user},
    errors::AppError,
    events::{self, Dashboard, EventDetails, EventListing, EventQuery, Participant},
    mailing::Notification,
    models::{Category, Event},
    sessions::Session,
    state::AppState,
};

use super::{
    forms::{CategoryForm, CsrfOnly, EventForm, SecureForm},
    views::{template_to_response, template_with_status, HtmlResult, Page},
};

#[derive(Template)]
#[template(path = "events/list.html")]
struct EventListTemplate {
    page: Page,
    listing: EventListing,
    action: &'static str,
}

async fn render_listing(
    state: &AppState,
    session: &Session,
    query: EventQuery,
    title: &str,
    action: &'static str,
) -> HtmlResult {
    let listing = events::list_events(&state.database, query, state.today()).await?;
    let page = Page::load(state, session, title).await?;
    template_to_response(&EventListTemplate {
        page,
        listing,
        action,
    })
}

pub async fn home(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<EventQuery>,
) -> HtmlResult {
    render_listing(&state, &session, query, "Home", "/").await
}

pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<EventQuery>,
) -> HtmlResult {
    render_listing(&state, &session, query, "Events", "/events").await
}

#[derive(Debug, Default, Deserialize)]
pub struct RsvpNotice {
    rsvp: Option<String>,
}

#[derive(Template)]
#[template(path = "events/details.html")]
struct DetailsTemplate {
    page: Page,
    details: EventDetails,
    has_rsvp: bool,
    notice: &'static str,
}

pub async fn details(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    Query(notice): Query<RsvpNotice>,
) -> HtmlResult {
    let details = events::event_details(&state.database, pk).await?;
    let page = Page::load(&state, &session, &details.event.name).await?;
    let has_rsvp = match &page.user {
        Some(user) => Event::has_rsvp(&state.database, pk, user.pk).await?,
        None => false,
    };
    let notice = match notice.rsvp.as_deref() {
        Some("confirmed") => "You have successfully RSVPed to this event.",
        Some("already") => "You have already RSVPed to this event.",
        _ => "",
    };
    template_to_response(&DetailsTemplate {
        page,
        details,
        has_rsvp,
        notice,
    })
}

/// Records the RSVP once, the confirmation mail only goes out the first time.
pub async fn rsvp(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    _form: SecureForm<CsrfOnly>,
) -> Result<Redirect, AppError> {
    let user = require_user(&state, &session).await?;
    let created = Event::rsvp(&state.database, pk, user.pk).await?;

    if !created {
        return Ok(Redirect::to(&format!("/events/{}?rsvp=already", pk)));
    }

    tracing::info!(event_pk = pk, user_pk = user.pk, "rsvp recorded");
    let event = Event::get(&state.database, pk).await?;
    let notification = Notification::RsvpConfirmation {
        username: user.username.clone(),
        event_name: event.name,
    };
    if let Err(e) = state
        .mailer
        .notify(&state.config, &user.email, notification)
        .await
    {
        tracing::warn!(error = %e, event_pk = pk, "rsvp confirmation not sent");
    }

    Ok(Redirect::to(&format!("/events/{}?rsvp=confirmed", pk)))
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, rename = "type")]
    filter_type: String,
}

#[derive(Template)]
#[template(path = "events/dashboard.html")]
struct DashboardTemplate {
    page: Page,
    dashboard: Dashboard,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DashboardQuery>,
) -> HtmlResult {
    require_permission(&state, &session, "view_participants").await?;
    let dashboard = events::dashboard(&state.database, &query.filter_type, state.today()).await?;
    let page = Page::load(&state, &session, "Dashboard").await?;
    template_to_response(&DashboardTemplate { page, dashboard })
}

#[derive(Template)]
#[template(path = "events/participants.html")]
struct ParticipantsTemplate {
    page: Page,
    participants: Vec<Participant>,
}

pub async fn participants(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> HtmlResult {
    require_permission(&state, &session, "view_participants").await?;
    let participants = events::participants(&state.database).await?;
    let page = Page::load(&state, &session, "Participants").await?;
    template_to_response(&ParticipantsTemplate { page, participants })
}

#[derive(Template)]
#[template(path = "events/event_form.html")]
struct EventFormTemplate {
    page: Page,
    form: EventForm,
    categories: Vec<Category>,
    errors: Vec<String>,
    action: String,
}

async fn render_event_form(
    state: &AppState,
    session: &Session,
    title: &str,
    action: String,
    form: EventForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let template = EventFormTemplate {
        page: Page::load(state, session, title).await?,
        form,
        categories: Category::list(&state.database).await?,
        errors,
        action,
    };
    template_with_status(status, &template)
}

pub async fn new_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "add_event").await?;
    render_event_form(
        &state,
        &session,
        "Create event",
        "/events/new".into(),
        EventForm::default(),
        Vec::new(),
    )
    .await
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<EventForm>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "add_event").await?;
    let form = form.data();
    let created = match form.to_data() {
        Ok(data) => Event::create(&state.database, &data).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(pk) => Ok(Redirect::to(&format!("/events/{}", pk)).into_response()),
        Err(AppError::Validation(errors)) => {
            render_event_form(&state, &session, "Create event", "/events/new".into(), form, errors)
                .await
        }
        Err(e) => Err(e),
    }
}

pub async fn edit_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "change_event").await?;
    let event = Event::get(&state.database, pk).await?;
    render_event_form(
        &state,
        &session,
        "Update event",
        format!("/events/{}/edit", pk),
        EventForm::from_event(&event),
        Vec::new(),
    )
    .await
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    form: SecureForm<EventForm>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "change_event").await?;
    let form = form.data();
    let updated = match form.to_data() {
        Ok(data) => Event::update(&state.database, pk, &data).await,
        Err(e) => Err(e),
    };
    match updated {
        Ok(()) => Ok(Redirect::to(&format!("/events/{}", pk)).into_response()),
        Err(AppError::Validation(errors)) => {
            render_event_form(
                &state,
                &session,
                "Update event",
                format!("/events/{}/edit", pk),
                form,
                errors,
            )
            .await
        }
        Err(e) => Err(e),
    }
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    _form: SecureForm<CsrfOnly>,
) -> Result<Redirect, AppError> {
    require_permission(&state, &session, "delete_event").await?;
    Event::delete(&state.database, pk).await?;
    Ok(Redirect::to("/events"))
}

#[derive(Template)]
#[template(path = "events/categories.html")]
struct CategoriesTemplate {
    page: Page,
    categories: Vec<Category>,
    form: CategoryForm,
    errors: Vec<String>,
}

async fn render_categories(
    state: &AppState,
    session: &Session,
    form: CategoryForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let template = CategoriesTemplate {
        page: Page::load(state, session, "Categories").await?,
        categories: Category::list(&state.database).await?,
        form,
        errors,
    };
    template_with_status(status, &template)
}

pub async fn categories(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "add_category").await?;
    render_categories(&state, &session, CategoryForm::default(), Vec::new()).await
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: SecureForm<CategoryForm>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "add_category").await?;
    let form = form.data();
    let created = match form.to_data() {
        Ok(data) => Category::create(&state.database, &data).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(_) => Ok(Redirect::to("/categories").into_response()),
        Err(AppError::Validation(errors)) => {
            render_categories(&state, &session, form, errors).await
        }
        Err(e) => Err(e),
    }
}

#[derive(Template)]
#[template(path = "events/category_form.html")]
struct CategoryFormTemplate {
    page: Page,
    pk: i64,
    form: CategoryForm,
    errors: Vec<String>,
}

pub async fn edit_category(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
) -> HtmlResult {
    require_permission(&state, &session, "change_category").await?;
    let category = Category::get(&state.database, pk).await?;
    template_to_response(&CategoryFormTemplate {
        page: Page::load(&state, &session, "Update category").await?,
        pk,
        form: CategoryForm::from_category(&category),
        errors: Vec::new(),
    })
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    form: SecureForm<CategoryForm>,
) -> Result<Response, AppError> {
    require_permission(&state, &session, "change_category").await?;
    let form = form.data();
    let updated = match form.to_data() {
        Ok(data) => Category::update(&state.database, pk, &data).await,
        Err(e) => Err(e),
    };
    match updated {
        Ok(()) => Ok(Redirect::to("/categories").into_response()),
        Err(AppError::Validation(errors)) => {
            let template = CategoryFormTemplate {
                page: Page::load(&state, &session, "Update category").await?,
                pk,
                form,
                errors,
            };
            template_with_status(StatusCode::BAD_REQUEST, &template)
        }
        Err(e) => Err(e),
    }
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(pk): Path<i64>,
    _form: SecureForm<CsrfOnly>,
) -> Result<Redirect, AppError> {
    require_permission(&state, &session, "delete_category").await?;
    Category::delete(&state.database, pk).await?;
    Ok(Redirect::to("/categories"))
}
