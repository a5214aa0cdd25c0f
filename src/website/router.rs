use axum::{
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceBuilder;
use tower_http::{
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestId, RequestId},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit, ServiceBuilderExt,
};
use tracing::Level;

use crate::{
    auth::{login_required_middleware, sessions_middleware},
    state::AppState,
};

use super::{events, users, views};

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::home))
        .route("/events", get(events::list))
        .route("/events/{id}", get(events::details))
        .route("/user/sign-up", get(users::sign_up).post(users::post_sign_up))
        .route("/user/sign-in", get(users::sign_in).post(users::post_sign_in))
        .route("/user/activate/{slug}", get(users::activate))
        .route(
            "/user/password-reset",
            get(users::password_reset).post(users::post_password_reset),
        )
        .route(
            "/user/password-reset/{slug}",
            get(users::password_reset_confirm).post(users::post_password_reset_confirm),
        )
        .route("/no-permission", get(views::no_permission))
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/rsvp", post(events::rsvp))
        .route("/events/dashboard", get(events::dashboard))
        .route("/events/participants", get(events::participants))
        .route("/events/new", get(events::new_event).post(events::create_event))
        .route(
            "/events/{id}/edit",
            get(events::edit_event).post(events::update_event),
        )
        .route("/events/{id}/delete", post(events::delete_event))
        .route(
            "/categories",
            get(events::categories).post(events::create_category),
        )
        .route(
            "/categories/{id}/edit",
            get(events::edit_category).post(events::update_category),
        )
        .route("/categories/{id}/delete", post(events::delete_category))
        .route("/user/sign-out", post(users::sign_out))
        .route("/user/profile", get(users::profile).post(users::update_profile))
        .route("/user/rsvps", get(users::rsvps))
        .route("/admin/users", get(users::admin_users))
        .route("/admin/users/{id}/role", post(users::assign_role))
        .route(
            "/admin/groups",
            get(users::admin_groups).post(users::create_group),
        )
        .route_layer(from_fn(login_required_middleware))
}

/// Every page of the site behind the sessions middleware and the shared
/// tower-http stack.
pub fn get_router(state: AppState) -> Router {
    let sensitive_headers: Arc<[_]> = vec![axum::http::header::COOKIE].into();
    let middleware = ServiceBuilder::new()
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(SetSensitiveRequestHeadersLayer::from_shared(
            sensitive_headers.clone(),
        ))
        .set_x_request_id(CounterRequestId::default())
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Micros),
                )
                .on_failure(DefaultOnFailure::new().level(Level::WARN)),
        )
        .sensitive_response_headers(sensitive_headers)
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .compression()
        .propagate_x_request_id();

    Router::new()
        .merge(public_routes())
        .merge(protected_routes())
        .fallback(views::error_404)
        .layer(from_fn_with_state(state.clone(), sessions_middleware))
        .layer(middleware)
        .with_state(state)
}

#[derive(Clone, Default)]
struct CounterRequestId {
    counter: Arc<AtomicU64>,
}

impl MakeRequestId for CounterRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        self.counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
            .parse()
            .ok()
            .map(RequestId::new)
    }
}
