// ============================
// taskvault-backend/src/router.rs
// ============================
//! HTTP routes and the middleware stack.
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::CorsSettings;
use crate::error::AppError;
use crate::handlers::{auth, health, tasks, users};
use crate::middleware::{
    rate_limit, record_request, require_activated_user, require_authenticated_user,
};
use crate::AppState;

/// Build the `/v1` router.
///
/// Request order: trace, CORS, request counter, rate limit, then the
/// per-route authentication and activation checks.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/v1/healthcheck", get(health::healthcheck))
        .route("/v1/users", post(users::register))
        .route(
            "/v1/users/{id}/activation-code",
            post(users::resend_activation_code),
        )
        .route("/v1/users/{id}/activation", put(users::activate))
        .route("/v1/tokens/authentication", post(auth::login));

    let account = Router::new()
        .route(
            "/v1/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(from_fn_with_state(state.clone(), require_authenticated_user));

    let task_routes = Router::new()
        .route("/v1/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/v1/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route_layer(from_fn(require_activated_user))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated_user));

    public
        .merge(account)
        .merge(task_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn(record_request))
        .layer(cors_layer(&state.settings.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("the requested resource could not be found".into())
}

/// Origins are matched exactly; `*` trusts every origin.
fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origin = if settings.trusted_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = settings
            .trusted_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "ignoring malformed trusted origin");
                    None
                },
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

