// ============================
// taskvault-backend/src/middleware/mod.rs
// ============================
//! Middleware for the `taskvault` REST server.
use axum::{extract::Request, middleware::Next, response::Response};
use metrics::counter;

use crate::metrics::HTTP_REQUESTS;

pub mod auth;
pub mod rate_limit;

pub use auth::{require_activated_user, require_authenticated_user};
pub use rate_limit::{client_ip, rate_limit};

/// Count every request by method and final status.
pub async fn record_request(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    counter!(
        HTTP_REQUESTS,
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
