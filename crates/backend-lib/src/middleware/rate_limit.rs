// ============================
// taskvault-backend/src/middleware/rate_limit.rs
// ============================
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, AppState};

const REAL_IP_HEADER: &str = "x-real-ip";

/// Client key for admission control.
///
/// `X-Real-IP` is honoured only when the server sits behind a trusted proxy;
/// otherwise the peer address of the connection is used.
pub fn client_ip(request: &Request, trust_proxy_header: bool) -> Option<String> {
    if trust_proxy_header {
        let forwarded = request
            .headers()
            .get(REAL_IP_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let settings = &state.settings.rate_limit;
    if !settings.enabled {
        return Ok(next.run(request).await);
    }

    let client = client_ip(&request, settings.trust_proxy_header)
        .ok_or_else(|| AppError::Internal("client address unavailable".into()))?;

    if !state.admission.allow(&client) {
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}
