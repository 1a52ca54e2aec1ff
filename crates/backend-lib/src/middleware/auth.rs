// ============================
// taskvault-backend/src/middleware/auth.rs
// ============================
//! Bearer authentication and the activated-account gate.
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{bearer_token, AuthenticatedUser};
use crate::error::AppError;
use crate::AppState;

/// Resolve the bearer token to a user and attach it to the request.
/// The response varies on `Authorization` whether or not the check passes.
pub async fn require_authenticated_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = match bearer_token(request.headers()) {
        Ok(token) => state.verifier.verify(token).await,
        Err(e) => Err(e),
    };

    let mut response = match resolved {
        Ok(user) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        },
        Err(e) => e.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Requires [`require_authenticated_user`] to have run first.
pub async fn require_activated_user(
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.is_activated {
        return Err(AppError::Forbidden(
            "your user account must be activated to access this resource".into(),
        ));
    }
    Ok(next.run(request).await)
}
