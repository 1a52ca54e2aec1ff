// ============================
// taskvault-backend/src/handlers/auth.rs
// ============================
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use taskvault_common::{LoginRequest, TokenEnvelope};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::auth::verify_password_blocking;
use crate::error::{AppError, AppResult};
use crate::metrics::AUTH_FAILED;
use crate::validation::Validator;
use crate::AppState;

const BAD_CREDENTIALS: &str = "email or password are not correct";

/// `POST /v1/tokens/authentication`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<TokenEnvelope>)> {
    let Json(input) = body?;
    let password = Zeroizing::new(input.password);

    let mut v = Validator::new();
    v.check_email(&input.email);
    v.check_password(&password);
    v.finish()?;

    let Some(user) = state.storage.user_by_email(&input.email).await? else {
        counter!(AUTH_FAILED, "reason" => "unknown_email").increment(1);
        debug!("login for unknown email");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !verify_password_blocking(user.password_hash.clone(), password).await? {
        counter!(AUTH_FAILED, "reason" => "password").increment(1);
        debug!(user_id = user.id, "login with wrong password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let (token, expires_at) = state
        .tokens
        .issue(user.id)
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;
    info!(user_id = user.id, "authentication token issued");

    Ok((StatusCode::CREATED, Json(TokenEnvelope { token, expires_at })))
}
