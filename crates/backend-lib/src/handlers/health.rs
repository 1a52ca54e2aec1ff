// ============================
// taskvault-backend/src/handlers/health.rs
// ============================
use axum::{extract::State, Json};
use taskvault_common::HealthStatus;

use crate::{error::AppResult, AppState};

/// `GET /v1/healthcheck`
pub async fn healthcheck(State(state): State<AppState>) -> AppResult<Json<HealthStatus>> {
    state.storage.ping().await?;
    Ok(Json(HealthStatus {
        status: "available".to_string(),
        environment: state.settings.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
