// ============================
// taskvault-backend/src/handlers/mod.rs
// ============================
//! HTTP handlers for the `/v1` API.
use axum::extract::{rejection::PathRejection, Path};

use crate::error::{AppError, AppResult};

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

/// The `{id}` route parameter; ids start at 1.
pub(crate) fn resource_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    let Path(id) = path?;
    if id < 1 {
        return Err(AppError::InvalidInput(
            "route parameter {id} must be a positive integer".into(),
        ));
    }
    Ok(id)
}
