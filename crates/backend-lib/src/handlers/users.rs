// ============================
// taskvault-backend/src/handlers/users.rs
// ============================
//! Registration, activation and account management.
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use taskvault_common::{
    ActivateRequest, MessageEnvelope, RegisterRequest, UpdateUserRequest, UserEnvelope,
};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::resource_id;
use crate::auth::{hash_password_blocking, AuthenticatedUser};
use crate::cache::CodeCheck;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};
use crate::notify::{activation_message, deliver_with_retry};
use crate::validation::Validator;
use crate::AppState;

const ALREADY_ACTIVATED: &str = "user has already been activated";

/// Issue a code for `user` and email it. The code is withdrawn again if
/// delivery fails so that a resend can issue a fresh one.
async fn send_activation_code(state: &AppState, user: &User) -> AppResult<()> {
    let code = state.activation.issue(user.id);
    let message = activation_message(&state.settings.mail.sender, user, code, state.activation.ttl());

    if let Err(e) =
        deliver_with_retry(&*state.notifier, &message, state.settings.mail.max_attempts).await
    {
        state.activation.clear(user.id);
        return Err(AppError::Internal(format!("activation email failed: {e}")));
    }
    Ok(())
}

fn require_self(caller: &User, id: i64) -> AppResult<()> {
    if caller.id != id {
        warn!(caller = caller.id, target = id, "access to another user's account denied");
        return Err(AppError::Forbidden("you can only access your own account".into()));
    }
    Ok(())
}

/// `POST /v1/users`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<UserEnvelope>)> {
    let Json(input) = body?;
    let password = Zeroizing::new(input.password);

    let mut v = Validator::new();
    v.check_name(&input.name);
    v.check_email(&input.email);
    v.check_password(&password);
    v.finish()?;

    let password_hash = hash_password_blocking(password, state.settings.password.clone()).await?;
    let user = state
        .storage
        .insert_user(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, "user registered");

    let message = match send_activation_code(&state, &user).await {
        Ok(()) => format!("we have sent an activation code to your email: {}", user.email),
        Err(e) => {
            warn!(user_id = user.id, error = %e, "registered without an activation email");
            "your account was created but the activation email could not be sent, request a new code"
                .to_string()
        },
    };

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: user.view(),
            message: Some(message),
        }),
    ))
}

/// `POST /v1/users/{id}/activation-code`
///
/// A still-valid code is left alone; only an expired or missing one is replaced.
pub async fn resend_activation_code(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageEnvelope>> {
    let id = resource_id(path)?;
    let user = state
        .storage
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if user.is_activated {
        return Err(AppError::Conflict(ALREADY_ACTIVATED.into()));
    }

    if state.activation.has_expired(user.id) {
        send_activation_code(&state, &user).await?;
    }

    Ok(Json(MessageEnvelope::new(format!(
        "we have sent an activation code to your email: {}",
        user.email
    ))))
}

/// `PUT /v1/users/{id}/activation`
pub async fn activate(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ActivateRequest>, JsonRejection>,
) -> AppResult<Json<UserEnvelope>> {
    let id = resource_id(path)?;
    let Json(input) = body?;

    let mut v = Validator::new();
    v.check(input.code.is_some(), "code", "must be provided");
    v.finish()?;
    let code = input.code.unwrap_or_default();

    let mut user = state
        .storage
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if user.is_activated {
        return Err(AppError::Conflict(ALREADY_ACTIVATED.into()));
    }

    match state.activation.verify(user.id, code) {
        CodeCheck::Valid => {},
        CodeCheck::Expired => return Err(AppError::ActivationCodeExpired),
        CodeCheck::Mismatch => return Err(AppError::ActivationCodeMismatch),
    }

    user.is_activated = true;
    let user = state.mutator.update(user).await?;
    state.activation.clear(user.id);
    info!(user_id = user.id, "user activated");

    Ok(Json(UserEnvelope {
        user: user.view(),
        message: None,
    }))
}

/// `GET /v1/users/{id}`
pub async fn get_user(
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserEnvelope>> {
    let id = resource_id(path)?;
    require_self(&caller, id)?;

    Ok(Json(UserEnvelope {
        user: caller.view(),
        message: None,
    }))
}

/// `PATCH /v1/users/{id}`
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<UserEnvelope>> {
    let id = resource_id(path)?;
    require_self(&caller, id)?;
    let Json(input) = body?;
    let password = input.password.map(Zeroizing::new);

    let mut v = Validator::new();
    if let Some(name) = &input.name {
        v.check_name(name);
    }
    if let Some(email) = &input.email {
        v.check_email(email);
    }
    if let Some(password) = &password {
        v.check_password(password);
    }
    v.check(
        input.name.is_some() || input.email.is_some() || password.is_some(),
        "name or email or password",
        "must be provided",
    );
    v.finish()?;

    let mut user = caller;
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(email) = input.email {
        user.email = email;
    }
    if let Some(password) = password {
        user.password_hash = hash_password_blocking(password, state.settings.password.clone()).await?;
    }

    let user = state.mutator.update(user).await?;
    info!(user_id = user.id, version = user.version, "user updated");

    Ok(Json(UserEnvelope {
        user: user.view(),
        message: None,
    }))
}

/// `DELETE /v1/users/{id}`
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageEnvelope>> {
    let id = resource_id(path)?;
    require_self(&caller, id)?;

    if !state.storage.delete_user(id).await? {
        return Err(AppError::NotFound("user not found".into()));
    }
    state.activation.clear(id);
    info!(user_id = id, "user deleted");

    Ok(Json(MessageEnvelope::new("user successfully deleted")))
}
