// ============================
// taskvault-backend/src/handlers/tasks.rs
// ============================
//! Task CRUD for the authenticated, activated user.
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use taskvault_common::{
    CreateTaskRequest, MessageEnvelope, TaskEnvelope, TaskListEnvelope, TaskListParams,
    UpdateTaskRequest,
};
use tracing::{debug, info, warn};

use super::resource_id;
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewTask, Task, User};
use crate::validation::{task_filter, Validator};
use crate::AppState;

/// Load task `id` and make sure `caller` owns it.
async fn owned_task(state: &AppState, caller: &User, id: i64) -> AppResult<Task> {
    let task = state
        .storage
        .task_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("task not found".into()))?;

    if task.user_id != caller.id {
        warn!(caller = caller.id, task_id = id, "access to another user's task denied");
        return Err(AppError::Forbidden("you can only access your own tasks".into()));
    }
    Ok(task)
}

/// `POST /v1/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<TaskEnvelope>)> {
    let Json(input) = body?;

    let mut v = Validator::new();
    v.check_content(input.content.as_deref());
    v.finish()?;

    let task = state
        .storage
        .insert_task(NewTask {
            user_id: caller.id,
            content: input.content.unwrap_or_default(),
        })
        .await?;
    info!(user_id = caller.id, task_id = task.id, "task created");

    Ok((StatusCode::CREATED, Json(TaskEnvelope { task: task.view() })))
}

/// `GET /v1/tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    query: Result<Query<TaskListParams>, QueryRejection>,
) -> AppResult<Json<TaskListEnvelope>> {
    let Query(params) = query?;
    let filter = task_filter(&params)?;

    let (tasks, total) = state.storage.tasks_for_user(caller.id, &filter).await?;
    debug!(user_id = caller.id, returned = tasks.len(), total, "tasks listed");

    Ok(Json(TaskListEnvelope {
        tasks: tasks.iter().map(Task::view).collect(),
        total,
    }))
}

/// `GET /v1/tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<TaskEnvelope>> {
    let id = resource_id(path)?;
    let task = owned_task(&state, &caller, id).await?;
    Ok(Json(TaskEnvelope { task: task.view() }))
}

/// `PATCH /v1/tasks/{id}`
pub async fn update_task(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> AppResult<Json<TaskEnvelope>> {
    let id = resource_id(path)?;
    let Json(input) = body?;

    let mut v = Validator::new();
    if let Some(content) = &input.content {
        v.check(!content.trim().is_empty(), "content", "must not be empty");
    }
    v.check(
        input.content.is_some() || input.is_completed.is_some(),
        "content or is_completed",
        "must be provided",
    );
    v.finish()?;

    let mut task = owned_task(&state, &caller, id).await?;
    if let Some(content) = input.content {
        task.content = content;
    }
    if let Some(is_completed) = input.is_completed {
        task.is_completed = is_completed;
    }

    let task = state.mutator.update(task).await?;
    info!(task_id = task.id, version = task.version, "task updated");

    Ok(Json(TaskEnvelope { task: task.view() }))
}

/// `DELETE /v1/tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageEnvelope>> {
    let id = resource_id(path)?;
    owned_task(&state, &caller, id).await?;

    if !state.storage.delete_task(id).await? {
        return Err(AppError::NotFound("task not found".into()));
    }
    info!(task_id = id, "task deleted");

    Ok(Json(MessageEnvelope::new("task deleted successfully")))
}
