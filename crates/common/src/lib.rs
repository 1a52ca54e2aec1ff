// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `taskvault` clients and the server.
//! This module defines the JSON request bodies, response envelopes and
//! the public views of users and tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public representation of a user account.
///
/// The password hash and the version counter are server-side only and never
/// appear here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub is_activated: bool,
}

/// Public representation of a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub content: String,
    pub is_completed: bool,
}

/// Body of `POST /v1/users`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `PATCH /v1/users/{id}`. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `PUT /v1/users/{id}/activation`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ActivateRequest {
    pub code: Option<i64>,
}

/// Body of `POST /v1/tokens/authentication`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /v1/tasks`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateTaskRequest {
    pub content: Option<String>,
}

/// Body of `PATCH /v1/tasks/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateTaskRequest {
    pub content: Option<String>,
    pub is_completed: Option<bool>,
}

/// Query string of `GET /v1/tasks`.
///
/// Numbers are kept as strings so the server can report a field-level
/// validation error instead of a generic rejection.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TaskListParams {
    pub sort: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub content: Option<String>,
}

/// `{ "user": ..., "message": ... }`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserEnvelope {
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `{ "task": ... }`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskEnvelope {
    pub task: TaskView,
}

/// `{ "tasks": [...], "total": n }`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskListEnvelope {
    pub tasks: Vec<TaskView>,
    pub total: i64,
}

/// Issued bearer token and its absolute expiry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenEnvelope {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Plain `{ "message": ... }` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub message: String,
}

impl MessageEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response of `GET /v1/healthcheck`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub environment: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_missing_fields_are_none() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"is_completed": true}"#).unwrap();
        assert!(req.content.is_none());
        assert_eq!(req.is_completed, Some(true));
    }

    #[test]
    fn test_user_envelope_omits_empty_message() {
        let envelope = UserEnvelope {
            user: UserView {
                id: 1,
                created_at: Utc::now(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                is_activated: false,
            },
            message: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("message").is_none());
        assert_eq!(json["user"]["email"], "ada@example.com");
        assert!(json["user"].get("password_hash").is_none());
    }
}
