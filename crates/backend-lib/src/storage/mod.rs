// ============================
// taskvault-backend/src/storage/mod.rs
// ============================
//! Storage abstraction with PostgreSQL and in-memory implementations.
//!
//! Conditional writes (`update_user`, `update_task`) match on both id and
//! version and return the new version, or `None` when no row matched.
use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{NewTask, NewUser, Task, TaskFilter, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Insert a user with version 1. A taken email is `AppError::Conflict`.
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    /// Persist every mutable field of `user` if its version still matches.
    async fn update_user(&self, user: &User) -> AppResult<Option<i32>>;

    /// Delete a user and the tasks it owns.
    async fn delete_user(&self, id: i64) -> AppResult<bool>;

    async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>>;

    /// One page of the user's tasks plus the total number of matches.
    async fn tasks_for_user(&self, user_id: i64, filter: &TaskFilter) -> AppResult<(Vec<Task>, i64)>;

    async fn insert_task(&self, task: NewTask) -> AppResult<Task>;

    /// Persist `content` and `is_completed` if the version still matches.
    async fn update_task(&self, task: &Task) -> AppResult<Option<i32>>;

    async fn delete_task(&self, id: i64) -> AppResult<bool>;

    /// Cheap liveness probe used by the health check.
    async fn ping(&self) -> AppResult<()>;
}
