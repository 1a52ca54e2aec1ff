// ============================
// taskvault-backend/src/storage/postgres.rs
// ============================
//! PostgreSQL storage on a `sqlx` pool.
//!
//! Every call is bounded by the configured query timeout and fails with
//! `AppError::Timeout` when it elapses.
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::info;

use super::Storage;
use crate::config::DatabaseSettings;
use crate::error::{AppError, AppResult};
use crate::models::{NewTask, NewUser, Task, TaskFilter, User};

const USER_COLUMNS: &str = "id, created_at, name, email, password_hash, is_activated, version";
const TASK_COLUMNS: &str = "id, created_at, user_id, content, is_completed, version";

/// PostgreSQL implementation of the Storage trait
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
    timeout: Duration,
}

#[derive(FromRow)]
struct TaskPageRow {
    total: i64,
    #[sqlx(flatten)]
    task: Task,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn map_user_write_error(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("a user with this email address already exists".into())
    } else {
        AppError::Database(err)
    }
}

/// Escape `LIKE` metacharacters so the filter matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl PgStorage {
    /// Connect, check the connection and run pending migrations.
    pub async fn connect(dsn: &str, settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.query_timeout_secs);
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(Duration::from_secs(settings.max_idle_time_secs))
            .acquire_timeout(timeout)
            .connect(dsn)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections = settings.max_connections, "database pool ready");

        Ok(Self { pool, timeout })
    }

    async fn bounded<T, F>(&self, query: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| AppError::Timeout("database"))?
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        self.bounded(async {
            sqlx::query_as::<_, User>(&sql)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(map_user_write_error)
        })
        .await
    }

    async fn update_user(&self, user: &User) -> AppResult<Option<i32>> {
        self.bounded(async {
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, is_activated = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_write_error)
        })
        .await
    }

    async fn delete_user(&self, id: i64) -> AppResult<bool> {
        self.bounded(async {
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        self.bounded(async {
            Ok(sqlx::query_as::<_, Task>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn tasks_for_user(&self, user_id: i64, filter: &TaskFilter) -> AppResult<(Vec<Task>, i64)> {
        // ORDER BY comes from a closed enum, never from user input.
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total, {TASK_COLUMNS}
            FROM tasks
            WHERE user_id = $1 AND ($2::text IS NULL OR content ILIKE $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            filter.sort.order_by()
        );
        let pattern = filter.content.as_deref().map(like_pattern);

        let rows = self
            .bounded(async {
                Ok(sqlx::query_as::<_, TaskPageRow>(&sql)
                    .bind(user_id)
                    .bind(pattern)
                    .bind(filter.page_size)
                    .bind(filter.offset())
                    .fetch_all(&self.pool)
                    .await?)
            })
            .await?;

        let total = rows.first().map_or(0, |row| row.total);
        Ok((rows.into_iter().map(|row| row.task).collect(), total))
    }

    async fn insert_task(&self, task: NewTask) -> AppResult<Task> {
        let sql = format!(
            "INSERT INTO tasks (user_id, content) VALUES ($1, $2) RETURNING {TASK_COLUMNS}"
        );
        self.bounded(async {
            Ok(sqlx::query_as::<_, Task>(&sql)
                .bind(task.user_id)
                .bind(&task.content)
                .fetch_one(&self.pool)
                .await?)
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> AppResult<Option<i32>> {
        self.bounded(async {
            Ok(sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE tasks
                SET content = $1, is_completed = $2, version = version + 1
                WHERE id = $3 AND version = $4
                RETURNING version
                "#,
            )
            .bind(&task.content)
            .bind(task.is_completed)
            .bind(task.id)
            .bind(task.version)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await
    }

    async fn delete_task(&self, id: i64) -> AppResult<bool> {
        self.bounded(async {
            let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        self.bounded(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            map_user_write_error(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }
}
