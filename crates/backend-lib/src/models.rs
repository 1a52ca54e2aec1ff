// ============================
// taskvault-backend/src/models.rs
// ============================
//! Persisted records.
use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use taskvault_common::{TaskView, UserView};

/// A registered account. `version` starts at 1 and grows by one on every
/// successful update.
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_activated: bool,
    pub version: i32,
}

impl User {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            created_at: self.created_at,
            name: self.name.clone(),
            email: self.email.clone(),
            is_activated: self.is_activated,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[redacted]")
            .field("is_activated", &self.is_activated)
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Task {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub content: String,
    pub is_completed: bool,
    pub version: i32,
}

impl Task {
    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            created_at: self.created_at,
            user_id: self.user_id,
            content: self.content.clone(),
            is_completed: self.is_completed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: i64,
    pub content: String,
}

/// Sort orders accepted by the task listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    IdAsc,
    IdDesc,
    CreatedAtAsc,
    CreatedAtDesc,
    CompletedAsc,
    CompletedDesc,
}

impl TaskSort {
    pub const ALLOWED: [&'static str; 6] = [
        "id",
        "-id",
        "created_at",
        "-created_at",
        "is_completed",
        "-is_completed",
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::IdAsc),
            "-id" => Some(Self::IdDesc),
            "created_at" => Some(Self::CreatedAtAsc),
            "-created_at" => Some(Self::CreatedAtDesc),
            "is_completed" => Some(Self::CompletedAsc),
            "-is_completed" => Some(Self::CompletedDesc),
            _ => None,
        }
    }

    /// SQL `ORDER BY` clause. Ties always break on id ascending.
    pub fn order_by(self) -> &'static str {
        match self {
            Self::IdAsc => "id ASC",
            Self::IdDesc => "id DESC",
            Self::CreatedAtAsc => "created_at ASC, id ASC",
            Self::CreatedAtDesc => "created_at DESC, id ASC",
            Self::CompletedAsc => "is_completed ASC, id ASC",
            Self::CompletedDesc => "is_completed DESC, id ASC",
        }
    }
}

/// Validated listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub content: Option<String>,
    pub sort: TaskSort,
    pub page: i64,
    pub page_size: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            content: None,
            sort: TaskSort::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl TaskFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_keys_round_trip() {
        for key in TaskSort::ALLOWED {
            assert!(TaskSort::parse(key).is_some(), "{key} should parse");
        }
        assert_eq!(TaskSort::parse("content"), None);
        assert_eq!(TaskSort::parse("-created_at"), Some(TaskSort::CreatedAtDesc));
    }

    #[test]
    fn test_filter_offset() {
        let filter = TaskFilter {
            page: 3,
            page_size: 20,
            ..TaskFilter::default()
        };
        assert_eq!(filter.offset(), 40);
        assert_eq!(TaskFilter::default().offset(), 0);
    }

    #[test]
    fn test_user_debug_hides_password_hash() {
        let user = User {
            id: 1,
            created_at: Utc::now(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$scrypt$secret".into(),
            is_activated: false,
            version: 1,
        };
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
