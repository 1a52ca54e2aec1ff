// ============================
// taskvault-backend/src/storage/memory.rs
// ============================
//! Process-local storage used when no database is configured, and by tests.
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::Storage;
use crate::error::{AppError, AppResult};
use crate::models::{NewTask, NewUser, Task, TaskFilter, TaskSort, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, Task>,
    last_user_id: i64,
    last_task_id: i64,
}

/// In-memory implementation of the Storage trait
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_tasks(tasks: &mut [Task], sort: TaskSort) {
    match sort {
        TaskSort::IdAsc => tasks.sort_by_key(|t| t.id),
        TaskSort::IdDesc => tasks.sort_by_key(|t| std::cmp::Reverse(t.id)),
        TaskSort::CreatedAtAsc => tasks.sort_by_key(|t| (t.created_at, t.id)),
        TaskSort::CreatedAtDesc => {
            tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)))
        },
        TaskSort::CompletedAsc => tasks.sort_by_key(|t| (t.is_completed, t.id)),
        TaskSort::CompletedDesc => {
            tasks.sort_by(|a, b| b.is_completed.cmp(&a.is_completed).then(a.id.cmp(&b.id)))
        },
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("a user with this email address already exists".into()));
        }
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_activated: false,
            version: 1,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> AppResult<Option<i32>> {
        let mut tables = self.tables.lock();
        let email_taken = tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email);
        let Some(stored) = tables.users.get_mut(&user.id) else {
            return Ok(None);
        };
        if stored.version != user.version {
            return Ok(None);
        }
        if email_taken {
            return Err(AppError::Conflict("a user with this email address already exists".into()));
        }
        stored.name.clone_from(&user.name);
        stored.email.clone_from(&user.email);
        stored.password_hash.clone_from(&user.password_hash);
        stored.is_activated = user.is_activated;
        stored.version += 1;
        Ok(Some(stored.version))
    }

    async fn delete_user(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.tables.lock();
        let removed = tables.users.remove(&id).is_some();
        if removed {
            tables.tasks.retain(|_, t| t.user_id != id);
        }
        Ok(removed)
    }

    async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>> {
        Ok(self.tables.lock().tasks.get(&id).cloned())
    }

    async fn tasks_for_user(&self, user_id: i64, filter: &TaskFilter) -> AppResult<(Vec<Task>, i64)> {
        let needle = filter.content.as_deref().map(str::to_lowercase);
        let mut matching: Vec<Task> = self
            .tables
            .lock()
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| {
                needle
                    .as_deref()
                    .map_or(true, |n| t.content.to_lowercase().contains(n))
            })
            .cloned()
            .collect();

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        sort_tasks(&mut matching, filter.sort);
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.page_size).unwrap_or(0);
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn insert_task(&self, task: NewTask) -> AppResult<Task> {
        let mut tables = self.tables.lock();
        if !tables.users.contains_key(&task.user_id) {
            return Err(AppError::NotFound("task owner does not exist".into()));
        }
        tables.last_task_id += 1;
        let task = Task {
            id: tables.last_task_id,
            created_at: Utc::now(),
            user_id: task.user_id,
            content: task.content,
            is_completed: false,
            version: 1,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: &Task) -> AppResult<Option<i32>> {
        let mut tables = self.tables.lock();
        match tables.tasks.get_mut(&task.id) {
            Some(stored) if stored.version == task.version => {
                stored.content.clone_from(&task.content);
                stored.is_completed = task.is_completed;
                stored.version += 1;
                Ok(Some(stored.version))
            },
            _ => Ok(None),
        }
    }

    async fn delete_task(&self, id: i64) -> AppResult<bool> {
        Ok(self.tables.lock().tasks.remove(&id).is_some())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
