// ============================
// taskvault-backend/src/mutator.rs
// ============================
//! Optimistic concurrency control for persisted entities.
//!
//! A write succeeds only if the stored version still equals the version the
//! caller read. On success the entity's version advances by exactly one. A
//! stale or deleted row yields `AppError::EditConflict`; nothing is retried.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::metrics::{UPDATE_ACCEPTED, UPDATE_CONFLICT};
use crate::models::{Task, User};
use crate::storage::Storage;

/// An entity carrying a version counter that storage can conditionally write.
#[async_trait]
pub trait Versioned: Send + Sync {
    /// Entity name used in conflict errors and logs.
    const KIND: &'static str;

    fn id(&self) -> i64;

    fn version(&self) -> i32;

    fn set_version(&mut self, version: i32);

    /// Write all mutable fields if the stored version equals `self.version()`.
    async fn write_if_version(&self, storage: &dyn Storage) -> AppResult<Option<i32>>;
}

#[async_trait]
impl Versioned for User {
    const KIND: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    async fn write_if_version(&self, storage: &dyn Storage) -> AppResult<Option<i32>> {
        storage.update_user(self).await
    }
}

#[async_trait]
impl Versioned for Task {
    const KIND: &'static str = "task";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    async fn write_if_version(&self, storage: &dyn Storage) -> AppResult<Option<i32>> {
        storage.update_task(self).await
    }
}

/// Runs versioned updates against storage, bounded by a timeout.
pub struct OptimisticMutator {
    storage: Arc<dyn Storage>,
    timeout: Duration,
}

impl OptimisticMutator {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    /// Persist `entity` and return it with its new version.
    pub async fn update<E: Versioned>(&self, mut entity: E) -> AppResult<E> {
        let read_version = entity.version();
        let outcome = tokio::time::timeout(
            self.timeout,
            entity.write_if_version(self.storage.as_ref()),
        )
        .await;

        match outcome {
            Err(_) => {
                warn!(entity = E::KIND, id = entity.id(), "versioned update timed out");
                Err(AppError::Timeout("storage"))
            },
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => {
                counter!(UPDATE_CONFLICT, "entity" => E::KIND).increment(1);
                warn!(
                    entity = E::KIND,
                    id = entity.id(),
                    version = read_version,
                    "edit conflict"
                );
                Err(AppError::EditConflict {
                    entity: E::KIND,
                    id: entity.id(),
                })
            },
            Ok(Ok(Some(version))) => {
                counter!(UPDATE_ACCEPTED, "entity" => E::KIND).increment(1);
                debug!(entity = E::KIND, id = entity.id(), version, "versioned update applied");
                entity.set_version(version);
                Ok(entity)
            },
        }
    }
}

impl std::fmt::Debug for OptimisticMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMutator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, NewUser, TaskFilter};
    use crate::storage::MemoryStorage;

    async fn seeded() -> (Arc<MemoryStorage>, User, Task) {
        let storage = Arc::new(MemoryStorage::new());
        let user = storage
            .insert_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let task = storage
            .insert_task(NewTask {
                user_id: user.id,
                content: "write tests".into(),
            })
            .await
            .unwrap();
        (storage, user, task)
    }

    #[tokio::test]
    async fn test_update_advances_version_by_one() {
        let (storage, user, _) = seeded().await;
        let mutator = OptimisticMutator::new(storage.clone(), Duration::from_secs(5));

        let mut edited = user.clone();
        edited.is_activated = true;
        let saved = mutator.update(edited).await.unwrap();
        assert_eq!(saved.version, user.version + 1);

        let stored = storage.user_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_activated);
        assert_eq!(stored.version, saved.version);
    }

    #[tokio::test]
    async fn test_stale_version_is_an_edit_conflict() {
        let (storage, _, task) = seeded().await;
        let mutator = OptimisticMutator::new(storage.clone(), Duration::from_secs(5));

        let mut first = task.clone();
        first.is_completed = true;
        mutator.update(first).await.unwrap();

        let mut stale = task.clone();
        stale.content = "overwrite".into();
        let err = mutator.update(stale).await.unwrap_err();
        assert!(matches!(err, AppError::EditConflict { entity: "task", id } if id == task.id));

        let stored = storage.task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "write tests");
        assert!(stored.is_completed);
    }

    #[tokio::test]
    async fn test_deleted_row_is_an_edit_conflict() {
        let (storage, _, task) = seeded().await;
        let mutator = OptimisticMutator::new(storage.clone(), Duration::from_secs(5));
        storage.delete_task(task.id).await.unwrap();
        assert!(matches!(
            mutator.update(task).await,
            Err(AppError::EditConflict { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_have_one_winner() {
        let (storage, _, task) = seeded().await;
        let mutator = Arc::new(OptimisticMutator::new(storage.clone(), Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mutator = Arc::clone(&mutator);
                let mut copy = task.clone();
                copy.content = format!("writer {i}");
                tokio::spawn(async move { mutator.update(copy).await })
            })
            .collect();

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(saved) => {
                    winners += 1;
                    assert_eq!(saved.version, task.version + 1);
                },
                Err(AppError::EditConflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);

        let (tasks, _) = storage
            .tasks_for_user(task.user_id, &TaskFilter::default())
            .await
            .unwrap();
        assert_eq!(tasks[0].version, task.version + 1);
    }

    /// Storage whose task writes never complete.
    struct StalledStorage(MemoryStorage);

    #[async_trait]
    impl Storage for StalledStorage {
        async fn user_by_id(&self, id: i64) -> AppResult<Option<User>> {
            self.0.user_by_id(id).await
        }
        async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
            self.0.user_by_email(email).await
        }
        async fn insert_user(&self, user: NewUser) -> AppResult<User> {
            self.0.insert_user(user).await
        }
        async fn update_user(&self, user: &User) -> AppResult<Option<i32>> {
            self.0.update_user(user).await
        }
        async fn delete_user(&self, id: i64) -> AppResult<bool> {
            self.0.delete_user(id).await
        }
        async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>> {
            self.0.task_by_id(id).await
        }
        async fn tasks_for_user(&self, user_id: i64, filter: &TaskFilter) -> AppResult<(Vec<Task>, i64)> {
            self.0.tasks_for_user(user_id, filter).await
        }
        async fn insert_task(&self, task: NewTask) -> AppResult<Task> {
            self.0.insert_task(task).await
        }
        async fn update_task(&self, _task: &Task) -> AppResult<Option<i32>> {
            std::future::pending().await
        }
        async fn delete_task(&self, id: i64) -> AppResult<bool> {
            self.0.delete_task(id).await
        }
        async fn ping(&self) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_times_out() {
        let (_, _, task) = seeded().await;
        let storage: Arc<dyn Storage> = Arc::new(StalledStorage(MemoryStorage::new()));
        let mutator = OptimisticMutator::new(storage, Duration::from_secs(5));

        let err = mutator.update(task).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout("storage")));
    }
}
