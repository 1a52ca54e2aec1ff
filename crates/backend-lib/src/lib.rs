// ============================
// taskvault-backend/src/lib.rs
// ============================
//! Core backend-lib functionality for the `taskvault` REST server.

pub mod admission;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod mutator;
pub mod notify;
pub mod periodic;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::admission::AdmissionController;
use crate::auth::{AuthVerifier, TokenCodec};
use crate::cache::ActivationCache;
use crate::config::{ConfigError, Settings};
use crate::mutator::OptimisticMutator;
use crate::notify::Notifier;
use crate::storage::Storage;

pub use crate::router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub storage: Arc<dyn Storage>,
    pub activation: Arc<ActivationCache>,
    pub admission: Arc<AdmissionController>,
    pub tokens: Arc<TokenCodec>,
    pub verifier: Arc<AuthVerifier>,
    pub mutator: Arc<OptimisticMutator>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Build every component from `settings`. Background tasks are not
    /// started here; see [`AppState::start_background_tasks`].
    pub fn new(
        settings: Settings,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        let tokens = Arc::new(TokenCodec::new(
            &settings.jwt.secret,
            Duration::from_secs(settings.jwt.token_ttl_secs),
        ));
        let verifier = Arc::new(AuthVerifier::new(Arc::clone(&tokens), Arc::clone(&storage)));
        let mutator = Arc::new(OptimisticMutator::new(
            Arc::clone(&storage),
            settings.query_timeout(),
        ));

        let admission = Arc::new(AdmissionController::from_settings(&settings.rate_limit)?);
        crate::error::set_detailed_messages(!settings.is_production());

        Ok(Self {
            activation: Arc::new(ActivationCache::from_settings(&settings.activation)),
            admission,
            settings: Arc::new(settings),
            storage,
            tokens,
            verifier,
            mutator,
            notifier,
        })
    }

    /// Start the activation sweeper and the idle-client reaper.
    pub fn start_background_tasks(&self) {
        self.activation.start_sweeper();
        if self.settings.rate_limit.enabled {
            self.admission.start_reaper();
        }
        info!("background tasks started");
    }

    /// Stop background tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        self.activation.shutdown().await;
        self.admission.shutdown().await;
        info!("background tasks stopped");
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.settings.environment)
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}
