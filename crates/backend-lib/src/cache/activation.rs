// ============================
// taskvault-backend/src/cache/activation.rs
// ============================
//! One-time activation codes keyed by user id.
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

use super::expiring::ExpiringStore;
use crate::config::ActivationSettings;
use crate::metrics::{ACTIVATION_ISSUED, ACTIVATION_VERIFIED};
use crate::periodic::PeriodicTask;

/// Outcome of checking a guessed code. Expected, frequent results rather than
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Expired,
    Mismatch,
}

impl CodeCheck {
    fn label(self) -> &'static str {
        match self {
            CodeCheck::Valid => "valid",
            CodeCheck::Expired => "expired",
            CodeCheck::Mismatch => "mismatch",
        }
    }
}

/// Activation code cache with an optional background sweeper.
#[derive(Debug)]
pub struct ActivationCache {
    codes: Arc<ExpiringStore<i64, u16>>,
    ttl: Duration,
    sweep_interval: Duration,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl ActivationCache {
    /// Cache without a sweeper; callers (tests) run [`ActivationCache::sweep`]
    /// themselves.
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Arc::new(ExpiringStore::new()),
            ttl,
            sweep_interval: Duration::from_secs(60),
            sweeper: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &ActivationSettings) -> Self {
        let mut cache = Self::new(Duration::from_secs(settings.code_ttl_secs));
        cache.sweep_interval = Duration::from_secs(settings.sweep_interval_secs);
        cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start the periodic sweep. Calling it again while running is a no-op.
    pub fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            *sweeper = Some(
                self.codes
                    .spawn_sweeper("activation-sweep", self.sweep_interval),
            );
        }
    }

    /// Stop the sweeper, if any, and wait for it to exit.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }
    }

    /// Generate and store a fresh code, replacing any previous one.
    pub fn issue(&self, user_id: i64) -> u16 {
        let code = rand::random::<u16>();
        self.issue_code(user_id, code);
        code
    }

    /// Store a caller-chosen code, replacing any previous one.
    pub fn issue_code(&self, user_id: i64, code: u16) {
        self.codes.set(user_id, code, self.ttl);
        counter!(ACTIVATION_ISSUED).increment(1);
        debug!(user_id, ttl_secs = self.ttl.as_secs(), "activation code issued");
    }

    /// Check a guess without consuming the code.
    pub fn verify(&self, user_id: i64, guess: i64) -> CodeCheck {
        let outcome = match self.codes.get(&user_id) {
            (_, true) | (None, _) => CodeCheck::Expired,
            (Some(code), false) if i64::from(code) != guess => CodeCheck::Mismatch,
            (Some(_), false) => CodeCheck::Valid,
        };
        counter!(ACTIVATION_VERIFIED, "outcome" => outcome.label()).increment(1);
        debug!(user_id, outcome = outcome.label(), "activation code checked");
        outcome
    }

    pub fn has_expired(&self, user_id: i64) -> bool {
        self.codes.has_expired(&user_id)
    }

    /// Current code (possibly stale) and whether it is expired or absent.
    pub fn lookup(&self, user_id: i64) -> (Option<u16>, bool) {
        self.codes.get(&user_id)
    }

    pub fn clear(&self, user_id: i64) {
        self.codes.clear(&user_id);
    }

    /// One synchronous sweep pass.
    pub fn sweep(&self) -> usize {
        self.codes.sweep()
    }

    /// Number of stored entries, expired ones included.
    pub fn stored(&self) -> usize {
        self.codes.len()
    }
}
