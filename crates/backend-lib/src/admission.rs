// ============================
// taskvault-backend/src/admission.rs
// ============================
//! Per-client admission control.
//!
//! Every client key (normally the remote IP) gets its own token bucket with
//! capacity `burst`, refilled at `requests_per_second`. Clients that stay idle
//! for the idle window are forgotten by a periodic reaper, so the next request
//! from them starts with a full bucket.
use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{ConfigError, RateLimitSettings};
use crate::metrics::{RATE_LIMIT_ADMITTED, RATE_LIMIT_CLIENTS, RATE_LIMIT_REJECTED};
use crate::periodic::PeriodicTask;

type Bucket<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct ClientState<C: Clock> {
    bucket: Bucket<C>,
    last_seen: C::Instant,
}

/// Token bucket per client key, with idle reaping.
pub struct AdmissionController<C: Clock = DefaultClock> {
    clients: DashMap<String, ClientState<C>>,
    quota: Quota,
    idle_window: Duration,
    reap_interval: Duration,
    clock: C,
    reaper: Mutex<Option<PeriodicTask>>,
}

impl AdmissionController<DefaultClock> {
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self, ConfigError> {
        Self::with_clock(
            settings.requests_per_second,
            settings.burst,
            Duration::from_secs(settings.idle_window_secs),
            Duration::from_secs(settings.reap_interval_secs),
            DefaultClock::default(),
        )
    }
}

impl<C: Clock> AdmissionController<C> {
    /// Build a controller on an explicit clock. `rate` is tokens per second.
    /// A rate whose refill period does not fit a `Duration` is rejected.
    pub fn with_clock(
        rate: f64,
        burst: u32,
        idle_window: Duration,
        reap_interval: Duration,
        clock: C,
    ) -> Result<Self, ConfigError> {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let period = Duration::try_from_secs_f64(1.0 / rate).map_err(|_| ConfigError::RateTooLow)?;
        // A rate so high that the period rounds to zero is effectively unlimited.
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst);

        Ok(Self {
            clients: DashMap::new(),
            quota,
            idle_window,
            reap_interval,
            clock,
            reaper: Mutex::new(None),
        })
    }

    /// Take one token for `client`, creating a full bucket on first sight.
    /// Returns `false` when the bucket is empty.
    pub fn allow(&self, client: &str) -> bool {
        let now = self.clock.now();
        let admitted = {
            let mut state = self
                .clients
                .entry(client.to_owned())
                .or_insert_with(|| ClientState {
                    bucket: RateLimiter::direct_with_clock(self.quota, &self.clock),
                    last_seen: now,
                });
            state.last_seen = now;
            state.bucket.check().is_ok()
        };

        if admitted {
            counter!(RATE_LIMIT_ADMITTED).increment(1);
        } else {
            counter!(RATE_LIMIT_REJECTED).increment(1);
            debug!(client, "rate limit exceeded");
        }
        admitted
    }

    /// Forget clients idle for at least the idle window.
    pub fn reap_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.clients.len();
        self.clients.retain(|_, state| {
            Duration::from(now.duration_since(state.last_seen)) < self.idle_window
        });
        let tracked = self.clients.len();
        gauge!(RATE_LIMIT_CLIENTS).set(tracked as f64);
        before.saturating_sub(tracked)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn is_tracked(&self, client: &str) -> bool {
        self.clients.contains_key(client)
    }

    /// Stop the reaper, if any, and wait for it to exit.
    pub async fn shutdown(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }
    }
}

impl<C> AdmissionController<C>
where
    C: Clock + Send + Sync + 'static,
    C::Instant: Send + Sync,
{
    /// Start the idle reaper. Calling it again while running is a no-op.
    pub fn start_reaper(self: &Arc<Self>) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return;
        }
        let controller: Weak<Self> = Arc::downgrade(self);
        *reaper = Some(PeriodicTask::spawn(
            "rate-limit-reaper",
            self.reap_interval,
            move || controller.upgrade().map_or(0, |c| c.reap_idle()),
        ));
    }
}

impl<C: Clock> fmt::Debug for AdmissionController<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionController")
            .field("quota", &self.quota)
            .field("idle_window", &self.idle_window)
            .field("tracked_clients", &self.clients.len())
            .finish()
    }
}
