// ============================
// taskvault-backend/src/periodic.rs
// ============================
//! Owned background loops.
//!
//! A [`PeriodicTask`] runs a synchronous pass on a fixed interval until it is
//! stopped. Dropping the handle aborts the loop, so a component that owns one
//! cannot leak it.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Handle to a running background loop.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `pass` every `period` on the current tokio runtime. The first run
    /// happens one full period after spawning.
    ///
    /// `pass` returns the number of items it processed, used for logging only.
    /// A panicking pass is logged and the loop keeps going.
    pub fn spawn<F>(name: &'static str, period: Duration, mut pass: F) -> Self
    where
        F: FnMut() -> usize + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(task = name, period_secs = period.as_secs_f64(), "background task started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        match catch_unwind(AssertUnwindSafe(&mut pass)) {
                            Ok(0) => {},
                            Ok(processed) => debug!(task = name, processed, "background pass finished"),
                            Err(_) => error!(task = name, "background pass panicked"),
                        }
                    }
                }
            }

            info!(task = name, "background task stopped");
        });

        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the loop to exit and wait for it.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(task = self.name, error = %e, "background task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::spawn("test", Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        assert!(task.is_running());
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_pass_does_not_end_loop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::spawn("flaky", Duration::from_secs(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                panic!("first pass fails");
            }
            n
        });

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(task.is_running());
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_the_loop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::spawn("stopped", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });
        assert_eq!(task.name(), "stopped");

        task.stop().await;
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
