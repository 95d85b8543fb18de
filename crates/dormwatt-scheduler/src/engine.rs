//! Periodic run loop for daemon mode.
//! Uses tokio::interval, so the process sleeps between runs.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// Runs a job on a fixed interval until Ctrl-C or `max_runs` is reached.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicRunner {
    interval: Duration,
    max_runs: Option<u64>,
}

impl PeriodicRunner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            max_runs: None,
        }
    }

    /// Create from `[monitor] interval_secs`.
    pub fn every_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Stop after `n` runs.
    pub fn with_max_runs(mut self, n: u64) -> Self {
        self.max_runs = Some(n);
        self
    }

    /// Run `job` immediately, then once per interval. A run that overruns
    /// the interval delays the next one instead of bunching up.
    ///
    /// Returns the number of completed runs.
    pub async fn run<F, Fut>(&self, mut job: F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!("⏰ Scheduler started (every {}s)", self.interval.as_secs_f32());

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = 0u64;

        loop {
            if self.max_runs.is_some_and(|max| runs >= max) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("🛑 Shutdown requested");
                    break;
                }
            }
            runs += 1;
            tracing::debug!("🔔 Run #{runs} triggered");
            job(runs).await;
        }

        tracing::info!("⏹️ Scheduler stopped after {runs} run(s)");
        runs
    }
}
