//! One monitoring pass: read, notify, persist.
//!
//! A failed reading aborts the pass before anything is sent or stored.
//! Channel failures are already contained by the dispatcher. A missing
//! storage root aborts after notifications went out; any other storage
//! problem is logged and the pass still completes.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use dormwatt_core::config::DormwattConfig;
use dormwatt_core::error::{DormwattError, Result};
use dormwatt_core::retry::{Outcome, RetryPolicy};
use dormwatt_core::traits::{ReadingSource, SecretStore};
use dormwatt_core::types::Reading;
use dormwatt_scheduler::{DispatchReport, NotificationDispatcher};
use dormwatt_security::EncryptedFileStore;
use dormwatt_store::{PeriodLabel, TimeSeriesStore};

use crate::source::PortalSource;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Why a pass ended early.
#[derive(Debug, thiserror::Error)]
pub enum RunAborted {
    #[error("upstream account not configured")]
    AccountNotConfigured,

    #[error("could not obtain a reading: {0}")]
    Upstream(DormwattError),

    #[error("storage unavailable: {0}")]
    Storage(DormwattError),
}

/// What a completed pass did.
#[derive(Debug)]
pub struct RunSummary {
    pub reading: Reading,
    pub low: bool,
    pub dispatch: DispatchReport,
    /// Records in the reading's period after the append, if it was stored.
    pub period_len: Option<usize>,
    /// Size of the refreshed recent window, if it was refreshed.
    pub window_len: Option<usize>,
}

pub struct MonitorRun {
    source: Option<Arc<dyn ReadingSource>>,
    dispatcher: NotificationDispatcher,
    store: TimeSeriesStore,
    offset: FixedOffset,
    upstream_policy: RetryPolicy,
    clock: Clock,
}

impl MonitorRun {
    pub fn new(
        source: Option<Arc<dyn ReadingSource>>,
        dispatcher: NotificationDispatcher,
        store: TimeSeriesStore,
        offset: FixedOffset,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            offset,
            upstream_policy: RetryPolicy::upstream(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &DormwattConfig) -> Result<Self> {
        let offset = config.utc_offset()?;
        let tokens: Arc<dyn SecretStore> = Arc::new(EncryptedFileStore::new(
            &config.account.token_path(),
            Some(config.account.password.as_str()),
        ));
        let source = PortalSource::from_config(&config.account, Some(tokens))
            .map(|s| Arc::new(s) as Arc<dyn ReadingSource>);
        Ok(Self::new(
            source,
            NotificationDispatcher::from_config(&config.channel),
            TimeSeriesStore::from_config(&config.storage),
            offset,
        ))
    }

    pub fn with_upstream_policy(mut self, policy: RetryPolicy) -> Self {
        self.upstream_policy = policy;
        self
    }

    /// Replace the wall clock (tests pin the time).
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Run one pass.
    pub async fn execute(&self) -> std::result::Result<RunSummary, RunAborted> {
        tracing::info!("🚀 Starting dorm energy check...");

        let Some(source) = &self.source else {
            tracing::info!("ℹ️ Account not configured, nothing to monitor");
            return Err(RunAborted::AccountNotConfigured);
        };

        let label = format!("{} reading", source.name());
        let balances = self
            .upstream_policy
            .run(&label, |_| async move {
                Outcome::from_result(source.fetch_balances().await)
            })
            .await
            .map_err(|e| {
                tracing::error!("❌ Failed to obtain balances: {e}");
                RunAborted::Upstream(e)
            })?;

        let reading = Reading::new(balances, (self.clock)().with_timezone(&self.offset));
        let low = reading.is_low();
        if low {
            tracing::warn!(
                "🪫 Balance low: lighting {} kWh, air-conditioning {} kWh",
                balances.lt,
                balances.ac
            );
        }

        let dispatch = self.dispatcher.notify_admin(&reading).await;

        let records = match self.store.record(&reading) {
            Ok(records) => records,
            Err(e @ DormwattError::StorageRootMissing(_)) => {
                tracing::error!("❌ {e}");
                return Err(RunAborted::Storage(e));
            }
            Err(e) => {
                tracing::error!("❌ Failed to record reading: {e}");
                return Ok(RunSummary {
                    reading,
                    low,
                    dispatch,
                    period_len: None,
                    window_len: None,
                });
            }
        };

        let period = PeriodLabel::of(&reading.taken_at);
        let window_len = match self.store.refresh_recent_window(period, &records) {
            Ok(window) => Some(window.len()),
            Err(e) => {
                tracing::error!("❌ Failed to refresh recent records: {e}");
                None
            }
        };

        tracing::info!("🏁 Check finished");
        Ok(RunSummary {
            reading,
            low,
            dispatch,
            period_len: Some(records.len()),
            window_len,
        })
    }
}
