//! Background task that runs the outbox cleaner on a fixed schedule.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cleaner::OutboxCleaner;
use crate::config::{ConfigError, OutboxSettings};
use crate::error::PersistenceError;

/// Statistics from the cleanup task.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub sweeps: usize,
    pub removed: usize,
    pub failed_sweeps: usize,
}

/// A tokio task that periodically removes aged-out outbox records.
///
/// ## Example
///
/// ```ignore
/// let cleaner = OutboxCleaner::new(store.clone(), "Sales");
/// let task = OutboxCleanupTask::spawn(cleaner, &config.outbox)?;
///
/// // ... on shutdown ...
/// let stats = task.stop().await?;
/// ```
pub struct OutboxCleanupTask {
    cancellation: CancellationToken,
    handle: Option<JoinHandle<CleanupStats>>,
}

impl OutboxCleanupTask {
    /// Spawn using the schedule and retention from `settings`.
    pub fn spawn(cleaner: OutboxCleaner, settings: &OutboxSettings) -> Result<Self, PersistenceError> {
        settings.validate()?;
        Self::spawn_with(
            cleaner,
            settings.frequency_to_run_cleanup,
            settings.time_to_keep_deduplication_data,
        )
    }

    /// Like [`OutboxCleanupTask::spawn`], but `None` when cleanup is disabled.
    pub fn spawn_if_enabled(
        cleaner: OutboxCleaner,
        settings: &OutboxSettings,
    ) -> Result<Option<Self>, PersistenceError> {
        if !settings.cleanup_enabled {
            info!(endpoint = cleaner.endpoint_name(), "outbox cleanup disabled");
            return Ok(None);
        }
        Self::spawn(cleaner, settings).map(Some)
    }

    /// Spawn a task that sweeps every `frequency`, removing records
    /// dispatched more than `time_to_keep` ago. `frequency` must be non-zero.
    pub fn spawn_with(
        cleaner: OutboxCleaner,
        frequency: Duration,
        time_to_keep: Duration,
    ) -> Result<Self, PersistenceError> {
        if frequency.is_zero() {
            return Err(ConfigError::Invalid("cleanup frequency must be positive".into()).into());
        }

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();

        let handle = tokio::spawn(async move {
            let mut stats = CleanupStats::default();
            let mut ticker = tokio::time::interval(frequency);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                endpoint = cleaner.endpoint_name(),
                frequency_ms = frequency.as_millis() as u64,
                "outbox cleanup started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let cutoff = cutoff_for(time_to_keep);
                match cleaner.remove_entries_older_than(cutoff, &token).await {
                    Ok(report) => {
                        stats.sweeps += 1;
                        stats.removed += report.removed;
                    }
                    Err(PersistenceError::Cancelled) => break,
                    Err(err) => {
                        // Store unavailable; try again on the next tick.
                        stats.failed_sweeps += 1;
                        warn!(endpoint = cleaner.endpoint_name(), error = %err, "outbox cleanup failed");
                    }
                }
            }

            stats
        });

        Ok(Self {
            cancellation,
            handle: Some(handle),
        })
    }

    /// Signal the task to stop and wait for it to finish.
    ///
    /// Returns the task statistics, or [`PersistenceError::CleanupTaskFailed`]
    /// if the task panicked.
    pub async fn stop(mut self) -> Result<CleanupStats, PersistenceError> {
        self.cancellation.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(CleanupStats::default());
        };

        handle.await.map_err(|err| {
            error!(error = %err, "outbox cleanup task failed");
            PersistenceError::CleanupTaskFailed(err.to_string())
        })
    }

    /// Signal the task to stop without waiting.
    pub fn signal_stop(&self) {
        self.cancellation.cancel();
    }
}

impl Drop for OutboxCleanupTask {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

fn cutoff_for(time_to_keep: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(time_to_keep)
        .ok()
        .and_then(|keep| now.checked_sub_signed(keep))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::keys;
    use crate::outbox::OutboxRecord;
    use crate::store::{CasStore, InMemoryCasStore, ScanPage, StoreError, StoreOp, StoredValue};

    async fn seed_dispatched(store: &InMemoryCasStore, id: &str) {
        let mut record = OutboxRecord {
            message_id: id.into(),
            dispatched: false,
            dispatched_at: None,
            transport_operations: vec![],
        };
        record.mark_dispatched(Utc::now() - chrono::Duration::hours(1));
        store
            .create(
                &keys::outbox_record_key("Sales", id),
                serde_json::to_vec(&record).unwrap(),
            )
            .await
            .unwrap();
    }

    /// Store whose scans blow up, taking the cleanup task down with them.
    struct BrokenStore;

    #[async_trait]
    impl CasStore for BrokenStore {
        async fn read(&self, _key: &str) -> Result<Option<StoredValue>, StoreError> {
            Ok(None)
        }

        async fn scan_prefix(
            &self,
            _prefix: &str,
            _offset: usize,
            _limit: usize,
        ) -> Result<ScanPage, StoreError> {
            panic!("scan exploded");
        }

        async fn commit(&self, _ops: Vec<StoreOp>) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn sweeps_until_stopped() {
        let store = Arc::new(InMemoryCasStore::new());
        seed_dispatched(&store, "m-1").await;

        let cleaner = OutboxCleaner::new(store.clone(), "Sales");
        let task = OutboxCleanupTask::spawn_with(
            cleaner,
            Duration::from_millis(10),
            Duration::from_secs(60),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = task.stop().await.unwrap();

        assert!(stats.sweeps >= 1);
        assert_eq!(stats.removed, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sub_second_schedule_from_settings_runs() {
        let store = Arc::new(InMemoryCasStore::new());
        seed_dispatched(&store, "m-1").await;

        let settings = OutboxSettings {
            frequency_to_run_cleanup: Duration::from_millis(20),
            time_to_keep_deduplication_data: Duration::ZERO,
            ..OutboxSettings::default()
        };
        let task = OutboxCleanupTask::spawn(OutboxCleaner::new(store.clone(), "Sales"), &settings)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = task.stop().await.unwrap();

        assert_eq!(stats.removed, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_frequency_is_rejected() {
        let store = Arc::new(InMemoryCasStore::new());

        let err = OutboxCleanupTask::spawn_with(
            OutboxCleaner::new(store.clone(), "Sales"),
            Duration::ZERO,
            Duration::from_secs(60),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PersistenceError::Config(ConfigError::Invalid(_))));

        let settings = OutboxSettings {
            frequency_to_run_cleanup: Duration::ZERO,
            ..OutboxSettings::default()
        };
        let err = OutboxCleanupTask::spawn(OutboxCleaner::new(store, "Sales"), &settings)
            .err()
            .unwrap();
        assert!(matches!(err, PersistenceError::Config(_)));
    }

    #[tokio::test]
    async fn panicked_task_is_reported_on_stop() {
        let task = OutboxCleanupTask::spawn_with(
            OutboxCleaner::new(Arc::new(BrokenStore), "Sales"),
            Duration::from_millis(10),
            Duration::from_secs(60),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = task.stop().await.unwrap_err();
        assert!(matches!(err, PersistenceError::CleanupTaskFailed(_)));
    }

    #[tokio::test]
    async fn disabled_cleanup_spawns_nothing() {
        let store = Arc::new(InMemoryCasStore::new());
        let settings = OutboxSettings {
            cleanup_enabled: false,
            ..OutboxSettings::default()
        };

        let task =
            OutboxCleanupTask::spawn_if_enabled(OutboxCleaner::new(store, "Sales"), &settings)
                .unwrap();
        assert!(task.is_none());
    }

    #[test]
    fn huge_retention_saturates() {
        assert_eq!(cutoff_for(Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
