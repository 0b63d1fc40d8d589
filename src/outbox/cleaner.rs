use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::record::OutboxRecord;
use crate::config::PersistenceConfig;
use crate::error::PersistenceError;
use crate::keys;
use crate::store::CasStore;

/// Default number of records requested per scan page.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub pages: usize,
    pub scanned: usize,
    pub removed: usize,
    /// Deletes that found the record already gone (e.g. a concurrent sweep).
    pub already_removed: usize,
    /// Deletes that failed for any other reason; retried on the next sweep.
    pub failed: usize,
}

/// Deletes dispatched outbox records once they have aged out.
///
/// Cleanup is advisory: a record that fails to delete is left for the next
/// sweep and never fails the sweep itself. Only terminal (dispatched) records
/// are touched, so it is safe to run alongside live message processing.
pub struct OutboxCleaner {
    store: Arc<dyn CasStore>,
    endpoint_name: String,
    page_size: usize,
}

impl OutboxCleaner {
    pub fn new(store: Arc<dyn CasStore>, endpoint_name: impl Into<String>) -> Self {
        Self {
            store,
            endpoint_name: endpoint_name.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Build for the endpoint and page size in `config`.
    pub fn from_config(store: Arc<dyn CasStore>, config: &PersistenceConfig) -> Self {
        Self::new(store, config.endpoint_name.clone()).with_page_size(config.outbox.page_size)
    }

    /// Set the number of records requested per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Remove every record dispatched at or before `cutoff`.
    ///
    /// Checks `cancellation` before each page and before each delete and
    /// returns [`PersistenceError::Cancelled`] once it is triggered.
    pub async fn remove_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cancellation: &CancellationToken,
    ) -> Result<CleanupReport, PersistenceError> {
        let prefix = keys::outbox_prefix(&self.endpoint_name);
        let mut report = CleanupReport::default();
        let mut offset = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(PersistenceError::Cancelled);
            }

            let page = self.store.scan_prefix(&prefix, offset, self.page_size).await?;
            report.pages += 1;
            report.scanned += page.count();

            let mut gone = 0;
            for stored in &page.values {
                if cancellation.is_cancelled() {
                    return Err(PersistenceError::Cancelled);
                }

                let record: OutboxRecord = match serde_json::from_slice(&stored.value) {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(key = %stored.key, error = %err, "skipping unreadable outbox record");
                        continue;
                    }
                };

                if !record.is_dispatched_before(cutoff) {
                    continue;
                }

                match self.store.delete(&stored.key, stored.version).await {
                    Ok(()) => {
                        report.removed += 1;
                        gone += 1;
                    }
                    Err(err) if err.is_already_deleted() => {
                        debug!(key = %stored.key, "outbox record already removed");
                        report.already_removed += 1;
                        gone += 1;
                    }
                    Err(err) => {
                        warn!(key = %stored.key, error = %err, "failed to remove outbox record");
                        report.failed += 1;
                    }
                }
            }

            if page.count() < self.page_size {
                break;
            }

            // Removed records no longer occupy a position in the scan.
            offset += page.count() - gone;
        }

        info!(
            endpoint = %self.endpoint_name,
            pages = report.pages,
            removed = report.removed,
            failed = report.failed,
            "outbox cleanup finished"
        );
        Ok(report)
    }
}
