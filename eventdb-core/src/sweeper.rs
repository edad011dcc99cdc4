//! Periodic deletion of store rows older than the retention window.

use crate::error::StoreError;
use crate::store::EventStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deletes obsolete rows on a fixed period. Store errors are logged and the
/// next tick retries.
pub struct ExpirySweeper {
    store: Arc<dyn EventStore>,
    period: Duration,
    row_age: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn EventStore>, period: Duration, row_age: Duration) -> Self {
        Self {
            store,
            period,
            row_age,
        }
    }

    /// Sweep loop. Exits when `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.period) => {
                    match self.remove_rows(&cancel).await {
                        Ok(removed) => {
                            tracing::info!(removed, "database cleanup performed");
                        }
                        Err(StoreError::Cancelled) => return,
                        Err(err) => {
                            tracing::error!(error = %err, "error while removing database entries");
                        }
                    }
                }
            }
        }
    }

    async fn remove_rows(&self, cancel: &CancellationToken) -> Result<u64, StoreError> {
        let cutoff = self.cutoff(Utc::now());
        tracing::info!(%cutoff, "removing database entries older than the retention window");
        self.store.remove_older_than(cutoff, cancel).await
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::seconds(self.row_age.as_secs() as i64)
    }
}
