//! The ingest writer: periodically pulls event batches from the scheduler and
//! persists them, keeping its requested identifier synchronized with the
//! upstream ring buffer and detecting scheduler restarts.

use crate::cache::EventCache;
use crate::error::{ClientError, StoreError, WriterError};
use crate::retry::RetryPolicy;
use crate::store::EventStore;
use crate::types::{BOUNDS_SENTINEL, ChangeDetail, ChangeType, EventBatch, EventType};
use crate::upstream::SchedulerClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound on identifier-resolution attempts within one cycle. The loop
/// converges in one step per ring-buffer rotation that happens while we poll,
/// so hitting this bound means the upstream rotates faster than we can follow.
const MAX_SYNC_ATTEMPTS: u32 = 16;

/// Error message the scheduler returns when its event system is off.
const TRACKING_DISABLED_MESSAGE: &str = "Event tracking is disabled";

const DEFAULT_FETCH_PERIOD: Duration = Duration::from_secs(1);

/// Pulls batches from the scheduler and persists them exactly once.
///
/// Single-threaded: owns its identifier state; nothing mutates it from
/// outside after construction.
pub struct EventWriter {
    store: Arc<dyn EventStore>,
    client: Arc<dyn SchedulerClient>,
    cache: Arc<EventCache>,
    /// Last observed scheduler incarnation.
    instance_id: Option<String>,
    /// Next event id to request from the scheduler.
    next_id: u64,
    /// Whether `next_id` is trusted.
    have_id: bool,
    /// Whether store reconciliation has not run yet.
    first_cycle: bool,
    fetch_period: Duration,
    reconcile_retry: RetryPolicy,
}

impl EventWriter {
    pub fn new(
        store: Arc<dyn EventStore>,
        client: Arc<dyn SchedulerClient>,
        cache: Arc<EventCache>,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            instance_id: None,
            next_id: 0,
            have_id: false,
            first_cycle: true,
            fetch_period: DEFAULT_FETCH_PERIOD,
            reconcile_retry: RetryPolicy::default(),
        }
    }

    pub fn with_fetch_period(mut self, period: Duration) -> Self {
        self.fetch_period = period;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.reconcile_retry = policy;
        self
    }

    /// Fetch/persist loop. Returns `Ok(())` on cancellation and an error only
    /// when the store turns out to be ahead of the scheduler, which requires
    /// operator action.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WriterError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.fetch_period) => {
                    match self.fetch_and_persist(&cancel).await {
                        Ok(()) => {}
                        Err(err) if err.is_cancelled() => return Ok(()),
                        Err(err) if err.is_fatal() => {
                            tracing::error!(error = %err, "event writer stopped; manual intervention required");
                            return Err(err);
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "unable to read or persist scheduler events");
                        }
                    }
                }
            }
        }
    }

    /// One fetch/persist cycle. Transport and store errors abort the cycle;
    /// the caller retries on the next tick.
    pub async fn fetch_and_persist(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), WriterError> {
        let (batch, start_id) = match self.resolve_batch(cancel).await {
            Ok(resolved) => resolved,
            Err(err) => {
                if let WriterError::Client(ClientError::Upstream(upstream)) = &err {
                    tracing::error!(
                        message = %upstream.message,
                        description = %upstream.description,
                        status_code = upstream.status_code,
                        "received error message from the scheduler"
                    );
                    if upstream.message == TRACKING_DISABLED_MESSAGE {
                        tracing::error!(
                            "event tracking is DISABLED in the scheduler; \
                             no events are persisted until this is changed"
                        );
                    }
                }
                return Err(err);
            }
        };

        if self.check_restart(&batch.instance_uuid) {
            return Ok(());
        }

        self.store.set_instance_id(&batch.instance_uuid);
        self.instance_id = Some(batch.instance_uuid.clone());

        if batch.event_records.is_empty() {
            return Ok(());
        }
        self.persist(start_id, &batch, cancel).await?;

        // next batch starts right after the one we just persisted
        self.next_id = batch.highest_id + 1;
        Ok(())
    }

    /// Identifier resolution: tight loop without inter-attempt delay, since a
    /// quickly written ring buffer moves its lowest valid id while we poll.
    /// Returns the first batch obtained on a trusted identifier.
    async fn resolve_batch(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(EventBatch, u64), WriterError> {
        let mut start_id = self.next_id;
        for _ in 0..MAX_SYNC_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(WriterError::Cancelled);
            }
            if !self.have_id {
                // make sure we don't retrieve any valid record by accident
                start_id = BOUNDS_SENTINEL;
            }
            let batch = self.client.recent_events(start_id, cancel).await?;

            let invalidated =
                self.have_id && batch.event_records.is_empty() && batch.lowest_id > start_id;
            if !self.have_id || invalidated {
                if self.have_id {
                    tracing::info!(
                        current = start_id,
                        new = batch.lowest_id,
                        "adjusting the event id, the current one became invalid"
                    );
                } else {
                    tracing::info!(new = batch.lowest_id, "setting valid event id");
                    tracing::info!(value = %batch.instance_uuid, "scheduler instance uuid");
                }
                self.next_id = batch.lowest_id;
                self.have_id = true;
                start_id = batch.lowest_id;

                if self.first_cycle {
                    let last = self
                        .last_event_with_retry(&batch.instance_uuid, cancel)
                        .await?;
                    self.first_cycle = false;
                    match last {
                        None => tracing::info!("no rows in the database"),
                        Some((last_id, last_event)) => {
                            tracing::info!(
                                id = last_id,
                                event = ?last_event,
                                "last event in the backend storage"
                            );
                            // should not happen: more events in the store
                            // than the scheduler reports
                            if last_id > batch.highest_id {
                                return Err(WriterError::StoreAhead {
                                    stored: last_id,
                                    upstream: batch.highest_id,
                                });
                            }
                            if last_id + 1 > start_id {
                                tracing::info!(
                                    previous = start_id,
                                    new = last_id + 1,
                                    "adjusting the event id based on the id found in the database"
                                );
                                self.next_id = last_id + 1;
                                start_id = self.next_id;
                            }
                        }
                    }
                }
                continue;
            }

            return Ok((batch, start_id));
        }
        Err(WriterError::IdSyncExhausted {
            attempts: MAX_SYNC_ATTEMPTS,
        })
    }

    /// First-cycle store reconciliation with bounded backoff.
    async fn last_event_with_retry(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<(u64, crate::types::EventRecord)>, WriterError> {
        tracing::info!("retrieving the last event from the store");
        let mut attempt = 0;
        loop {
            match self.store.last_event_for_instance(instance_id, cancel).await {
                Ok(last) => return Ok(last),
                Err(StoreError::Cancelled) => return Err(WriterError::Cancelled),
                Err(err) => {
                    if !self.reconcile_retry.should_retry(attempt) {
                        return Err(err.into());
                    }
                    attempt += 1;
                    let delay = self.reconcile_retry.delay_for_attempt(attempt);
                    tracing::error!(error = %err, attempt, "database error during reconciliation, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(WriterError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// A changed instance uuid means the scheduler restarted: the identifier
    /// space reset, so drop the cache and re-detect the lowest id before
    /// persisting anything else.
    fn check_restart(&mut self, instance_uuid: &str) -> bool {
        let restarted = self
            .instance_id
            .as_deref()
            .is_some_and(|known| known != instance_uuid);
        if restarted {
            tracing::info!(
                last_uuid = self.instance_id.as_deref().unwrap_or_default(),
                new_uuid = instance_uuid,
                "scheduler restart detected"
            );
            self.cache.clear();
            self.instance_id = Some(instance_uuid.to_owned());
            self.have_id = false;
        }
        restarted
    }

    async fn persist(
        &self,
        start_id: u64,
        batch: &EventBatch,
        cancel: &CancellationToken,
    ) -> Result<(), WriterError> {
        if let Err(err) = self
            .store
            .persist_events(start_id, &batch.event_records, cancel)
            .await
        {
            tracing::error!(error = %err, "failed to persist events");
            return Err(err.into());
        }

        for event in &batch.event_records {
            if event.event_type == EventType::App {
                self.cache.add_event(&event.object_id, event.clone());
                // the first-ever event of an application: from here on the
                // cache holds its complete history
                if event.change_type == ChangeType::Add
                    && event.change_detail == ChangeDetail::DetailsNone
                {
                    self.cache.set_full_history(&event.object_id);
                    tracing::info!(app_id = %event.object_id, "new application");
                }
            }
        }
        tracing::info!(
            count = batch.event_records.len(),
            lowest_id = batch.lowest_id,
            highest_id = batch.highest_id,
            "persisted new events"
        );
        Ok(())
    }
}
