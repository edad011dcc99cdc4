//! Capability surface of the backing relational store.

use crate::error::StoreError;
use crate::types::EventRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Transactional persistence for scheduler events.
///
/// Rows are keyed by `(instance id, event id)`; the instance id published via
/// [`EventStore::set_instance_id`] scopes every insert and query. Every async
/// operation inherits the shared cancellation signal so an in-flight
/// transaction or query can abort mid-request with [`StoreError::Cancelled`].
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Publish the scheduler incarnation that subsequent operations run under.
    fn set_instance_id(&self, instance_id: &str);

    /// Insert `events` as rows `(instance, start_event_id + i)` inside one
    /// transaction. All-or-nothing.
    async fn persist_events(
        &self,
        start_event_id: u64,
        events: &[EventRecord],
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// All rows for `app_id` under the current instance, ordered by event id.
    async fn events_for_app(
        &self,
        app_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Highest persisted event id and its event for `instance_id`, or `None`
    /// when the store holds no row for that incarnation.
    async fn last_event_for_instance(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<(u64, EventRecord)>, StoreError>;

    /// Delete rows whose timestamp is at or before `cutoff`; returns the
    /// number of rows removed.
    async fn remove_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError>;
}
