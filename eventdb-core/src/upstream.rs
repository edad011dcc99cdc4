//! Capability surface of the scheduler's event endpoint.

use crate::error::ClientError;
use crate::types::EventBatch;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Read access to the scheduler's event ring buffer.
///
/// Implementations hold no protocol state; identifier bookkeeping belongs to
/// the writer. Every call inherits the shared cancellation signal so an
/// in-flight request can abort mid-transfer with [`ClientError::Cancelled`].
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Fetch the contiguous run of events starting at `start_id`.
    ///
    /// Passing [`crate::types::BOUNDS_SENTINEL`] returns an empty batch that
    /// only describes the current ring-buffer bounds.
    async fn recent_events(
        &self,
        start_id: u64,
        cancel: &CancellationToken,
    ) -> Result<EventBatch, ClientError>;
}
