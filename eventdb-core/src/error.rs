//! Error taxonomy for the ingest pipeline.
//!
//! Transport and store failures abort the current writer cycle and are
//! retried on the next tick; only [`WriterError::StoreAhead`] is fatal.

use crate::types::UpstreamError;

/// Failures of the upstream batch endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The scheduler answered non-200 with a decodable error body.
    #[error("error received from the scheduler: {}", .0.message)]
    Upstream(UpstreamError),

    /// Network-level failure before a response was obtained.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-200 response whose body was not a scheduler error object.
    #[error("unexpected HTTP status code {0}")]
    UnexpectedStatus(u16),

    /// 200 response whose body did not decode as a batch.
    #[error("malformed batch response: {0}")]
    Decode(String),

    /// The in-flight call was abandoned because cancellation fired.
    #[error("cancelled")]
    Cancelled,
}

/// Failures of the backing store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Insert and query operations require the scheduler instance id first.
    #[error("scheduler instance id is not set")]
    InstanceIdUnset,

    #[error("database error: {0}")]
    Database(String),

    /// The in-flight operation was abandoned because cancellation fired.
    #[error("cancelled")]
    Cancelled,
}

/// Failures of one fetch/persist cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The ring buffer rotated faster than we could follow for a whole cycle.
    #[error("could not synchronize the event id after {attempts} attempts")]
    IdSyncExhausted { attempts: u32 },

    /// The store holds more events than the scheduler reports for the same
    /// incarnation. Requires operator action; the writer stops.
    #[error(
        "the largest event id in the database ({stored}) is greater than the one returned \
         by the scheduler ({upstream}); cannot persist more events until this is resolved"
    )]
    StoreAhead { stored: u64, upstream: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl WriterError {
    /// Whether the writer must stop instead of retrying on the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WriterError::StoreAhead { .. })
    }

    /// Whether the cycle was cut short by the shared cancellation signal,
    /// at a loop boundary or inside an in-flight client or store call.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WriterError::Cancelled
                | WriterError::Client(ClientError::Cancelled)
                | WriterError::Store(StoreError::Cancelled)
        )
    }
}
