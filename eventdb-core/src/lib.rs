//! eventdb-core - Domain model and ingest pipeline for the YuniKorn event
//! history service.
//!
//! The scheduler exposes its events through a finite ring buffer; this crate
//! owns the protocol that follows it correctly: identifier synchronization,
//! restart detection, first-cycle store reconciliation, and the
//! per-application cache that short-circuits read queries.
//!
//! Backends are capability traits ([`EventStore`], [`SchedulerClient`]) so
//! test doubles substitute them directly; the real implementations live in
//! `eventdb-store` and `eventdb-client`.

pub mod cache;
pub mod config;
pub mod error;
pub mod retry;
pub mod store;
pub mod sweeper;
pub mod types;
pub mod upstream;
pub mod writer;

pub use cache::EventCache;
pub use config::{Config, ConfigError, Driver, PeriodConfig, RestConfig, RetentionConfig,
    StorageConfig, UpstreamConfig};
pub use error::{ClientError, StoreError, WriterError};
pub use retry::RetryPolicy;
pub use store::EventStore;
pub use sweeper::ExpirySweeper;
pub use types::{
    BOUNDS_SENTINEL, ChangeDetail, ChangeType, EventBatch, EventRecord, EventType, Quantity,
    Resource, UpstreamError,
};
pub use upstream::SchedulerClient;
pub use writer::EventWriter;
