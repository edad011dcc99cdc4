//! Wire and domain types shared by the ingest pipeline and the query surface.
//!
//! The scheduler serializes enum fields as their numeric protobuf codes, so the
//! enums here convert through `i32` on the wire and in the database. Codes we
//! do not recognize survive as [`EventType::Unrecognized`] (and friends) rather
//! than silently aliasing a meaningful value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `start` value that asks the scheduler for the current ring-buffer bounds
/// without returning any event. Never a valid event identifier.
pub const BOUNDS_SENTINEL: u64 = u64::MAX;

/// Category of the object an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum EventType {
    Unknown,
    Request,
    App,
    Node,
    Queue,
    UserGroup,
    /// A numeric code outside the known set.
    Unrecognized,
}

impl From<EventType> for i32 {
    fn from(value: EventType) -> i32 {
        match value {
            EventType::Unknown => 0,
            EventType::Request => 1,
            EventType::App => 2,
            EventType::Node => 3,
            EventType::Queue => 4,
            EventType::UserGroup => 5,
            EventType::Unrecognized => -1,
        }
    }
}

impl From<i32> for EventType {
    fn from(code: i32) -> EventType {
        match code {
            0 => EventType::Unknown,
            1 => EventType::Request,
            2 => EventType::App,
            3 => EventType::Node,
            4 => EventType::Queue,
            5 => EventType::UserGroup,
            _ => EventType::Unrecognized,
        }
    }
}

/// What kind of state change the event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ChangeType {
    None,
    Set,
    Add,
    Remove,
    Unrecognized,
}

impl From<ChangeType> for i32 {
    fn from(value: ChangeType) -> i32 {
        match value {
            ChangeType::None => 0,
            ChangeType::Set => 1,
            ChangeType::Add => 2,
            ChangeType::Remove => 3,
            ChangeType::Unrecognized => -1,
        }
    }
}

impl From<i32> for ChangeType {
    fn from(code: i32) -> ChangeType {
        match code {
            0 => ChangeType::None,
            1 => ChangeType::Set,
            2 => ChangeType::Add,
            3 => ChangeType::Remove,
            _ => ChangeType::Unrecognized,
        }
    }
}

/// Fine-grained detail of a state change. Codes are banded by object category
/// (100s requests, 200s applications, 300s nodes, 400s queues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ChangeDetail {
    DetailsNone,
    RequestCancel,
    RequestAlloc,
    RequestTimeout,
    AppNew,
    AppAccepted,
    AppStarting,
    AppRunning,
    AppCompleting,
    AppCompleted,
    AppFailing,
    AppFailed,
    AppResuming,
    AppExpired,
    AppReject,
    AppNewAlloc,
    AppAllocTimeout,
    AppCancel,
    AppAllocKill,
    NodeDecommission,
    NodeReady,
    NodeSchedulable,
    NodeAlloc,
    NodeCapacity,
    NodeOccupied,
    NodeReservation,
    QueueConfig,
    QueueDynamic,
    QueueType,
    QueueMax,
    QueueGuaranteed,
    QueueApp,
    QueueAlloc,
    Unrecognized,
}

impl From<ChangeDetail> for i32 {
    fn from(value: ChangeDetail) -> i32 {
        match value {
            ChangeDetail::DetailsNone => 0,
            ChangeDetail::RequestCancel => 100,
            ChangeDetail::RequestAlloc => 101,
            ChangeDetail::RequestTimeout => 102,
            ChangeDetail::AppNew => 200,
            ChangeDetail::AppAccepted => 201,
            ChangeDetail::AppStarting => 202,
            ChangeDetail::AppRunning => 203,
            ChangeDetail::AppCompleting => 204,
            ChangeDetail::AppCompleted => 205,
            ChangeDetail::AppFailing => 206,
            ChangeDetail::AppFailed => 207,
            ChangeDetail::AppResuming => 208,
            ChangeDetail::AppExpired => 209,
            ChangeDetail::AppReject => 210,
            ChangeDetail::AppNewAlloc => 211,
            ChangeDetail::AppAllocTimeout => 212,
            ChangeDetail::AppCancel => 213,
            ChangeDetail::AppAllocKill => 214,
            ChangeDetail::NodeDecommission => 300,
            ChangeDetail::NodeReady => 301,
            ChangeDetail::NodeSchedulable => 302,
            ChangeDetail::NodeAlloc => 303,
            ChangeDetail::NodeCapacity => 304,
            ChangeDetail::NodeOccupied => 305,
            ChangeDetail::NodeReservation => 306,
            ChangeDetail::QueueConfig => 400,
            ChangeDetail::QueueDynamic => 401,
            ChangeDetail::QueueType => 402,
            ChangeDetail::QueueMax => 403,
            ChangeDetail::QueueGuaranteed => 404,
            ChangeDetail::QueueApp => 405,
            ChangeDetail::QueueAlloc => 406,
            ChangeDetail::Unrecognized => -1,
        }
    }
}

impl From<i32> for ChangeDetail {
    fn from(code: i32) -> ChangeDetail {
        match code {
            0 => ChangeDetail::DetailsNone,
            100 => ChangeDetail::RequestCancel,
            101 => ChangeDetail::RequestAlloc,
            102 => ChangeDetail::RequestTimeout,
            200 => ChangeDetail::AppNew,
            201 => ChangeDetail::AppAccepted,
            202 => ChangeDetail::AppStarting,
            203 => ChangeDetail::AppRunning,
            204 => ChangeDetail::AppCompleting,
            205 => ChangeDetail::AppCompleted,
            206 => ChangeDetail::AppFailing,
            207 => ChangeDetail::AppFailed,
            208 => ChangeDetail::AppResuming,
            209 => ChangeDetail::AppExpired,
            210 => ChangeDetail::AppReject,
            211 => ChangeDetail::AppNewAlloc,
            212 => ChangeDetail::AppAllocTimeout,
            213 => ChangeDetail::AppCancel,
            214 => ChangeDetail::AppAllocKill,
            300 => ChangeDetail::NodeDecommission,
            301 => ChangeDetail::NodeReady,
            302 => ChangeDetail::NodeSchedulable,
            303 => ChangeDetail::NodeAlloc,
            304 => ChangeDetail::NodeCapacity,
            305 => ChangeDetail::NodeOccupied,
            306 => ChangeDetail::NodeReservation,
            400 => ChangeDetail::QueueConfig,
            401 => ChangeDetail::QueueDynamic,
            402 => ChangeDetail::QueueType,
            403 => ChangeDetail::QueueMax,
            404 => ChangeDetail::QueueGuaranteed,
            405 => ChangeDetail::QueueApp,
            406 => ChangeDetail::QueueAlloc,
            _ => ChangeDetail::Unrecognized,
        }
    }
}

/// A single quantity inside a resource map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: i64,
}

/// Structured resource usage attached to some events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub resources: HashMap<String, Quantity>,
}

/// One immutable observation emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(rename = "objectID", default)]
    pub object_id: String,
    #[serde(rename = "referenceID", default)]
    pub reference_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "timestampNano", default)]
    pub timestamp_nano: i64,
    #[serde(rename = "changeType", default)]
    pub change_type: ChangeType,
    #[serde(rename = "changeDetail", default)]
    pub change_detail: ChangeDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Unknown
    }
}

impl Default for ChangeType {
    fn default() -> Self {
        ChangeType::None
    }
}

impl Default for ChangeDetail {
    fn default() -> Self {
        ChangeDetail::DetailsNone
    }
}

/// Response of the scheduler's batch endpoint. `lowest_id` and `highest_id`
/// describe the identifiers currently retained in the upstream ring buffer;
/// `event_records` is the contiguous run starting at the requested identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    #[serde(rename = "instanceUUID", default)]
    pub instance_uuid: String,
    #[serde(rename = "lowestID", default)]
    pub lowest_id: u64,
    #[serde(rename = "highestID", default)]
    pub highest_id: u64,
    #[serde(rename = "eventRecords", default)]
    pub event_records: Vec<EventRecord>,
}

/// Structured error body returned by the scheduler on non-200 responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(rename = "statusCode", default)]
    pub status_code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub description: String,
}
