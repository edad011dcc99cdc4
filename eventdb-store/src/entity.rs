//! Database row for one scheduler event, plus conversions to and from the
//! domain type.
//!
//! The `resource` column keeps the serialized quantity map, bounded to
//! [`RESOURCE_TEXT_LIMIT`] bytes: an oversized payload is dropped (the event
//! itself is still persisted) and an unreadable payload on the way out leaves
//! the reconstituted event without a resource.

use chrono::TimeZone;
use eventdb_core::{EventRecord, Resource};
use sea_orm::entity::prelude::*;

/// Serialized resource payloads above this size are not stored.
pub const RESOURCE_TEXT_LIMIT: usize = 1024;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Scheduler incarnation the row was written under.
    #[sea_orm(primary_key, auto_increment = false)]
    pub yunikorn_id: String,
    /// Absolute upstream position of the event at insertion time.
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i64,
    #[sea_orm(column_name = "type")]
    pub event_type: i32,
    #[sea_orm(indexed)]
    pub object_id: String,
    pub reference_id: String,
    pub message: String,
    pub timestamp: DateTimeUtc,
    pub change_type: i32,
    pub change_detail: i32,
    pub resource: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn entry_from_event(yunikorn_id: &str, event_id: u64, event: &EventRecord) -> Model {
    let resource = match &event.resource {
        None => String::new(),
        Some(resource) => match serde_json::to_string(resource) {
            Ok(text) if text.len() <= RESOURCE_TEXT_LIMIT => text,
            Ok(text) => {
                tracing::warn!(
                    object_id = %event.object_id,
                    size = text.len(),
                    "resource payload exceeds the storage bound, persisting the event without it"
                );
                String::new()
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to marshal the resource payload");
                String::new()
            }
        },
    };

    Model {
        yunikorn_id: yunikorn_id.to_owned(),
        event_id: event_id as i64,
        event_type: event.event_type.into(),
        object_id: event.object_id.clone(),
        reference_id: event.reference_id.clone(),
        message: event.message.clone(),
        timestamp: chrono::Utc.timestamp_nanos(event.timestamp_nano),
        change_type: event.change_type.into(),
        change_detail: event.change_detail.into(),
        resource,
    }
}

pub fn event_from_entry(entry: &Model) -> EventRecord {
    let resource = if entry.resource.is_empty() {
        None
    } else {
        match serde_json::from_str::<Resource>(&entry.resource) {
            Ok(resource) => Some(resource),
            Err(err) => {
                tracing::error!(error = %err, "unable to unmarshal the resource column");
                None
            }
        }
    };

    EventRecord {
        event_type: entry.event_type.into(),
        object_id: entry.object_id.clone(),
        reference_id: entry.reference_id.clone(),
        message: entry.message.clone(),
        timestamp_nano: entry.timestamp.timestamp_nanos_opt().unwrap_or_default(),
        change_type: entry.change_type.into(),
        change_detail: entry.change_detail.into(),
        resource,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventdb_core::{ChangeDetail, ChangeType, EventType, Quantity};
    use std::collections::HashMap;

    fn event_with_resource(resource: Option<Resource>) -> EventRecord {
        EventRecord {
            event_type: EventType::App,
            object_id: "app-1".to_string(),
            reference_id: "root.default".to_string(),
            message: "Application added".to_string(),
            timestamp_nano: 1_700_000_000_123_456_789,
            change_type: ChangeType::Add,
            change_detail: ChangeDetail::DetailsNone,
            resource,
        }
    }

    fn small_resource() -> Resource {
        Resource {
            resources: HashMap::from([
                ("vcore".to_string(), Quantity { value: 10 }),
                ("memory".to_string(), Quantity { value: 2048 }),
            ]),
        }
    }

    #[test]
    fn scalar_fields_round_trip() {
        let event = event_with_resource(None);
        let entry = entry_from_event("uuid-1", 42, &event);
        assert_eq!(entry.yunikorn_id, "uuid-1");
        assert_eq!(entry.event_id, 42);

        let back = event_from_entry(&entry);
        assert_eq!(back, event);
    }

    #[test]
    fn resource_round_trips_when_within_bound() {
        let event = event_with_resource(Some(small_resource()));
        let entry = entry_from_event("uuid-1", 0, &event);
        assert!(!entry.resource.is_empty());
        assert!(entry.resource.len() <= RESOURCE_TEXT_LIMIT);

        let back = event_from_entry(&entry);
        assert_eq!(back.resource, Some(small_resource()));
    }

    #[test]
    fn oversized_resource_is_dropped_but_event_survives() {
        let resources: HashMap<String, Quantity> = (0..100)
            .map(|i| (format!("resource-type-number-{i}"), Quantity { value: i }))
            .collect();
        let event = event_with_resource(Some(Resource { resources }));

        let entry = entry_from_event("uuid-1", 7, &event);
        assert!(entry.resource.is_empty());
        assert_eq!(entry.message, event.message);

        let back = event_from_entry(&entry);
        assert!(back.resource.is_none());
        assert_eq!(back.object_id, event.object_id);
    }

    #[test]
    fn unreadable_resource_column_reads_as_none() {
        let mut entry = entry_from_event("uuid-1", 0, &event_with_resource(None));
        entry.resource = "{not valid json".to_string();

        let back = event_from_entry(&entry);
        assert!(back.resource.is_none());
        assert_eq!(back.object_id, "app-1");
    }

    #[test]
    fn timestamp_conversion_keeps_nanoseconds() {
        let event = event_with_resource(None);
        let entry = entry_from_event("uuid-1", 0, &event);
        assert_eq!(
            entry.timestamp.timestamp_nanos_opt(),
            Some(1_700_000_000_123_456_789)
        );
    }

    #[test]
    fn unrecognized_codes_survive_storage() {
        let mut event = event_with_resource(None);
        event.event_type = EventType::Unrecognized;
        event.change_detail = ChangeDetail::Unrecognized;

        let entry = entry_from_event("uuid-1", 0, &event);
        let back = event_from_entry(&entry);
        assert_eq!(back.event_type, EventType::Unrecognized);
        assert_eq!(back.change_detail, ChangeDetail::Unrecognized);
        assert_ne!(back.change_detail, ChangeDetail::DetailsNone);
    }
}
