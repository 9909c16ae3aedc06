//! Inbound webhook metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Header names used by the external cloud's webhook deliveries.
pub const CORRELATION_ID_HEADER: &str = "Correlation-ID";
pub const EVENT_TYPE_HEADER: &str = "Event-Type";
pub const SEQUENCE_NUMBER_HEADER: &str = "Sequence-Number";
pub const SUBSCRIPTION_ID_HEADER: &str = "Subscription-ID";
pub const EVENT_SIGNATURE_HEADER: &str = "Event-Signature";
pub const EVENT_TIMESTAMP_HEADER: &str = "Event-Timestamp";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Event types the connector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "resources_published")]
    ResourcesPublished,
    #[serde(rename = "resources_unpublished")]
    ResourcesUnpublished,
    #[serde(rename = "resource_contentchanged")]
    ResourceContentChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ResourcesPublished => "resources_published",
            EventType::ResourcesUnpublished => "resources_unpublished",
            EventType::ResourceContentChanged => "resource_contentchanged",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when the `Event-Type` header names something we do not handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resources_published" => Ok(EventType::ResourcesPublished),
            "resources_unpublished" => Ok(EventType::ResourcesUnpublished),
            "resource_contentchanged" => Ok(EventType::ResourceContentChanged),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Metadata of one inbound webhook delivery.
///
/// `correlation_id` is set when the event answers a pending subscribe;
/// `subscription_id` identifies the confirmed subscription that produced
/// the event. `sequence_number` is monotonic per device and tags every
/// command the connector issues downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    pub event_type: EventType,
    pub sequence_number: u64,
    pub correlation_id: String,
    pub subscription_id: String,
    pub content_type: String,
}
