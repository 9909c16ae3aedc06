//! Subscribe request/response bodies exchanged with the external cloud.

use crate::header::EventType;
use serde::{Deserialize, Serialize};

/// Body of a subscribe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Callback URL webhook events are delivered to.
    pub url: String,

    /// Event types the caller wants delivered.
    pub event_types: Vec<EventType>,

    /// Secret the external cloud signs deliveries with.
    pub signing_secret: String,
}

/// Response to a successful subscribe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    /// Identifier the external cloud assigned to the subscription.
    pub subscription_id: String,
}
