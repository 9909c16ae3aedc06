//! Webhook event model shared between the connector and its intake layer:
//! event headers and types, resource links, subscribe request/response
//! bodies, content-format mapping, payload codecs, and HMAC webhook
//! signing.

pub mod codec;
pub mod content;
pub mod header;
pub mod links;
pub mod signature;
pub mod subscribe;

pub use codec::{decode, DecodeError};
pub use content::ContentFormat;
pub use header::{EventHeader, EventType, UnknownEventType};
pub use links::{Endpoint, Policy, ResourceLink};
pub use subscribe::{SubscriptionRequest, SubscriptionResponse};
