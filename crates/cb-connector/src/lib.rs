//! Subscription lifecycle and event translation for the CloudBridge
//! connector.
//!
//! The [`SubscriptionManager`] drives the subscribe/cancel protocol
//! against the external cloud and keeps the correlation cache and the
//! subscription store consistent with the outcome; the
//! [`EventDispatcher`] decodes inbound webhook payloads and routes them
//! into the manager's workflows; the projection module re-registers
//! known devices at startup.

pub mod api;
pub mod cache;
pub mod cloud;
pub mod dispatcher;
pub mod error;
pub mod manager;
pub mod projection;
pub mod registry;

pub use cache::{CorrelationCache, SubscriptionData};
pub use cloud::CloudClient;
pub use dispatcher::EventDispatcher;
pub use error::{ConnectorError, Result};
pub use manager::SubscriptionManager;
pub use projection::{register_stored_devices, DeviceProjection, DeviceRegistry, ProjectionUpdate};
pub use registry::{HttpRegistryClient, ResourceRegistryClient, CONNECTION_ID};
