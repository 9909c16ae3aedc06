//! Decode-and-route for inbound webhook events.

use std::sync::Arc;

use cb_events::{decode, EventHeader, EventType, ResourceLink};
use cb_store::SubscriptionType;
use tracing::debug;

use crate::cache::SubscriptionData;
use crate::error::{ConnectorError, Result};
use crate::manager::SubscriptionManager;

/// Routes a decoded webhook event into the matching manager workflow.
pub struct EventDispatcher {
    manager: Arc<SubscriptionManager>,
}

impl EventDispatcher {
    pub fn new(manager: Arc<SubscriptionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }

    /// Route `body` according to the subscription that produced it.
    pub async fn dispatch(
        &self,
        data: SubscriptionData,
        header: &EventHeader,
        body: &[u8],
    ) -> Result<()> {
        debug!(
            event_type = %header.event_type,
            sequence = header.sequence_number,
            subscription_id = %header.subscription_id,
            "dispatching event"
        );
        match data.subscription.subscription_type {
            SubscriptionType::Device => self.dispatch_device_event(&data, header, body).await,
            SubscriptionType::Resource => self.dispatch_resource_event(&data, header, body).await,
        }
    }

    /// Events of a device-level subscription: published/unpublished.
    pub async fn dispatch_device_event(
        &self,
        data: &SubscriptionData,
        header: &EventHeader,
        body: &[u8],
    ) -> Result<()> {
        match header.event_type {
            EventType::ResourcesPublished => {
                let links: Vec<ResourceLink> =
                    decode(header.event_type, &header.content_type, body)?;
                self.manager
                    .handle_resources_published(&data.linked_account, header, &links)
                    .await
            }
            EventType::ResourcesUnpublished => {
                let links: Vec<ResourceLink> =
                    decode(header.event_type, &header.content_type, body)?;
                self.manager
                    .handle_resources_unpublished(&data.linked_account, header, &links)
                    .await
            }
            other => Err(ConnectorError::UnsupportedEventType(other.to_string())),
        }
    }

    /// Events of a resource-level subscription: content changed.
    pub async fn dispatch_resource_event(
        &self,
        data: &SubscriptionData,
        header: &EventHeader,
        body: &[u8],
    ) -> Result<()> {
        match header.event_type {
            EventType::ResourceContentChanged => {
                self.manager
                    .handle_resource_content_changed(data, header, body)
                    .await
            }
            other => Err(ConnectorError::UnsupportedEventType(other.to_string())),
        }
    }
}
