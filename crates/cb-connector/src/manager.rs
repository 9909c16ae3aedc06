//! Subscription workflows.
//!
//! The manager drives the subscribe/cancel protocol against the external
//! cloud, keeps the correlation cache and the subscription store
//! consistent with the outcome, and translates inbound events into
//! registry commands. Batch handlers never abort early: independent links
//! are processed best-effort and failures are aggregated.

use std::sync::Arc;

use cb_common::MultiError;
use cb_events::signature::generate_signing_secret;
use cb_events::{EventHeader, EventType, ResourceLink, SubscriptionRequest};
use cb_store::{LinkedAccount, Subscription, SubscriptionQuery, SubscriptionStore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CorrelationCache, SubscriptionData};
use crate::cloud::CloudClient;
use crate::error::{ConnectorError, Result};
use crate::registry::{
    resource_id, AuthorizationContext, CommandMetadata, Content, EndpointInformation,
    NotifyResourceContentChangedRequest, PublishResourceRequest, Resource,
    ResourceRegistryClient, UnpublishResourceRequest,
};

pub struct SubscriptionManager {
    cloud: CloudClient,
    registry: Arc<dyn ResourceRegistryClient>,
    store: Arc<dyn SubscriptionStore>,
    cache: CorrelationCache,
}

impl SubscriptionManager {
    pub fn new(
        cloud: CloudClient,
        registry: Arc<dyn ResourceRegistryClient>,
        store: Arc<dyn SubscriptionStore>,
        cache: CorrelationCache,
    ) -> Self {
        Self {
            cloud,
            registry,
            store,
            cache,
        }
    }

    /// The correlation cache of in-flight subscribe attempts.
    pub fn correlation_cache(&self) -> &CorrelationCache {
        &self.cache
    }

    /// Pending subscribe context for `correlation_id`, if still in flight.
    pub fn pending(&self, correlation_id: &str) -> Option<SubscriptionData> {
        self.cache.get(correlation_id)
    }

    /// Consume the pending context on confirmation.
    pub fn take_pending(&self, correlation_id: &str) -> Option<SubscriptionData> {
        self.cache.take(correlation_id)
    }

    /// Spawn the periodic correlation cleanup sweep.
    pub fn spawn_cache_sweeper(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.cache.sweep();
            }
        })
    }

    // ---- external subscribe/cancel operations -------------------------

    /// Subscribe to a device's published/unpublished events.
    /// Returns the external subscription id. No local state changes.
    pub async fn subscribe_to_device(
        &self,
        account: &LinkedAccount,
        correlation_id: &str,
        signing_secret: &str,
        device_id: &str,
    ) -> Result<String> {
        let request = SubscriptionRequest {
            url: self.cloud.events_url().to_string(),
            event_types: vec![EventType::ResourcesPublished, EventType::ResourcesUnpublished],
            signing_secret: signing_secret.to_string(),
        };
        let response = self
            .cloud
            .subscribe(
                account,
                &format!("/devices/{device_id}/subscriptions"),
                correlation_id,
                &request,
            )
            .await?;
        Ok(response.subscription_id)
    }

    pub async fn cancel_device_subscription(
        &self,
        account: &LinkedAccount,
        device_id: &str,
        subscription_id: &str,
    ) -> Result<()> {
        self.cloud
            .cancel(
                account,
                &format!("/devices/{device_id}/subscriptions/{subscription_id}"),
            )
            .await
    }

    /// Subscribe to content-changed events of one device resource.
    pub async fn subscribe_to_resource(
        &self,
        account: &LinkedAccount,
        correlation_id: &str,
        signing_secret: &str,
        device_id: &str,
        href: &str,
    ) -> Result<String> {
        let request = SubscriptionRequest {
            url: self.cloud.events_url().to_string(),
            event_types: vec![EventType::ResourceContentChanged],
            signing_secret: signing_secret.to_string(),
        };
        let href = cb_events::links::canonical_href(href);
        let response = self
            .cloud
            .subscribe(
                account,
                &format!("/devices/{device_id}{href}/subscriptions"),
                correlation_id,
                &request,
            )
            .await?;
        Ok(response.subscription_id)
    }

    pub async fn cancel_resource_subscription(
        &self,
        account: &LinkedAccount,
        device_id: &str,
        href: &str,
        subscription_id: &str,
    ) -> Result<()> {
        let href = cb_events::links::canonical_href(href);
        self.cloud
            .cancel(
                account,
                &format!("/devices/{device_id}{href}/subscriptions/{subscription_id}"),
            )
            .await
    }

    // ---- device feed lifecycle ----------------------------------------

    /// Establish the device-level event feed for a newly linked device:
    /// cache a pending context, subscribe, persist the confirmed
    /// subscription. The cache entry is rolled back on failure.
    pub async fn register_device_feed(
        &self,
        account: &LinkedAccount,
        device_id: &str,
    ) -> Result<Subscription> {
        let signing_secret = generate_signing_secret();
        let correlation_id = Uuid::new_v4().to_string();
        let mut sub = Subscription::device(&account.id, device_id, &signing_secret);

        self.cache.add(
            &correlation_id,
            SubscriptionData {
                linked_account: account.clone(),
                subscription: sub.clone(),
            },
        )?;

        sub.subscription_id = match self
            .subscribe_to_device(account, &correlation_id, &signing_secret, device_id)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.cache.remove(&correlation_id);
                return Err(err);
            }
        };
        let external_id = sub.subscription_id.clone();

        match self.store.find_or_create_subscription(sub).await {
            Ok(stored) => {
                self.cache.remove(&correlation_id);
                Ok(stored)
            }
            Err(store_err) => {
                self.cache.remove(&correlation_id);
                match self
                    .cancel_device_subscription(account, device_id, &external_id)
                    .await
                {
                    Ok(()) => Err(store_err.into()),
                    Err(cancel_err) => {
                        warn!(
                            device_id,
                            subscription_id = %external_id,
                            error = %cancel_err,
                            "compensating cancel failed"
                        );
                        let mut folded = MultiError::new();
                        folded.push(ConnectorError::from(store_err));
                        folded.push(cancel_err);
                        Err(folded.into())
                    }
                }
            }
        }
    }

    /// Tear down a device-level feed: cancel remotely, forget locally.
    pub async fn drop_device_feed(
        &self,
        account: &LinkedAccount,
        device_id: &str,
        subscription_id: &str,
    ) -> Result<()> {
        let mut errors = MultiError::new();
        if let Err(err) = self
            .cancel_device_subscription(account, device_id, subscription_id)
            .await
        {
            errors.push(err);
        }
        if let Err(err) = self
            .store
            .remove_subscriptions(SubscriptionQuery::new().with_subscription_id(subscription_id))
            .await
        {
            errors.push(err.into());
        }
        errors.into_result().map_err(ConnectorError::from)
    }

    // ---- inbound event workflows --------------------------------------

    /// Publish every reported resource at the registry and subscribe to
    /// its content changes.
    ///
    /// Per-link failures are recorded and the remaining links still run;
    /// the aggregate is returned at the end. A link whose subscribe fails
    /// stays published at the registry without a subscription; that gap
    /// is logged, not repaired here.
    pub async fn handle_resources_published(
        &self,
        account: &LinkedAccount,
        header: &EventHeader,
        links: &[ResourceLink],
    ) -> Result<()> {
        let user_id = account.access_token.subject()?;
        let mut errors = MultiError::new();
        for link in links {
            if let Err(err) = self
                .publish_and_subscribe(account, &user_id, header, link)
                .await
            {
                errors.push(err);
            }
        }
        errors.into_result().map_err(ConnectorError::from)
    }

    async fn publish_and_subscribe(
        &self,
        account: &LinkedAccount,
        user_id: &str,
        header: &EventHeader,
        link: &ResourceLink,
    ) -> Result<()> {
        let href = link.canonical_href();

        self.registry
            .publish_resource(build_publish_request(account, user_id, header, link))
            .await?;

        let signing_secret = generate_signing_secret();
        let correlation_id = Uuid::new_v4().to_string();
        let mut sub =
            Subscription::resource(&account.id, &link.device_id, &href, &signing_secret);

        self.cache.add(
            &correlation_id,
            SubscriptionData {
                linked_account: account.clone(),
                subscription: sub.clone(),
            },
        )?;

        sub.subscription_id = match self
            .subscribe_to_resource(
                account,
                &correlation_id,
                &signing_secret,
                &link.device_id,
                &href,
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.cache.remove(&correlation_id);
                warn!(
                    device_id = %link.device_id,
                    href = %href,
                    "resource stays published without a subscription"
                );
                return Err(err);
            }
        };
        let external_id = sub.subscription_id.clone();

        if let Err(store_err) = self.store.find_or_create_subscription(sub).await {
            self.cache.remove(&correlation_id);
            return match self
                .cancel_resource_subscription(account, &link.device_id, &href, &external_id)
                .await
            {
                Ok(()) => Err(store_err.into()),
                Err(cancel_err) => {
                    warn!(
                        device_id = %link.device_id,
                        href = %href,
                        subscription_id = %external_id,
                        error = %cancel_err,
                        "compensating cancel failed"
                    );
                    let mut folded = MultiError::new();
                    folded.push(ConnectorError::from(store_err));
                    folded.push(cancel_err);
                    Err(folded.into())
                }
            };
        }

        self.cache.remove(&correlation_id);
        debug!(
            device_id = %link.device_id,
            href = %href,
            subscription_id = %external_id,
            "resource published and subscribed"
        );
        Ok(())
    }

    /// Unpublish every reported resource and tear down its subscription.
    ///
    /// All four sub-steps run for every link even when earlier ones fail.
    pub async fn handle_resources_unpublished(
        &self,
        account: &LinkedAccount,
        header: &EventHeader,
        links: &[ResourceLink],
    ) -> Result<()> {
        let user_id = account.access_token.subject()?;
        let mut errors = MultiError::new();
        for link in links {
            let href = link.canonical_href();

            if let Err(err) = self
                .registry
                .unpublish_resource(UnpublishResourceRequest {
                    authorization_context: authorization(account, &user_id, &link.device_id),
                    resource_id: resource_id(&link.device_id, &href),
                    command_metadata: CommandMetadata::with_sequence(header.sequence_number),
                })
                .await
            {
                errors.push(err);
            }

            if let Err(err) = self
                .cancel_resource_subscription(
                    account,
                    &link.device_id,
                    &href,
                    &header.subscription_id,
                )
                .await
            {
                errors.push(err);
            }

            if let Err(err) = self
                .store
                .remove_subscriptions(
                    SubscriptionQuery::new().with_subscription_id(&header.subscription_id),
                )
                .await
            {
                errors.push(err.into());
            }

            self.cache.remove(&header.correlation_id);
        }
        errors.into_result().map_err(ConnectorError::from)
    }

    /// Forward a resource's changed representation to the registry.
    /// Fails fast; neither cache nor store are touched.
    pub async fn handle_resource_content_changed(
        &self,
        data: &SubscriptionData,
        header: &EventHeader,
        body: &[u8],
    ) -> Result<()> {
        let user_id = data.linked_account.access_token.subject()?;
        let device_id = &data.subscription.device_id;
        let href = data.subscription.href.as_deref().unwrap_or("");
        let format = cb_events::ContentFormat::from_content_type(&header.content_type);

        self.registry
            .notify_resource_content_changed(NotifyResourceContentChangedRequest {
                authorization_context: authorization(&data.linked_account, &user_id, device_id),
                resource_id: resource_id(device_id, href),
                content: Content {
                    content_type: header.content_type.clone(),
                    content_format: format.code(),
                    data: body.to_vec(),
                },
                command_metadata: CommandMetadata::with_sequence(header.sequence_number),
            })
            .await
    }
}

fn authorization(account: &LinkedAccount, user_id: &str, device_id: &str) -> AuthorizationContext {
    AuthorizationContext {
        user_id: user_id.to_string(),
        access_token: account.access_token.as_str().to_string(),
        device_id: device_id.to_string(),
    }
}

fn build_publish_request(
    account: &LinkedAccount,
    user_id: &str,
    header: &EventHeader,
    link: &ResourceLink,
) -> PublishResourceRequest {
    let href = link.canonical_href();
    let id = resource_id(&link.device_id, &href);
    let endpoints = link
        .endpoints
        .iter()
        .map(|ep| EndpointInformation {
            endpoint: ep.uri.clone(),
            priority: ep.priority,
        })
        .collect();

    PublishResourceRequest {
        authorization_context: authorization(account, user_id, &link.device_id),
        resource_id: id.clone(),
        resource: Resource {
            id,
            href: link.href.clone(),
            device_id: link.device_id.clone(),
            resource_types: link.resource_types.clone(),
            interfaces: link.interfaces.clone(),
            instance_id: link.instance_id,
            anchor: link.anchor.clone(),
            title: link.title.clone(),
            supported_content_types: link.supported_content_types.clone(),
            policy_bit_flags: link.policy.bit_mask,
            endpoint_informations: endpoints,
        },
        command_metadata: CommandMetadata::with_sequence(header.sequence_number),
    }
}
