//! Shared test doubles: an in-memory store and a recording registry
//! client, both with failure injection.
#![allow(dead_code)] // not every suite uses every helper

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cb_connector::registry::{
    NotifyResourceContentChangedRequest, PublishResourceRequest, ResourceRegistryClient,
    UnpublishResourceRequest,
};
use cb_connector::{ConnectorError, Result as ConnectorResult};
use cb_events::{EventHeader, EventType, ResourceLink};
use cb_store::{
    AccountStore, LinkedAccount, LinkedCloud, StoreError, Subscription, SubscriptionQuery,
    SubscriptionStore,
};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;

/// Linked account whose token carries the given subject claim.
pub fn account_with_subject(api_url: &str, subject: &str) -> LinkedAccount {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": subject }).to_string().as_bytes());
    let token = format!("{header}.{payload}.signature");
    LinkedAccount::new(LinkedCloud::new("partner", api_url), token)
}

pub fn published_header(sequence: u64) -> EventHeader {
    EventHeader {
        event_type: EventType::ResourcesPublished,
        sequence_number: sequence,
        correlation_id: String::new(),
        subscription_id: "device-sub-1".to_string(),
        content_type: "application/json".to_string(),
    }
}

pub fn link(device_id: &str, href: &str) -> ResourceLink {
    ResourceLink {
        device_id: device_id.to_string(),
        href: href.to_string(),
        resource_types: vec!["core.light".to_string()],
        interfaces: vec!["oic.if.baseline".to_string()],
        anchor: format!("ocf://{device_id}"),
        ..Default::default()
    }
}

fn injected(context: &str) -> StoreError {
    StoreError::MissingDocument(format!("injected failure: {context}"))
}

/// In-memory store double.
#[derive(Default)]
pub struct MemoryStore {
    pub subscriptions: Mutex<Vec<Subscription>>,
    pub accounts: Mutex<Vec<LinkedAccount>>,
    pub fail_create: AtomicBool,
    pub fail_load: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_subscription(self: Arc<Self>, sub: Subscription) -> Arc<Self> {
        self.subscriptions.lock().push(sub);
        self
    }

    pub fn with_account(self: Arc<Self>, account: LinkedAccount) -> Arc<Self> {
        self.accounts.lock().push(account);
        self
    }

    pub fn confirmed(&self) -> Vec<Subscription> {
        self.subscriptions
            .lock()
            .iter()
            .filter(|sub| sub.is_confirmed())
            .cloned()
            .collect()
    }
}

fn matches_query(sub: &Subscription, query: &SubscriptionQuery) -> bool {
    query
        .subscription_type
        .map_or(true, |t| sub.subscription_type == t)
        && query
            .subscription_id
            .as_ref()
            .map_or(true, |id| &sub.subscription_id == id)
        && query
            .linked_account_id
            .as_ref()
            .map_or(true, |id| &sub.linked_account_id == id)
        && query.device_id.as_ref().map_or(true, |id| &sub.device_id == id)
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_or_create_subscription(
        &self,
        sub: Subscription,
    ) -> Result<Subscription, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("find_or_create"));
        }
        let mut subs = self.subscriptions.lock();
        if let Some(existing) = subs.iter().find(|s| {
            s.subscription_type == sub.subscription_type
                && s.linked_account_id == sub.linked_account_id
                && s.device_id == sub.device_id
                && s.href == sub.href
        }) {
            return Ok(existing.clone());
        }
        subs.push(sub.clone());
        Ok(sub)
    }

    async fn find_by_external_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .find(|s| s.subscription_id == subscription_id)
            .cloned())
    }

    async fn remove_subscriptions(&self, query: SubscriptionQuery) -> Result<u64, StoreError> {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|sub| !matches_query(sub, &query));
        Ok((before - subs.len()) as u64)
    }

    async fn load_subscriptions(
        &self,
        query: SubscriptionQuery,
    ) -> Result<BoxStream<'static, Result<Subscription, StoreError>>, StoreError> {
        if self.fail_load.load(Ordering::SeqCst) {
            let items: Vec<Result<Subscription, StoreError>> = vec![Err(injected("cursor"))];
            return Ok(stream::iter(items).boxed());
        }
        let items: Vec<Result<Subscription, StoreError>> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|sub| matches_query(sub, &query))
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_linked_account(&self, id: &str) -> Result<Option<LinkedAccount>, StoreError> {
        Ok(self.accounts.lock().iter().find(|a| a.id == id).cloned())
    }

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        self.accounts.lock().push(account.clone());
        Ok(())
    }
}

/// Registry double recording every command it receives.
#[derive(Default)]
pub struct RecordingRegistry {
    pub published: Mutex<Vec<PublishResourceRequest>>,
    pub unpublished: Mutex<Vec<UnpublishResourceRequest>>,
    pub notified: Mutex<Vec<NotifyResourceContentChangedRequest>>,
    pub fail_publish: AtomicBool,
    pub fail_unpublish: AtomicBool,
    pub fail_notify: AtomicBool,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ResourceRegistryClient for RecordingRegistry {
    async fn publish_resource(&self, request: PublishResourceRequest) -> ConnectorResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(ConnectorError::ExternalApi("publish rejected".to_string()));
        }
        self.published.lock().push(request);
        Ok(())
    }

    async fn unpublish_resource(&self, request: UnpublishResourceRequest) -> ConnectorResult<()> {
        if self.fail_unpublish.load(Ordering::SeqCst) {
            return Err(ConnectorError::ExternalApi("unpublish rejected".to_string()));
        }
        self.unpublished.lock().push(request);
        Ok(())
    }

    async fn notify_resource_content_changed(
        &self,
        request: NotifyResourceContentChangedRequest,
    ) -> ConnectorResult<()> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(ConnectorError::ExternalApi("notify rejected".to_string()));
        }
        self.notified.lock().push(request);
        Ok(())
    }
}
