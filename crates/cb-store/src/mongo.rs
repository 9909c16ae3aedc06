//! MongoDB-backed store.

use crate::entity::{LinkedAccount, Subscription, SubscriptionQuery, SubscriptionType};
use crate::store::{AccountStore, StoreError, SubscriptionStore};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use mongodb::options::ReturnDocument;
use mongodb::{bson::doc, bson::Document, Collection, Database};

const SUBSCRIPTIONS: &str = "subscriptions";
const LINKED_ACCOUNTS: &str = "linkedAccounts";

pub struct MongoStore {
    subscriptions: Collection<Subscription>,
    accounts: Collection<LinkedAccount>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            subscriptions: db.collection(SUBSCRIPTIONS),
            accounts: db.collection(LINKED_ACCOUNTS),
        }
    }
}

fn type_str(subscription_type: SubscriptionType) -> &'static str {
    match subscription_type {
        SubscriptionType::Device => "DEVICE",
        SubscriptionType::Resource => "RESOURCE",
    }
}

fn query_filter(query: &SubscriptionQuery) -> Document {
    let mut filter = Document::new();
    if let Some(subscription_type) = query.subscription_type {
        filter.insert("subscriptionType", type_str(subscription_type));
    }
    if let Some(subscription_id) = &query.subscription_id {
        filter.insert("subscriptionId", subscription_id);
    }
    if let Some(linked_account_id) = &query.linked_account_id {
        filter.insert("linkedAccountId", linked_account_id);
    }
    if let Some(device_id) = &query.device_id {
        filter.insert("deviceId", device_id);
    }
    filter
}

/// Identity of a subscription: who subscribed to what.
fn identity_filter(sub: &Subscription) -> Document {
    doc! {
        "subscriptionType": type_str(sub.subscription_type),
        "linkedAccountId": &sub.linked_account_id,
        "deviceId": &sub.device_id,
        "href": sub.href.as_deref(),
    }
}

#[async_trait]
impl SubscriptionStore for MongoStore {
    async fn find_or_create_subscription(
        &self,
        sub: Subscription,
    ) -> Result<Subscription, StoreError> {
        let filter = identity_filter(&sub);
        let on_insert = bson::to_document(&sub)?;
        let stored = self
            .subscriptions
            .find_one_and_update(filter, doc! { "$setOnInsert": on_insert })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;
        stored.ok_or_else(|| {
            StoreError::MissingDocument(format!(
                "find-or-create returned nothing for device {}",
                sub.device_id
            ))
        })
    }

    async fn find_by_external_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .find_one(doc! { "subscriptionId": subscription_id })
            .await?)
    }

    async fn remove_subscriptions(&self, query: SubscriptionQuery) -> Result<u64, StoreError> {
        let result = self.subscriptions.delete_many(query_filter(&query)).await?;
        Ok(result.deleted_count)
    }

    async fn load_subscriptions(
        &self,
        query: SubscriptionQuery,
    ) -> Result<BoxStream<'static, Result<Subscription, StoreError>>, StoreError> {
        let cursor = self.subscriptions.find(query_filter(&query)).await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }
}

#[async_trait]
impl AccountStore for MongoStore {
    async fn find_linked_account(&self, id: &str) -> Result<Option<LinkedAccount>, StoreError> {
        Ok(self.accounts.find_one(doc! { "_id": id }).await?)
    }

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        self.accounts
            .replace_one(doc! { "_id": &account.id }, account)
            .upsert(true)
            .await?;
        Ok(())
    }
}
