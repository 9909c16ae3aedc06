//! Store contracts.

use crate::entity::{LinkedAccount, Subscription, SubscriptionQuery};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("store returned no document where one was expected: {0}")]
    MissingDocument(String),
}

/// Durable persistence of confirmed subscriptions.
///
/// Implementations must be safe for concurrent find-or-create/remove
/// without caller-side locking.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Return the stored subscription matching `sub`'s identity
    /// (account, device, href, type), inserting `sub` if none exists.
    /// Atomic: two concurrent callers end up with the same record.
    async fn find_or_create_subscription(
        &self,
        sub: Subscription,
    ) -> Result<Subscription, StoreError>;

    /// Find a subscription by its external subscription identifier.
    async fn find_by_external_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Remove every subscription matching `query`; returns how many.
    async fn remove_subscriptions(&self, query: SubscriptionQuery) -> Result<u64, StoreError>;

    /// Stream all subscriptions matching `query`.
    ///
    /// A stream item error means the underlying cursor failed; bootstrap
    /// treats that as fatal.
    async fn load_subscriptions(
        &self,
        query: SubscriptionQuery,
    ) -> Result<BoxStream<'static, Result<Subscription, StoreError>>, StoreError>;
}

/// Access to linked accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_linked_account(&self, id: &str) -> Result<Option<LinkedAccount>, StoreError>;

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<(), StoreError>;
}
