//! Durable state of the connector: linked clouds, linked accounts, and
//! confirmed webhook subscriptions, with a MongoDB-backed implementation.

mod entity;
mod mongo;
mod store;

pub use entity::{
    AccessToken, LinkedAccount, LinkedCloud, OAuthConfig, Subscription, SubscriptionQuery,
    SubscriptionType, TokenError,
};
pub use mongo::MongoStore;
pub use store::{AccountStore, StoreError, SubscriptionStore};

pub type Result<T> = std::result::Result<T, StoreError>;
