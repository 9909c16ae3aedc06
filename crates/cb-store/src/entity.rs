//! Store entities.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth client configuration of a linked cloud.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// An external cloud partner this connector is linked with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedCloud {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Base URL of the partner's device API.
    pub api_url: String,
    pub oauth: OAuthConfig,
}

impl LinkedCloud {
    pub fn new(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            api_url: api_url.into(),
            oauth: OAuthConfig::default(),
        }
    }

    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = oauth;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("access token is not a JWT")]
    Malformed,

    #[error("cannot decode token claims: {0}")]
    Claims(String),

    #[error("token carries no subject claim")]
    MissingSubject,
}

/// Bearer credential a linked account acts with.
///
/// The token was already accepted by the external cloud; we only read
/// its claims, we never validate the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `sub` claim of the token payload.
    pub fn subject(&self) -> Result<String, TokenError> {
        let payload = self.0.split('.').nth(1).ok_or(TokenError::Malformed)?;
        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| TokenError::Claims(e.to_string()))?;
        let claims: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| TokenError::Claims(e.to_string()))?;
        claims
            .get("sub")
            .and_then(|sub| sub.as_str())
            .filter(|sub| !sub.is_empty())
            .map(|sub| sub.to_string())
            .ok_or(TokenError::MissingSubject)
    }
}

/// One user's authenticated linkage to an external cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    #[serde(rename = "_id")]
    pub id: String,
    /// The cloud this account belongs to.
    pub origin_cloud: LinkedCloud,
    pub access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn new(origin_cloud: LinkedCloud, access_token: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            origin_cloud,
            access_token: AccessToken(access_token.into()),
            refresh_token: None,
            created_at: Utc::now(),
        }
    }
}

/// Scope of a webhook subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    /// Device-level events: resources published/unpublished.
    Device,
    /// Resource-level events: content changed.
    Resource,
}

/// A confirmed webhook registration.
///
/// `subscription_id` is the identifier the external cloud assigned; it is
/// non-empty only after a successful subscribe confirmation, and a
/// subscription without it must not be treated as active. Pending
/// subscriptions live in the correlation cache, never in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub subscription_type: SubscriptionType,
    pub linked_account_id: String,
    pub device_id: String,
    /// Resource path for resource-level subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Secret the external cloud signs deliveries with.
    pub signing_secret: String,
    /// External subscription identifier, set on confirmation.
    #[serde(default)]
    pub subscription_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn device(
        linked_account_id: impl Into<String>,
        device_id: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_type: SubscriptionType::Device,
            linked_account_id: linked_account_id.into(),
            device_id: device_id.into(),
            href: None,
            signing_secret: signing_secret.into(),
            subscription_id: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn resource(
        linked_account_id: impl Into<String>,
        device_id: impl Into<String>,
        href: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            href: Some(href.into()),
            subscription_type: SubscriptionType::Resource,
            ..Self::device(linked_account_id, device_id, signing_secret)
        }
    }

    pub fn is_confirmed(&self) -> bool {
        !self.subscription_id.is_empty()
    }
}

/// Filter for store queries; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionQuery {
    pub subscription_type: Option<SubscriptionType>,
    pub subscription_id: Option<String>,
    pub linked_account_id: Option<String>,
    pub device_id: Option<String>,
}

impl SubscriptionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, subscription_type: SubscriptionType) -> Self {
        self.subscription_type = Some(subscription_type);
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn with_linked_account_id(mut self, linked_account_id: impl Into<String>) -> Self {
        self.linked_account_id = Some(linked_account_id.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn token_with_claims(claims: serde_json::Value) -> AccessToken {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        AccessToken(format!("{header}.{payload}.signature"))
    }

    #[test]
    fn subject_reads_sub_claim() {
        let token = token_with_claims(serde_json::json!({"sub": "user-1", "exp": 0}));
        assert_eq!(token.subject().unwrap(), "user-1");
    }

    #[test]
    fn subject_fails_without_sub() {
        let token = token_with_claims(serde_json::json!({"exp": 0}));
        assert_eq!(token.subject().unwrap_err(), TokenError::MissingSubject);
    }

    #[test]
    fn subject_fails_on_opaque_token() {
        let token = AccessToken("not-a-jwt".to_string());
        assert_eq!(token.subject().unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn new_subscriptions_are_unconfirmed() {
        let sub = Subscription::resource("acc-1", "dev-1", "/light/1", "secret");
        assert!(!sub.is_confirmed());
        assert_eq!(sub.subscription_type, SubscriptionType::Resource);
        assert_eq!(sub.href.as_deref(), Some("/light/1"));
    }
}
