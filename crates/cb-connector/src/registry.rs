//! Commands against the internal resource registry.
//!
//! The registry is an external collaborator; the command shapes and the
//! [`ResourceRegistryClient`] trait are the contract, the bundled HTTP
//! implementation is one transport. Every command is tagged with the
//! originating connection id and the webhook's sequence number so the
//! registry can order commands per device.

use std::time::Duration;

use async_trait::async_trait;
use cb_events::links::canonical_href;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConnectorError, Result};

/// Fixed originator id for commands issued by this connector.
pub const CONNECTION_ID: &str = "cloudbridge-connector";

/// Deterministic registry id of a device's resource.
pub fn resource_id(device_id: &str, href: &str) -> String {
    let name = format!("{}{}", device_id, canonical_href(href));
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Who a command acts on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationContext {
    pub user_id: String,
    pub access_token: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetadata {
    pub connection_id: String,
    pub sequence: u64,
}

impl CommandMetadata {
    pub fn with_sequence(sequence: u64) -> Self {
        Self {
            connection_id: CONNECTION_ID.to_string(),
            sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInformation {
    pub endpoint: String,
    pub priority: u64,
}

/// Resource metadata as the registry stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub href: String,
    pub device_id: String,
    pub resource_types: Vec<String>,
    pub interfaces: Vec<String>,
    pub instance_id: i64,
    pub anchor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub supported_content_types: Vec<String>,
    pub policy_bit_flags: u32,
    pub endpoint_informations: Vec<EndpointInformation>,
}

/// Raw resource representation forwarded with a content-changed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub content_type: String,
    /// CoAP content-format code; `-1` when the type is not recognized.
    pub content_format: i32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResourceRequest {
    pub authorization_context: AuthorizationContext,
    pub resource_id: String,
    pub resource: Resource,
    pub command_metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpublishResourceRequest {
    pub authorization_context: AuthorizationContext,
    pub resource_id: String,
    pub command_metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResourceContentChangedRequest {
    pub authorization_context: AuthorizationContext,
    pub resource_id: String,
    pub content: Content,
    pub command_metadata: CommandMetadata,
}

/// Command interface of the resource registry.
#[async_trait]
pub trait ResourceRegistryClient: Send + Sync {
    async fn publish_resource(&self, request: PublishResourceRequest) -> Result<()>;

    async fn unpublish_resource(&self, request: UnpublishResourceRequest) -> Result<()>;

    async fn notify_resource_content_changed(
        &self,
        request: NotifyResourceContentChangedRequest,
    ) -> Result<()>;
}

/// JSON-over-HTTP transport for the registry command API.
pub struct HttpRegistryClient {
    http: Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ConnectorError::ExternalApi(format!("registry {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::ExternalApi(format!(
                "registry {path}: HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceRegistryClient for HttpRegistryClient {
    async fn publish_resource(&self, request: PublishResourceRequest) -> Result<()> {
        self.post("/resources/publish", &request).await
    }

    async fn unpublish_resource(&self, request: UnpublishResourceRequest) -> Result<()> {
        self.post("/resources/unpublish", &request).await
    }

    async fn notify_resource_content_changed(
        &self,
        request: NotifyResourceContentChangedRequest,
    ) -> Result<()> {
        self.post("/resources/notify-content-changed", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_is_deterministic() {
        let a = resource_id("dev-1", "/light/1");
        let b = resource_id("dev-1", "light/1");
        assert_eq!(a, b);
        assert_ne!(a, resource_id("dev-1", "/light/2"));
        assert_ne!(a, resource_id("dev-2", "/light/1"));
    }
}
