//! Resource links as published by the external cloud.
//!
//! Wire field names follow the OCF link format the external cloud uses
//! (`di`, `href`, `rt`, `if`, `eps`, ...).

use serde::{Deserialize, Serialize};

/// Access policy of a published resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy bit-mask (discoverable, observable, ...).
    #[serde(rename = "bm", default)]
    pub bit_mask: u32,
}

/// One network endpoint the resource is reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "ep")]
    pub uri: String,
    #[serde(rename = "pri", default)]
    pub priority: u64,
}

/// Published metadata of one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    #[serde(rename = "di", default)]
    pub device_id: String,

    #[serde(default)]
    pub href: String,

    /// Resource types.
    #[serde(rename = "rt", default)]
    pub resource_types: Vec<String>,

    /// Supported interfaces.
    #[serde(rename = "if", default)]
    pub interfaces: Vec<String>,

    /// Instance identifier of the link.
    #[serde(rename = "ins", default)]
    pub instance_id: i64,

    #[serde(default)]
    pub anchor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Supported content types for representations of this resource.
    #[serde(rename = "type", default)]
    pub supported_content_types: Vec<String>,

    #[serde(rename = "p", default)]
    pub policy: Policy,

    /// Prioritized endpoints; lower priority value wins.
    #[serde(rename = "eps", default)]
    pub endpoints: Vec<Endpoint>,
}

impl ResourceLink {
    /// Href normalized to a single leading slash with no trailing slash.
    pub fn canonical_href(&self) -> String {
        canonical_href(&self.href)
    }
}

/// Normalize a resource path: exactly one leading `/`, no trailing `/`.
pub fn canonical_href(href: &str) -> String {
    let trimmed = href.trim_matches('/');
    format!("/{}", trimmed)
}
