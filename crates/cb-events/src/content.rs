//! Content-type to content-format mapping.
//!
//! The registry's `NotifyResourceContentChanged` command carries a CoAP
//! content-format code next to the raw body. Unrecognized content types
//! are passed through as [`ContentFormat::Unknown`], never rejected.

pub const CONTENT_TYPE_CBOR: &str = "application/cbor";
pub const CONTENT_TYPE_OCF_CBOR: &str = "application/vnd.ocf+cbor";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// CoAP content-format codes for the content types the connector maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Cbor,
    OcfCbor,
    Json,
    Unknown,
}

impl ContentFormat {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            CONTENT_TYPE_CBOR => ContentFormat::Cbor,
            CONTENT_TYPE_OCF_CBOR => ContentFormat::OcfCbor,
            CONTENT_TYPE_JSON => ContentFormat::Json,
            _ => ContentFormat::Unknown,
        }
    }

    /// Numeric CoAP content-format code; `-1` marks an unknown format.
    pub fn code(&self) -> i32 {
        match self {
            ContentFormat::Cbor => 60,
            ContentFormat::OcfCbor => 10000,
            ContentFormat::Json => 50,
            ContentFormat::Unknown => -1,
        }
    }
}
