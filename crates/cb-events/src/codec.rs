//! Payload decoding for webhook bodies.
//!
//! The declared content type selects the decoder: serde_json for JSON,
//! ciborium for both CBOR flavors. Content-changed bodies are forwarded
//! raw and never pass through here.

use crate::content::{CONTENT_TYPE_CBOR, CONTENT_TYPE_JSON, CONTENT_TYPE_OCF_CBOR};
use crate::header::EventType;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot decode {event_type} payload as JSON: {source}")]
    Json {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode {event_type} payload as CBOR: {source}")]
    Cbor {
        event_type: EventType,
        #[source]
        source: ciborium::de::Error<std::io::Error>,
    },

    #[error("no decoder for content type {content_type} ({event_type})")]
    UnsupportedContentType {
        event_type: EventType,
        content_type: String,
    },
}

/// Decode `body` as declared by `content_type`.
pub fn decode<T: DeserializeOwned>(
    event_type: EventType,
    content_type: &str,
    body: &[u8],
) -> Result<T, DecodeError> {
    match content_type {
        CONTENT_TYPE_JSON => {
            serde_json::from_slice(body).map_err(|source| DecodeError::Json { event_type, source })
        }
        CONTENT_TYPE_CBOR | CONTENT_TYPE_OCF_CBOR => {
            ciborium::de::from_reader(body).map_err(|source| DecodeError::Cbor { event_type, source })
        }
        other => Err(DecodeError::UnsupportedContentType {
            event_type,
            content_type: other.to_string(),
        }),
    }
}
