use cb_common::MultiError;
use cb_events::{DecodeError, UnknownEventType};
use cb_store::{StoreError, TokenError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("external cloud API error: {0}")]
    ExternalApi(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    #[error("cannot resolve user identity: {0}")]
    IdentityResolution(#[from] TokenError),

    #[error("correlation id already in flight: {0}")]
    CacheCollision(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Aggregate outcome of a batch workflow; individual failures stay
    /// addressable through [`MultiError`].
    #[error(transparent)]
    Aggregate(#[from] MultiError<ConnectorError>),
}

impl From<UnknownEventType> for ConnectorError {
    fn from(err: UnknownEventType) -> Self {
        ConnectorError::UnsupportedEventType(err.0)
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
