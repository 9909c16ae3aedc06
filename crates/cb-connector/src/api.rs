//! Webhook intake.
//!
//! `POST /events` receives the external cloud's deliveries: the event
//! header is read from HTTP headers, the in-flight or stored subscription
//! context is recovered, the delivery signature is verified against the
//! subscription's signing secret, and the event is dispatched. Each
//! request is handled on its own task; the only shared state is the
//! correlation cache and the store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use cb_events::header::{
    CONTENT_TYPE_HEADER, CORRELATION_ID_HEADER, EVENT_SIGNATURE_HEADER, EVENT_TIMESTAMP_HEADER,
    EVENT_TYPE_HEADER, SEQUENCE_NUMBER_HEADER, SUBSCRIPTION_ID_HEADER,
};
use cb_events::{signature, EventHeader, EventType};
use cb_store::{AccountStore, SubscriptionStore};
use tracing::{debug, error, warn};

use crate::cache::SubscriptionData;
use crate::dispatcher::EventDispatcher;
use crate::error::ConnectorError;
use crate::projection::DeviceProjection;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EventDispatcher>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub projection: Arc<dyn DeviceProjection>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/events", post(receive_event))
        .route(
            "/accounts/:account_id/devices/:device_id/subscriptions",
            post(subscribe_device),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn parse_event_header(headers: &HeaderMap) -> Result<EventHeader, Response> {
    let raw_type = header_str(headers, EVENT_TYPE_HEADER);
    let event_type: EventType = raw_type.parse().map_err(|_| {
        warn!(event_type = raw_type, "unsupported event type");
        (
            StatusCode::BAD_REQUEST,
            format!("unsupported event type: {raw_type}"),
        )
            .into_response()
    })?;

    let sequence_number = header_str(headers, SEQUENCE_NUMBER_HEADER)
        .parse()
        .unwrap_or(0);

    Ok(EventHeader {
        event_type,
        sequence_number,
        correlation_id: header_str(headers, CORRELATION_ID_HEADER).to_string(),
        subscription_id: header_str(headers, SUBSCRIPTION_ID_HEADER).to_string(),
        content_type: header_str(headers, CONTENT_TYPE_HEADER).to_string(),
    })
}

/// Recover the subscription context: the correlation cache first (the
/// event may be the confirmation of a pending subscribe), then the store
/// by external subscription id.
async fn recover_context(
    state: &AppState,
    header: &EventHeader,
) -> Result<SubscriptionData, Response> {
    if !header.correlation_id.is_empty() {
        if let Some(mut data) = state
            .dispatcher
            .manager()
            .take_pending(&header.correlation_id)
        {
            if !data.subscription.is_confirmed() && !header.subscription_id.is_empty() {
                // First delivery confirms the pending subscription.
                data.subscription.subscription_id = header.subscription_id.clone();
                data.subscription = state
                    .subscriptions
                    .find_or_create_subscription(data.subscription)
                    .await
                    .map_err(|err| {
                        error!(error = %err, "cannot persist confirmed subscription");
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    })?;
            }
            return Ok(data);
        }
    }

    let sub = state
        .subscriptions
        .find_by_external_id(&header.subscription_id)
        .await
        .map_err(|err| {
            error!(error = %err, "subscription lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?
        .ok_or_else(|| {
            warn!(
                subscription_id = %header.subscription_id,
                correlation_id = %header.correlation_id,
                "event for unknown subscription"
            );
            (StatusCode::NOT_FOUND, "unknown subscription").into_response()
        })?;

    let account = state
        .accounts
        .find_linked_account(&sub.linked_account_id)
        .await
        .map_err(|err| {
            error!(error = %err, "account lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?
        .ok_or_else(|| {
            warn!(
                linked_account_id = %sub.linked_account_id,
                "subscription without linked account"
            );
            (StatusCode::NOT_FOUND, "unknown linked account").into_response()
        })?;

    Ok(SubscriptionData {
        linked_account: account,
        subscription: sub,
    })
}

fn verify_signature(
    headers: &HeaderMap,
    body: &[u8],
    signing_secret: &str,
) -> Result<(), Response> {
    let received = header_str(headers, EVENT_SIGNATURE_HEADER);
    let timestamp = header_str(headers, EVENT_TIMESTAMP_HEADER);
    if received.is_empty() {
        return Err((StatusCode::UNAUTHORIZED, "missing event signature").into_response());
    }
    if !signature::verify(signing_secret, timestamp, body, received) {
        return Err((StatusCode::UNAUTHORIZED, "invalid event signature").into_response());
    }
    Ok(())
}

fn error_status(err: &ConnectorError) -> StatusCode {
    match err {
        ConnectorError::Decode(_) | ConnectorError::UnsupportedEventType(_) => {
            StatusCode::BAD_REQUEST
        }
        ConnectorError::IdentityResolution(_) => StatusCode::UNAUTHORIZED,
        ConnectorError::CacheCollision(_) => StatusCode::CONFLICT,
        ConnectorError::ExternalApi(_) | ConnectorError::Aggregate(_) => StatusCode::BAD_GATEWAY,
        ConnectorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = match parse_event_header(&headers) {
        Ok(header) => header,
        Err(response) => return response,
    };

    let data = match recover_context(&state, &header).await {
        Ok(data) => data,
        Err(response) => return response,
    };

    if let Err(response) = verify_signature(&headers, &body, &data.subscription.signing_secret) {
        return response;
    }

    match state.dispatcher.dispatch(data, &header, &body).await {
        Ok(()) => {
            debug!(event_type = %header.event_type, "event handled");
            StatusCode::OK.into_response()
        }
        Err(err) => {
            error!(
                event_type = %header.event_type,
                subscription_id = %header.subscription_id,
                error = %err,
                "event handling failed"
            );
            (error_status(&err), err.to_string()).into_response()
        }
    }
}

/// Establish the device-level event feed for a linked account's device
/// and register the device with the projection.
async fn subscribe_device(
    State(state): State<AppState>,
    Path((account_id, device_id)): Path<(String, String)>,
) -> Response {
    let account = match state.accounts.find_linked_account(&account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown linked account").into_response(),
        Err(err) => {
            error!(error = %err, "account lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let sub = match state
        .dispatcher
        .manager()
        .register_device_feed(&account, &device_id)
        .await
    {
        Ok(sub) => sub,
        Err(err) => {
            error!(device_id = %device_id, error = %err, "cannot register device feed");
            return (error_status(&err), err.to_string()).into_response();
        }
    };

    if let Err(err) = state.projection.register(&device_id).await {
        // The feed is established; projection warm-up catches up at the
        // next bootstrap.
        warn!(device_id = %device_id, error = %err, "cannot register device with projection");
    }

    (StatusCode::CREATED, Json(serde_json::json!({
        "id": sub.id,
        "deviceId": sub.device_id,
        "subscriptionId": sub.subscription_id,
    })))
        .into_response()
}
