//! Webhook intake tests, driven through the axum router.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cb_common::TaskPool;
use cb_connector::api::{self, AppState};
use cb_connector::cache::CorrelationCache;
use cb_connector::{
    CloudClient, DeviceRegistry, EventDispatcher, SubscriptionData, SubscriptionManager,
};
use cb_events::header::{
    CORRELATION_ID_HEADER, EVENT_SIGNATURE_HEADER, EVENT_TIMESTAMP_HEADER, EVENT_TYPE_HEADER,
    SEQUENCE_NUMBER_HEADER, SUBSCRIPTION_ID_HEADER,
};
use cb_events::signature;
use cb_store::Subscription;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{account_with_subject, MemoryStore, RecordingRegistry};

struct Harness {
    state: AppState,
    registry: Arc<RecordingRegistry>,
    store: Arc<MemoryStore>,
    projection: Arc<DeviceRegistry>,
}

fn harness(store: Arc<MemoryStore>) -> Harness {
    let registry = RecordingRegistry::new();
    let manager = Arc::new(SubscriptionManager::new(
        CloudClient::new("https://connector.example.com/events", Duration::from_secs(5)),
        registry.clone(),
        store.clone(),
        CorrelationCache::default(),
    ));
    let projection = DeviceRegistry::new(TaskPool::new(2));
    let state = AppState {
        dispatcher: Arc::new(EventDispatcher::new(manager)),
        subscriptions: store.clone(),
        accounts: store.clone(),
        projection: projection.clone(),
    };
    Harness {
        state,
        registry,
        store,
        projection,
    }
}

fn event_request(
    event_type: &str,
    subscription_id: &str,
    correlation_id: &str,
    content_type: &str,
    signing_secret: Option<&str>,
    body: &[u8],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/events")
        .header(EVENT_TYPE_HEADER, event_type)
        .header(SEQUENCE_NUMBER_HEADER, "4")
        .header(SUBSCRIPTION_ID_HEADER, subscription_id)
        .header("Content-Type", content_type);
    if !correlation_id.is_empty() {
        builder = builder.header(CORRELATION_ID_HEADER, correlation_id);
    }
    if let Some(secret) = signing_secret {
        let (sig, timestamp) = signature::sign_now(secret, body);
        builder = builder
            .header(EVENT_SIGNATURE_HEADER, sig)
            .header(EVENT_TIMESTAMP_HEADER, timestamp);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let h = harness(MemoryStore::new());
    let response = api::router(h.state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_event_type_is_rejected_without_downstream_calls() {
    let h = harness(MemoryStore::new());
    let response = api::router(h.state)
        .oneshot(event_request(
            "UnknownType",
            "ext-1",
            "",
            "application/json",
            None,
            b"{}",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.registry.published.lock().is_empty());
    assert!(h.registry.notified.lock().is_empty());
}

#[tokio::test]
async fn signed_content_changed_event_reaches_registry() {
    let account = account_with_subject("https://partner.example.com", "user-1");
    let mut sub = Subscription::resource(&account.id, "dev-1", "/light/1", "res-secret");
    sub.subscription_id = "ext-1".to_string();
    let store = MemoryStore::new()
        .with_subscription(sub)
        .with_account(account);
    let h = harness(store);

    let body = br#"{"state":true}"#;
    let response = api::router(h.state)
        .oneshot(event_request(
            "resource_contentchanged",
            "ext-1",
            "",
            "application/json",
            Some("res-secret"),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let notified = h.registry.notified.lock();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].content.data, body.to_vec());
    assert_eq!(notified[0].command_metadata.sequence, 4);
}

#[tokio::test]
async fn tampered_signature_is_unauthorized() {
    let account = account_with_subject("https://partner.example.com", "user-1");
    let mut sub = Subscription::resource(&account.id, "dev-1", "/light/1", "res-secret");
    sub.subscription_id = "ext-1".to_string();
    let store = MemoryStore::new()
        .with_subscription(sub)
        .with_account(account);
    let h = harness(store);

    let response = api::router(h.state)
        .oneshot(event_request(
            "resource_contentchanged",
            "ext-1",
            "",
            "application/json",
            Some("wrong-secret"),
            b"{}",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.registry.notified.lock().is_empty());
}

#[tokio::test]
async fn event_for_unknown_subscription_is_not_found() {
    let h = harness(MemoryStore::new());
    let response = api::router(h.state)
        .oneshot(event_request(
            "resource_contentchanged",
            "ghost",
            "",
            "application/json",
            None,
            b"{}",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn correlated_event_confirms_pending_subscription() {
    let account = account_with_subject("https://partner.example.com", "user-1");
    let store = MemoryStore::new();
    let h = harness(store.clone());

    let pending = Subscription::device(&account.id, "dev-1", "dev-secret");
    h.state
        .dispatcher
        .manager()
        .correlation_cache()
        .add(
            "corr-1",
            SubscriptionData {
                linked_account: account,
                subscription: pending,
            },
        )
        .unwrap();

    // Empty published batch: the delivery only confirms the subscribe.
    let response = api::router(h.state.clone())
        .oneshot(event_request(
            "resources_published",
            "device-sub-7",
            "corr-1",
            "application/json",
            Some("dev-secret"),
            b"[]",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let confirmed = store.confirmed();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].subscription_id, "device-sub-7");
    assert!(h
        .state
        .dispatcher
        .manager()
        .correlation_cache()
        .is_empty());
}

#[tokio::test]
async fn subscribe_device_route_establishes_feed_and_registers_projection() {
    let cloud = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/dev-9/subscriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "subscriptionId": "dev-sub-9" })),
        )
        .expect(1)
        .mount(&cloud)
        .await;

    let account = account_with_subject(&cloud.uri(), "user-1");
    let account_id = account.id.clone();
    let h = harness(MemoryStore::new().with_account(account));

    let uri = format!("/accounts/{account_id}/devices/dev-9/subscriptions");
    let response = api::router(h.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let confirmed = h.store.confirmed();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].subscription_id, "dev-sub-9");
    assert!(h.projection.contains("dev-9"));
}
