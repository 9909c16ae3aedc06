//! Device projection: the warm set of devices whose state the connector
//! materializes from the event log, plus the startup re-registration that
//! restores it after a restart without replaying the full log.

use std::sync::Arc;

use async_trait::async_trait;
use cb_common::TaskPool;
use cb_store::{SubscriptionQuery, SubscriptionStore, SubscriptionType};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;

/// Per-device materialized view.
///
/// `register` must be idempotent: registering the same device id twice
/// must not duplicate projection state or double-count event replay.
#[async_trait]
pub trait DeviceProjection: Send + Sync {
    /// Start (or keep) tracking a device. Returns `true` when the device
    /// was newly registered.
    async fn register(&self, device_id: &str) -> Result<bool>;
}

/// One event-log callback applied to the projection.
#[derive(Debug, Clone)]
pub struct ProjectionUpdate {
    pub device_id: String,
    pub sequence: u64,
}

struct DeviceState {
    last_sequence: u64,
}

/// In-process [`DeviceProjection`] holding the warm device set.
///
/// Event-log callbacks are drained through the bounded task pool so
/// ingestion rate stays decoupled from processing rate.
pub struct DeviceRegistry {
    devices: DashMap<String, DeviceState>,
    pool: TaskPool,
}

impl DeviceRegistry {
    pub fn new(pool: TaskPool) -> Arc<Self> {
        Arc::new(Self {
            devices: DashMap::new(),
            pool,
        })
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Last event-log sequence applied for `device_id`, if tracked.
    pub fn last_sequence(&self, device_id: &str) -> Option<u64> {
        self.devices.get(device_id).map(|state| state.last_sequence)
    }

    fn apply(&self, update: ProjectionUpdate) {
        if let Some(mut state) = self.devices.get_mut(&update.device_id) {
            if update.sequence > state.last_sequence {
                state.last_sequence = update.sequence;
            }
        }
        // Updates for unregistered devices are dropped: the projection
        // only materializes devices it was told to track.
    }

    /// Consume event-log callbacks until the channel closes.
    pub fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ProjectionUpdate>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let registry = Arc::clone(&self);
                self.pool
                    .spawn(async move {
                        registry.apply(update);
                    })
                    .await;
            }
            debug!("projection update channel closed");
        })
    }
}

#[async_trait]
impl DeviceProjection for DeviceRegistry {
    async fn register(&self, device_id: &str) -> Result<bool> {
        let mut newly_registered = false;
        self.devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                newly_registered = true;
                DeviceState { last_sequence: 0 }
            });
        if newly_registered {
            debug!(device_id = %device_id, "device registered with projection");
        }
        Ok(newly_registered)
    }
}

/// Re-register every durably known device with the projection.
///
/// Per-device registration failures are logged and skipped; a failing
/// subscription cursor aborts the bootstrap and is fatal to startup.
pub async fn register_stored_devices(
    store: &dyn SubscriptionStore,
    projection: &dyn DeviceProjection,
) -> Result<usize> {
    let mut subscriptions = store
        .load_subscriptions(SubscriptionQuery::new().with_type(SubscriptionType::Device))
        .await?;

    let mut registered = 0usize;
    while let Some(item) = subscriptions.next().await {
        let sub = item?;
        match projection.register(&sub.device_id).await {
            Ok(true) => registered += 1,
            Ok(false) => {}
            Err(err) => {
                error!(
                    device_id = %sub.device_id,
                    error = %err,
                    "cannot register device with projection"
                );
            }
        }
    }

    info!(registered = registered, "device projection warmed from store");
    Ok(registered)
}
