//! Shared building blocks for the CloudBridge connector:
//! logging setup, multi-error aggregation, the expiring correlation map,
//! and the bounded background task pool.

pub mod expiring;
pub mod logging;
pub mod multi_error;
pub mod pool;

pub use expiring::{ExpiringMap, KeyExists};
pub use multi_error::MultiError;
pub use pool::TaskPool;
