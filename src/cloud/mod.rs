//! # Cloud Collaborators
//!
//! Pieces that act on uploaded readings once they have left the brick:
//!
//! - `twin`: per-device reported state and the per-device locks guarding it
//! - `notify`: message transport used for arrival and status announcements
//! - `status`: liveness state changes from the cloud detector

pub mod notify;
pub mod status;
pub mod twin;

pub use notify::{dispatch, LogNotifier, NotificationBody, Notifier};
pub use status::{StatusHandler, TrackerStatus};
pub use twin::{DeviceLocks, DeviceTwinStore, InMemoryTwinStore};

use std::future::Future;
use std::time::Duration;

use crate::error::{BrickError, Result};

/// Limit applied to each twin read, twin write and notification
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Await a collaborator call for at most `limit`
///
/// Expiry drops the call and reports `BrickError::Timeout(limit)`.
pub async fn within<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(BrickError::Timeout(limit)))
}
