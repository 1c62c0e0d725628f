//! # Device Twin
//!
//! Remote per-device document holding the last reported state, plus the
//! per-device locking needed for read-modify-write updates.
//!
//! Documents use the shadow envelope `{"state": {"reported": {...}}}`;
//! store implementations exchange only the reported section.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::debug;

use super::within;
use crate::error::Result;

/// Key/value document store, one document per device
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTwinStore: Send + Sync {
    /// Reported section of the device's document (`{}` if it has none)
    async fn get(&self, device_id: &str) -> Result<Value>;

    /// Replace the reported section of the device's document
    async fn put(&self, device_id: &str, reported: Value) -> Result<()>;
}

/// Wrap a reported section in the shadow envelope
pub fn shadow_document(reported: Value) -> Value {
    json!({ "state": { "reported": reported } })
}

/// Reported section of a shadow document, or an empty object
pub fn reported_section(document: &Value) -> Value {
    document
        .pointer("/state/reported")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Merge `update`'s top-level keys into `reported`
///
/// Returns whether anything changed. Applying the same update twice is a
/// no-op the second time.
pub fn merge_reported(reported: &mut Value, update: &Value) -> bool {
    let Some(update) = update.as_object() else {
        return false;
    };
    if !reported.is_object() {
        *reported = Value::Object(Map::new());
    }
    let Some(target) = reported.as_object_mut() else {
        return false;
    };

    let mut changed = false;
    for (key, value) in update {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Read-modify-write a reading into a device's reported state
///
/// Skips the write when the merge changes nothing, so duplicate uploads
/// of the same reading leave the twin untouched. The read and the write
/// are each bounded by `timeout`.
pub async fn apply_reported_update(
    store: &dyn DeviceTwinStore,
    locks: &DeviceLocks,
    device_id: &str,
    update: &Value,
    timeout: Duration,
) -> Result<bool> {
    let _guard = locks.acquire(device_id).await;
    let mut reported = within(timeout, store.get(device_id)).await?;
    if !merge_reported(&mut reported, update) {
        debug!(device = device_id, "Reported state already up to date");
        return Ok(false);
    }
    within(timeout, store.put(device_id, reported)).await?;
    Ok(true)
}

/// One async mutex per device id
///
/// Holders of the guard for a device are the only writers of that
/// device's twin; different devices proceed in parallel.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries nobody holds or waits on are dropped on each call, so the
    /// map only tracks devices with work in flight.
    pub async fn acquire(&self, device_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Only the map references an idle entry; cloning requires this guard
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(device_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of devices currently tracked
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Twin store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryTwinStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl InMemoryTwinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full shadow document for a device, if one was written
    pub async fn document(&self, device_id: &str) -> Option<Value> {
        self.documents.read().await.get(device_id).cloned()
    }
}

#[async_trait]
impl DeviceTwinStore for InMemoryTwinStore {
    async fn get(&self, device_id: &str) -> Result<Value> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(device_id)
            .map(reported_section)
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    async fn put(&self, device_id: &str, reported: Value) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(device_id.to_string(), shadow_document(reported));
        Ok(())
    }
}

/// Store whose reads never answer
#[cfg(test)]
pub(crate) struct HangingTwinStore;

#[cfg(test)]
#[async_trait]
impl DeviceTwinStore for HangingTwinStore {
    async fn get(&self, _device_id: &str) -> Result<Value> {
        std::future::pending().await
    }

    async fn put(&self, _device_id: &str, _reported: Value) -> Result<()> {
        Ok(())
    }
}
