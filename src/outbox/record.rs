//! Outbox record type

use serde_json::Value;

/// One queued reading
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    /// Assigned by the store, strictly increasing in insertion order
    pub id: u64,
    /// Tracker the reading came from
    pub origin_device: String,
    /// Reading document, uploaded as-is
    pub payload: Value,
    /// Set once the remote endpoint has accepted the payload
    pub processed: bool,
}
