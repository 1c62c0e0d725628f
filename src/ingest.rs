//! # Reading Ingestion
//!
//! Entry point for readings relayed from the trackers. A reading is
//! validated, then appended to the outbox under its tracker's device id;
//! the stored payload is the complete reading document.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{BrickError, Result};
use crate::geofence::Position;
use crate::outbox::Outbox;

/// Timestamp layout used by the trackers and the relay
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One tracker reading
///
/// Environment values (temperature, pressure, altitude, ...) travel in
/// `readings` and are flattened into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: String,
    pub dev_id: String,
    pub position_lat: f64,
    pub position_long: f64,
    #[serde(flatten)]
    pub readings: Map<String, Value>,
}

impl Reading {
    /// New reading stamped with the local time
    pub fn new(dev_id: impl Into<String>, position: Position) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            dev_id: dev_id.into(),
            position_lat: position.latitude,
            position_long: position.longitude,
            readings: Map::new(),
        }
    }

    /// Attach an environment value
    pub fn with_reading(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.readings.insert(key.to_string(), value.into());
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.position_lat, self.position_long)
    }

    /// Parse a reading document as produced by the relay
    pub fn from_json(document: &Value) -> Result<Self> {
        Ok(Self::deserialize(document)?)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.dev_id.trim().is_empty() {
            return Err(BrickError::InvalidReading("empty dev_id".to_string()));
        }
        if !self.position().is_valid() {
            return Err(BrickError::InvalidReading(format!(
                "position ({}, {}) out of range",
                self.position_lat, self.position_long
            )));
        }
        Ok(())
    }
}

/// Appends readings to the outbox
pub struct Ingestor {
    outbox: Arc<dyn Outbox>,
}

impl Ingestor {
    pub fn new(outbox: Arc<dyn Outbox>) -> Self {
        Self { outbox }
    }

    /// Validate and enqueue a reading; returns the outbox id
    pub fn ingest(&self, reading: &Reading) -> Result<u64> {
        if let Err(e) = reading.validate() {
            warn!(device = %reading.dev_id, "Dropping reading: {}", e);
            return Err(e);
        }
        let payload = reading.to_json()?;
        let id = self.outbox.enqueue(&reading.dev_id, &payload)?;
        debug!(record_id = id, device = %reading.dev_id, "Reading queued");
        Ok(id)
    }

    /// Parse a raw reading document and enqueue it
    pub fn ingest_json(&self, document: &Value) -> Result<u64> {
        let reading = Reading::from_json(document)?;
        self.ingest(&reading)
    }
}
