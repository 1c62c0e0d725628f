//! # Geofence Types
//!
//! Reference geo-points and the per-device state the engine keeps in the
//! device twin.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::distance::Position;
use crate::error::Result;

/// Text and links sent when a tracker reaches a geo-point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationTemplate {
    pub message: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A named circular zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub approach_distance_km: f64,
    #[serde(default)]
    pub notification: NotificationTemplate,
}

impl GeoPoint {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    /// Distance from `position` when it lies strictly inside the zone
    pub fn contains(&self, position: &Position) -> Option<f64> {
        let distance = self.position().distance_km(position);
        (distance < self.approach_distance_km).then_some(distance)
    }
}

/// Geofence view of a device's reported state
///
/// Field names follow the keys trackers report (`total_distance` in km,
/// `total_climb` in m, `total_time` in s). Keys the engine does not know
/// about are kept in `extra` so writing the state back never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub current_location: String,
    #[serde(default, deserialize_with = "strings_or_empty")]
    pub previous_locations: Vec<String>,
    /// Announced zones, other than the current one, that contained the
    /// last reading
    #[serde(
        default,
        deserialize_with = "strings_or_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub occupied_locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_long: Option<f64>,
    #[serde(rename = "total_distance", default)]
    pub total_distance_km: f64,
    #[serde(rename = "total_climb", default)]
    pub total_climb_m: f64,
    #[serde(rename = "total_time", default)]
    pub total_time_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceState {
    /// Parse the reported section of a twin document
    pub fn from_reported(reported: &Value) -> Result<Self> {
        if reported.is_null() {
            return Ok(Self::default());
        }
        Ok(Self::deserialize(reported)?)
    }

    pub fn to_reported(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Mark `name` as the current zone and remember it as visited
    ///
    /// Returns whether anything changed.
    pub fn record_visit(&mut self, name: &str) -> bool {
        let mut changed = false;
        if self.current_location != name {
            self.current_location = name.to_string();
            changed = true;
        }
        if !self.previous_locations.iter().any(|visited| visited == name) {
            self.previous_locations.push(name.to_string());
            changed = true;
        }
        changed
    }

    /// Whether `name` is the current zone or another zone still occupied
    pub fn is_occupied(&self, name: &str) -> bool {
        self.current_location == name || self.occupied_locations.iter().any(|zone| zone == name)
    }

    pub fn has_visited(&self, name: &str) -> bool {
        self.previous_locations.iter().any(|visited| visited == name)
    }

    pub fn last_position(&self) -> Option<Position> {
        Some(Position::new(self.position_lat?, self.position_long?))
    }

    pub fn set_last_position(&mut self, position: Position) {
        self.position_lat = Some(position.latitude);
        self.position_long = Some(position.longitude);
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn strings_or_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
