//! # Geofence
//!
//! Zone-entry detection for tracker positions.
//!
//! - `distance`: haversine distance between GPS fixes
//! - `types`: geo-points and the per-device state kept in the twin
//! - `engine`: per-reading evaluation, notification and state update

pub mod distance;
pub mod engine;
pub mod types;

pub use distance::{haversine_km, Position, EARTH_RADIUS_KM};
pub use engine::{GeoPointSource, GeofenceEngine, GeofenceOutcome, StaticGeoPoints};
pub use types::{DeviceState, GeoPoint, NotificationTemplate};
