//! # Geofence Engine
//!
//! Decides, per incoming reading, whether a tracker has entered a known
//! zone, announces each entry and records it in the device twin.
//!
//! Zone membership is compared against the state read at the start of the
//! pass. A zone is entered when the reading lies inside it and it is
//! neither `current_location` nor one of the `occupied_locations` left
//! over from an earlier overlapping entry. Staying inside any announced
//! zone produces no notification. Leaving every zone never clears
//! `current_location`; it only moves on to the next zone entered.

use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::distance::Position;
use super::types::{DeviceState, GeoPoint};
use crate::cloud::notify::{dispatch, hours_minutes, NotificationBody, Notifier};
use crate::cloud::twin::{DeviceLocks, DeviceTwinStore};
use crate::cloud::within;
use crate::config::invalid;
use crate::error::Result;
use crate::ingest::Reading;

/// Registry of known geo-points
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoPointSource: Send + Sync {
    async fn geo_points(&self) -> Result<Vec<GeoPoint>>;
}

/// Geo-points fixed at startup
#[derive(Debug, Clone, Default)]
pub struct StaticGeoPoints {
    points: Vec<GeoPoint>,
}

#[derive(Deserialize)]
struct GeoPointFile {
    #[serde(default)]
    points: Vec<GeoPoint>,
}

impl StaticGeoPoints {
    /// Names must be unique and non-empty, radii positive
    pub fn new(points: Vec<GeoPoint>) -> Result<Self> {
        let mut names: HashSet<&str> = HashSet::new();
        for point in points.iter() {
            if point.name.trim().is_empty() {
                return Err(invalid("geo-point name cannot be empty"));
            }
            if !names.insert(point.name.as_str()) {
                return Err(invalid(format!("duplicate geo-point '{}'", point.name)));
            }
            if !point.position().is_valid() {
                return Err(invalid(format!("geo-point '{}' has invalid coordinates", point.name)));
            }
            if !(point.approach_distance_km.is_finite() && point.approach_distance_km > 0.0) {
                return Err(invalid(format!(
                    "geo-point '{}' approach_distance_km must be positive",
                    point.name
                )));
            }
        }
        Ok(Self { points })
    }

    /// Parse a `[[points]]` TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: GeoPointFile = toml::from_str(contents)?;
        Self::new(file.points)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }
}

#[async_trait]
impl GeoPointSource for StaticGeoPoints {
    async fn geo_points(&self) -> Result<Vec<GeoPoint>> {
        Ok(self.points.clone())
    }
}

/// A zone the device has just entered
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEntry {
    pub point: GeoPoint,
    pub distance_km: f64,
}

/// Zones a reading falls in, split by whether they are new to the device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Zones entered by this reading, nearest first
    pub entries: Vec<ZoneEntry>,
    /// Every zone containing the reading, by name
    pub inside: Vec<String>,
}

/// Classify a reading at `position` against `points`
///
/// Ties are broken by name so the result does not depend on the order of
/// `points`.
pub fn evaluate(points: &[GeoPoint], state: &DeviceState, position: &Position) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for point in points {
        let Some(distance_km) = point.contains(position) else {
            continue;
        };
        evaluation.inside.push(point.name.clone());
        if !state.is_occupied(&point.name) {
            evaluation.entries.push(ZoneEntry {
                point: point.clone(),
                distance_km,
            });
        }
    }
    evaluation.inside.sort();
    evaluation.entries.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.point.name.cmp(&b.point.name))
    });
    evaluation
}

/// Fold an evaluation into `state`
///
/// The nearest entered zone becomes current and every other zone holding
/// the reading is kept as occupied. Returns whether the state changed.
pub fn apply_evaluation(state: &mut DeviceState, evaluation: &Evaluation, position: Position) -> bool {
    for entry in evaluation.entries.iter().rev() {
        state.record_visit(&entry.point.name);
    }
    if !evaluation.entries.is_empty() {
        state.set_last_position(position);
    }

    let occupied: Vec<String> = evaluation
        .inside
        .iter()
        .filter(|name| **name != state.current_location)
        .cloned()
        .collect();
    let occupancy_changed = occupied != state.occupied_locations;
    state.occupied_locations = occupied;

    !evaluation.entries.is_empty() || occupancy_changed
}

/// Arrival message for `point`
pub fn arrival_notification(
    point: &GeoPoint,
    device_id: &str,
    timestamp: &str,
    state: &DeviceState,
) -> (String, NotificationBody) {
    let template = &point.notification;
    let mut lines = vec![
        format!("{} ({})", timestamp, device_id),
        format!(
            "Distance: {} km, Time: {}",
            state.total_distance_km,
            hours_minutes(state.total_time_s.max(0.0) as u64)
        ),
    ];
    if !template.description.is_empty() {
        lines.push(template.description.clone());
    }
    let body = NotificationBody {
        headline: template.message.clone(),
        lines,
        image_url: template.image_url.clone(),
        link: template.url.clone(),
    };
    (format!("Reached: {}!", point.name), body)
}

/// Result of one geofence pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceOutcome {
    /// Zones entered, nearest first
    pub entered: Vec<String>,
    /// Notifications the transport accepted
    pub notified: usize,
    pub state_written: bool,
}

pub struct GeofenceEngine {
    points: Arc<dyn GeoPointSource>,
    twin: Arc<dyn DeviceTwinStore>,
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
    locks: Arc<DeviceLocks>,
    timeout: Duration,
}

impl GeofenceEngine {
    /// `timeout` bounds every call to the point source, the twin and the
    /// notifier, so a silent collaborator cannot hold a device lock.
    pub fn new(
        points: Arc<dyn GeoPointSource>,
        twin: Arc<dyn DeviceTwinStore>,
        notifier: Arc<dyn Notifier>,
        recipients: Vec<String>,
        locks: Arc<DeviceLocks>,
        timeout: Duration,
    ) -> Self {
        Self {
            points,
            twin,
            notifier,
            recipients,
            locks,
            timeout,
        }
    }

    /// Evaluate a new position for `device_id`
    pub async fn on_reading(&self, device_id: &str, position: Position) -> Result<GeofenceOutcome> {
        self.process(device_id, position, None).await
    }

    /// Evaluate a relayed reading, stamping notifications with its timestamp
    pub async fn handle_reading(&self, reading: &Reading) -> Result<GeofenceOutcome> {
        self.process(&reading.dev_id, reading.position(), Some(&reading.timestamp))
            .await
    }

    async fn process(
        &self,
        device_id: &str,
        position: Position,
        timestamp: Option<&str>,
    ) -> Result<GeofenceOutcome> {
        let points = within(self.timeout, self.points.geo_points()).await?;

        // Held until the state is written so notifications stay deduplicated
        let _guard = self.locks.acquire(device_id).await;
        let reported = within(self.timeout, self.twin.get(device_id)).await?;
        let state = DeviceState::from_reported(&reported)?;

        let evaluation = evaluate(&points, &state, &position);
        let mut next = state.clone();
        if !apply_evaluation(&mut next, &evaluation, position) {
            debug!(device = device_id, location = %state.current_location, "No zone change");
            return Ok(GeofenceOutcome::default());
        }

        let stamp = timestamp
            .map(str::to_string)
            .or_else(|| state.timestamp.clone())
            .unwrap_or_default();

        let mut outcome = GeofenceOutcome::default();
        for entry in &evaluation.entries {
            info!(
                device = device_id,
                zone = %entry.point.name,
                distance_km = entry.distance_km,
                "Zone entered"
            );
            let (subject, body) = arrival_notification(&entry.point, device_id, &stamp, &state);
            if dispatch(self.notifier.as_ref(), &self.recipients, &subject, &body, self.timeout).await {
                outcome.notified += 1;
            }
            outcome.entered.push(entry.point.name.clone());
        }
        if evaluation.entries.is_empty() {
            debug!(device = device_id, occupied = ?next.occupied_locations, "Occupied zones changed");
        }

        within(self.timeout, self.twin.put(device_id, next.to_reported()?)).await?;
        outcome.state_written = true;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::notify::{HangingNotifier, MockNotifier};
    use crate::cloud::twin::{HangingTwinStore, InMemoryTwinStore, MockDeviceTwinStore};
    use crate::error::BrickError;
    use crate::geofence::types::NotificationTemplate;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DEVICE: &str = "riot-tracker-1";
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn point(name: &str, latitude: f64, longitude: f64, radius_km: f64) -> GeoPoint {
        GeoPoint {
            name: name.to_string(),
            latitude,
            longitude,
            approach_distance_km: radius_km,
            notification: NotificationTemplate {
                message: format!("Welcome to {}", name),
                description: format!("{} description", name),
                image_url: None,
                url: Some(format!("https://example.com/{}", name.to_lowercase())),
            },
        }
    }

    /// Two zones about 11 km apart
    fn zones() -> Vec<GeoPoint> {
        vec![point("A", 56.0, -5.0, 0.5), point("B", 56.1, -5.0, 0.5)]
    }

    fn engine(
        points: Vec<GeoPoint>,
        twin: Arc<dyn DeviceTwinStore>,
        notifier: MockNotifier,
    ) -> GeofenceEngine {
        engine_with(points, twin, Arc::new(notifier))
    }

    fn engine_with(
        points: Vec<GeoPoint>,
        twin: Arc<dyn DeviceTwinStore>,
        notifier: Arc<dyn Notifier>,
    ) -> GeofenceEngine {
        GeofenceEngine::new(
            Arc::new(StaticGeoPoints::new(points).unwrap()),
            twin,
            notifier,
            vec!["walkers@example.com".to_string()],
            Arc::new(DeviceLocks::new()),
            TIMEOUT,
        )
    }

    /// Car park with the visitor centre about 110 m from its middle
    fn nested_zones() -> Vec<GeoPoint> {
        vec![
            point("Car park", 56.0, -5.0, 2.0),
            point("Visitor centre", 56.001, -5.0, 0.5),
        ]
    }

    /// Notifier that accepts everything and remembers subjects
    fn recording_notifier(subjects: Arc<Mutex<Vec<String>>>) -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(move |_, subject, _| {
            subjects.lock().unwrap().push(subject.to_string());
            Ok(())
        });
        notifier
    }

    #[tokio::test]
    async fn test_dedup_inside_current_zone() {
        let mut twin = MockDeviceTwinStore::new();
        twin.expect_get().returning(|_| {
            Ok(json!({ "current_location": "A", "previous_locations": ["A"] }))
        });
        twin.expect_put().times(0);
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let engine = engine(zones(), Arc::new(twin), notifier);
        let outcome = engine.on_reading(DEVICE, Position::new(56.001, -5.0)).await.unwrap();

        assert_eq!(outcome, GeofenceOutcome::default());
    }

    #[tokio::test]
    async fn test_transition_into_base() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, subject, _| subject == "Reached: Base!")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let base = point("Base", 56.7969, -5.0036, 0.5);
        let engine = engine(vec![base], twin.clone(), notifier);

        // about 5.5 m north of Base
        let outcome = engine.on_reading(DEVICE, Position::new(56.79695, -5.0036)).await.unwrap();
        assert_eq!(outcome.entered, vec!["Base".to_string()]);
        assert_eq!(outcome.notified, 1);
        assert!(outcome.state_written);

        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "Base");
        assert_eq!(state.previous_locations, vec!["Base".to_string()]);
        assert_eq!(state.last_position(), Some(Position::new(56.79695, -5.0036)));
    }

    #[tokio::test]
    async fn test_reentry_fires_again_without_duplicate_history() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(zones(), twin.clone(), recording_notifier(subjects.clone()));

        let in_a = Position::new(56.0, -5.0);
        let in_b = Position::new(56.1, -5.0);
        let between = Position::new(56.05, -5.0);

        engine.on_reading(DEVICE, in_a).await.unwrap();
        engine.on_reading(DEVICE, in_a).await.unwrap();
        engine.on_reading(DEVICE, between).await.unwrap();
        engine.on_reading(DEVICE, in_b).await.unwrap();
        engine.on_reading(DEVICE, in_a).await.unwrap();

        assert_eq!(
            *subjects.lock().unwrap(),
            vec!["Reached: A!", "Reached: B!", "Reached: A!"]
        );
        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "A");
        assert_eq!(state.previous_locations, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_leaving_all_zones_keeps_current_location() {
        let mut twin = MockDeviceTwinStore::new();
        twin.expect_get()
            .returning(|_| Ok(json!({ "current_location": "A", "previous_locations": ["A"] })));
        twin.expect_put().times(0);
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let engine = engine(zones(), Arc::new(twin), notifier);
        let outcome = engine.on_reading(DEVICE, Position::new(57.0, -5.0)).await.unwrap();
        assert!(!outcome.state_written);
    }

    #[tokio::test]
    async fn test_overlapping_zones_each_notify() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(nested_zones(), twin.clone(), recording_notifier(subjects.clone()));

        let outcome = engine.on_reading(DEVICE, Position::new(56.001, -5.0)).await.unwrap();
        assert_eq!(outcome.notified, 2);
        assert_eq!(
            outcome.entered,
            vec!["Visitor centre".to_string(), "Car park".to_string()]
        );

        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "Visitor centre");
        assert_eq!(state.occupied_locations, vec!["Car park".to_string()]);
        assert!(state.has_visited("Car park"));
        assert!(state.has_visited("Visitor centre"));
    }

    #[tokio::test]
    async fn test_stationary_in_overlapping_zones_notifies_once_each() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(nested_zones(), twin.clone(), recording_notifier(subjects.clone()));

        let here = Position::new(56.001, -5.0);
        let mut written = 0;
        for _ in 0..4 {
            if engine.on_reading(DEVICE, here).await.unwrap().state_written {
                written += 1;
            }
        }

        assert_eq!(
            *subjects.lock().unwrap(),
            vec!["Reached: Visitor centre!", "Reached: Car park!"]
        );
        assert_eq!(written, 1);
        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "Visitor centre");
    }

    #[tokio::test]
    async fn test_leaving_an_occupied_zone_allows_reentry() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(nested_zones(), twin.clone(), recording_notifier(subjects.clone()));

        let centre = Position::new(56.001, -5.0);
        engine.on_reading(DEVICE, centre).await.unwrap();

        // outside both zones: the car park is no longer occupied
        let away = engine.on_reading(DEVICE, Position::new(57.0, -5.0)).await.unwrap();
        assert!(away.entered.is_empty());
        assert!(away.state_written);
        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "Visitor centre");
        assert!(state.occupied_locations.is_empty());

        let back = engine.on_reading(DEVICE, centre).await.unwrap();
        assert_eq!(back.entered, vec!["Car park".to_string()]);
        assert_eq!(
            *subjects.lock().unwrap(),
            vec!["Reached: Visitor centre!", "Reached: Car park!", "Reached: Car park!"]
        );
    }

    #[test]
    fn test_evaluation_is_order_independent() {
        let mut points = vec![
            point("Cairn", 56.001, -5.0, 1.0),
            point("Bothy", 56.001, -5.0, 1.0),
            point("Far", 57.0, -5.0, 1.0),
        ];
        let position = Position::new(56.0, -5.0);

        let mut forward = DeviceState::default();
        let evaluation = evaluate(&points, &forward, &position);
        assert!(apply_evaluation(&mut forward, &evaluation, position));

        points.reverse();
        let mut backward = DeviceState::default();
        let evaluation = evaluate(&points, &backward, &position);
        assert!(apply_evaluation(&mut backward, &evaluation, position));

        assert_eq!(forward, backward);
        // same spot, so the name decides
        assert_eq!(forward.current_location, "Bothy");
        assert_eq!(forward.occupied_locations, vec!["Cairn".to_string()]);

        let again = evaluate(&points, &forward, &position);
        assert!(again.entries.is_empty());
        assert!(!apply_evaluation(&mut forward, &again, position));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readings_for_one_device_notify_once() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _, _| Ok(()));
        let engine = Arc::new(engine(zones(), twin.clone(), notifier));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await })
            })
            .collect();
        let mut written = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().state_written {
                written += 1;
            }
        }

        assert_eq!(written, 1);
        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.previous_locations, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_notification_content() {
        let twin = Arc::new(InMemoryTwinStore::new());
        twin.put(
            DEVICE,
            json!({ "total_distance": 12.5, "total_time": 7380, "temperature": 9.5 }),
        )
        .await
        .unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|to, subject, body| {
                to.len() == 1
                    && subject == "Reached: A!"
                    && body.headline == "Welcome to A"
                    && body.lines
                        == vec![
                            "2024-05-01 10:00:00 (riot-tracker-1)".to_string(),
                            "Distance: 12.5 km, Time: 02 hours 03 minutes".to_string(),
                            "A description".to_string(),
                        ]
                    && body.link.as_deref() == Some("https://example.com/a")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let engine = engine(zones(), twin.clone(), notifier);
        let reading = Reading {
            timestamp: "2024-05-01 10:00:00".to_string(),
            dev_id: DEVICE.to_string(),
            position_lat: 56.0,
            position_long: -5.0,
            readings: Default::default(),
        };
        engine.handle_reading(&reading).await.unwrap();

        // keys the engine does not own survive the write
        assert_eq!(twin.get(DEVICE).await.unwrap()["temperature"], json!(9.5));
    }

    #[tokio::test]
    async fn test_failed_notification_still_records_entry() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _| Err(BrickError::Notify("mailbox full".to_string())));

        let engine = engine(zones(), twin.clone(), notifier);
        let outcome = engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await.unwrap();
        assert_eq!(outcome.notified, 0);
        assert!(outcome.state_written);
    }

    #[tokio::test]
    async fn test_twin_read_failure_propagates() {
        let mut twin = MockDeviceTwinStore::new();
        twin.expect_get()
            .returning(|_| Err(BrickError::Twin("throttled".to_string())));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let engine = engine(zones(), Arc::new(twin), notifier);
        let result = engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await;
        assert!(matches!(result, Err(BrickError::Twin(_))));
    }

    #[tokio::test]
    async fn test_geo_point_source_failure_propagates() {
        let mut source = MockGeoPointSource::new();
        source
            .expect_geo_points()
            .returning(|| Err(BrickError::Twin("registry unavailable".to_string())));
        let mut twin = MockDeviceTwinStore::new();
        twin.expect_get().times(0);

        let engine = GeofenceEngine::new(
            Arc::new(source),
            Arc::new(twin),
            Arc::new(MockNotifier::new()),
            Vec::new(),
            Arc::new(DeviceLocks::new()),
            TIMEOUT,
        );
        assert!(engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_notifier_does_not_wedge_the_device() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let engine = engine_with(zones(), twin.clone(), Arc::new(HangingNotifier));

        let started = tokio::time::Instant::now();
        let outcome = engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await.unwrap();
        assert!(started.elapsed() >= TIMEOUT);
        assert_eq!(outcome.entered, vec!["A".to_string()]);
        assert_eq!(outcome.notified, 0);
        assert!(outcome.state_written);

        // the lock was released, so the next reading for the device goes through
        let next = engine.on_reading(DEVICE, Position::new(56.1, -5.0)).await.unwrap();
        assert_eq!(next.entered, vec!["B".to_string()]);
        let state = DeviceState::from_reported(&twin.get(DEVICE).await.unwrap()).unwrap();
        assert_eq!(state.current_location, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_twin_times_out() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let engine = engine(zones(), Arc::new(HangingTwinStore), notifier);

        let result = engine.on_reading(DEVICE, Position::new(56.0, -5.0)).await;
        assert!(matches!(result, Err(BrickError::Timeout(limit)) if limit == TIMEOUT));
    }

    #[test]
    fn test_static_points_validation() {
        assert!(StaticGeoPoints::new(zones()).is_ok());
        assert!(StaticGeoPoints::new(vec![point("A", 56.0, -5.0, 0.5), point("A", 57.0, -5.0, 0.5)]).is_err());
        assert!(StaticGeoPoints::new(vec![point("A", 56.0, -5.0, 0.0)]).is_err());
        assert!(StaticGeoPoints::new(vec![point("A", 95.0, -5.0, 0.5)]).is_err());
        assert!(StaticGeoPoints::new(vec![point(" ", 56.0, -5.0, 0.5)]).is_err());
    }

    #[test]
    fn test_shipped_points_file() {
        let points = StaticGeoPoints::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/geo-points.toml")).unwrap();
        assert_eq!(points.points().len(), 2);
    }

    #[test]
    fn test_load_points_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geo-points.toml");
        fs::write(
            &path,
            r#"
[[points]]
name = "Glen Nevis"
latitude = 56.7969
longitude = -5.0036
approach_distance_km = 0.5

[points.notification]
message = "Base camp reached"
"#,
        )
        .unwrap();

        let points = StaticGeoPoints::load(&path).unwrap();
        assert_eq!(points.points().len(), 1);
        assert_eq!(points.points()[0].notification.message, "Base camp reached");
    }
}
