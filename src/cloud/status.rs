//! # Tracker Status
//!
//! Reacts to liveness state changes reported by the cloud detector
//! (`responding`, `not-responding`, `lost`): records the new status in the
//! device twin and tells the recipients.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::notify::{dispatch, NotificationBody, Notifier};
use super::twin::{DeviceLocks, DeviceTwinStore};
use super::within;
use crate::error::{BrickError, Result};

/// Liveness state of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Responding,
    NotResponding,
    Lost,
}

impl TrackerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerStatus::Responding => "responding",
            TrackerStatus::NotResponding => "not-responding",
            TrackerStatus::Lost => "lost",
        }
    }

    /// Subject line announcing the change for `device_id`
    pub fn subject(&self, device_id: &str) -> String {
        match self {
            TrackerStatus::Responding => format!("Happy days! {} is alive and well.", device_id),
            TrackerStatus::NotResponding => {
                format!("Oh no! We've not heard from {} in a while...", device_id)
            }
            TrackerStatus::Lost => format!("Oops! {} appears to be lost.", device_id),
        }
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerStatus {
    type Err = BrickError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "responding" => Ok(TrackerStatus::Responding),
            "not-responding" => Ok(TrackerStatus::NotResponding),
            "lost" => Ok(TrackerStatus::Lost),
            other => Err(BrickError::UnknownStatus(other.to_string())),
        }
    }
}

/// Device and new state carried by a detector event
///
/// Expects `{"payload": {"detector": {"keyValue": ..}, "state": {"stateName": ..}}}`.
pub fn parse_status_event(event: &Value) -> Result<(String, TrackerStatus)> {
    let device_id = event
        .pointer("/payload/detector/keyValue")
        .and_then(Value::as_str)
        .ok_or_else(|| BrickError::InvalidReading("status event has no detector key".to_string()))?;
    let state = event
        .pointer("/payload/state/stateName")
        .and_then(Value::as_str)
        .ok_or_else(|| BrickError::InvalidReading("status event has no state name".to_string()))?;
    Ok((device_id.to_string(), state.parse()?))
}

/// Applies status changes to the twin and notifies
pub struct StatusHandler {
    twin: Arc<dyn DeviceTwinStore>,
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
    locks: Arc<DeviceLocks>,
    timeout: Duration,
}

impl StatusHandler {
    /// `locks` should be shared with every other writer of the same twins.
    /// `timeout` bounds each twin call and the notification.
    pub fn new(
        twin: Arc<dyn DeviceTwinStore>,
        notifier: Arc<dyn Notifier>,
        recipients: Vec<String>,
        locks: Arc<DeviceLocks>,
        timeout: Duration,
    ) -> Self {
        Self {
            twin,
            notifier,
            recipients,
            locks,
            timeout,
        }
    }

    /// Record `status` for `device_id` and announce it
    ///
    /// Returns the reported state after the update.
    pub async fn on_status_change(&self, device_id: &str, status: TrackerStatus) -> Result<Value> {
        let reported = {
            let _guard = self.locks.acquire(device_id).await;
            let mut reported = within(self.timeout, self.twin.get(device_id)).await?;
            if !reported.is_object() {
                reported = Value::Object(Map::new());
            }
            if let Some(fields) = reported.as_object_mut() {
                fields.insert("status".to_string(), Value::String(status.as_str().to_string()));
            }
            within(self.timeout, self.twin.put(device_id, reported.clone())).await?;
            reported
        };
        info!(device = device_id, status = %status, "Tracker status updated");

        let subject = status.subject(device_id);
        let body = NotificationBody {
            headline: subject.clone(),
            lines: vec![format!("Last reported data: {}", reported)],
            ..Default::default()
        };
        dispatch(self.notifier.as_ref(), &self.recipients, &subject, &body, self.timeout).await;
        Ok(reported)
    }

    /// Parse a detector event and apply it
    pub async fn handle_event(&self, event: &Value) -> Result<Value> {
        let (device_id, status) = parse_status_event(event)?;
        self.on_status_change(&device_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::notify::{HangingNotifier, MockNotifier};
    use crate::cloud::twin::{HangingTwinStore, InMemoryTwinStore};
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn recipients() -> Vec<String> {
        vec!["family@example.com".to_string()]
    }

    #[test]
    fn test_parse_status_names() {
        assert_eq!("responding".parse::<TrackerStatus>().unwrap(), TrackerStatus::Responding);
        assert_eq!("not-responding".parse::<TrackerStatus>().unwrap(), TrackerStatus::NotResponding);
        assert_eq!("lost".parse::<TrackerStatus>().unwrap(), TrackerStatus::Lost);
        assert!(matches!(
            "sleeping".parse::<TrackerStatus>(),
            Err(BrickError::UnknownStatus(s)) if s == "sleeping"
        ));
    }

    #[test]
    fn test_subjects() {
        assert_eq!(
            TrackerStatus::Responding.subject("rosie"),
            "Happy days! rosie is alive and well."
        );
        assert_eq!(
            TrackerStatus::NotResponding.subject("rosie"),
            "Oh no! We've not heard from rosie in a while..."
        );
        assert_eq!(TrackerStatus::Lost.subject("rosie"), "Oops! rosie appears to be lost.");
    }

    #[test]
    fn test_parse_status_event() {
        let event = json!({
            "payload": {
                "detector": { "keyValue": "riot-tracker-1" },
                "state": { "stateName": "not-responding" }
            }
        });
        let (device, status) = parse_status_event(&event).unwrap();
        assert_eq!(device, "riot-tracker-1");
        assert_eq!(status, TrackerStatus::NotResponding);

        assert!(parse_status_event(&json!({ "payload": {} })).is_err());
    }

    #[tokio::test]
    async fn test_status_change_updates_twin_and_notifies() {
        let twin = Arc::new(InMemoryTwinStore::new());
        twin.put("riot-tracker-1", json!({ "position_lat": 51.5 })).await.unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|to, subject, body| {
                to.len() == 1
                    && to[0] == "family@example.com"
                    && subject == "Oops! riot-tracker-1 appears to be lost."
                    && body.lines[0].contains("51.5")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let handler = StatusHandler::new(twin.clone(), Arc::new(notifier), recipients(), Arc::default(), TIMEOUT);
        let reported = handler.on_status_change("riot-tracker-1", TrackerStatus::Lost).await.unwrap();

        assert_eq!(reported, json!({ "position_lat": 51.5, "status": "lost" }));
        assert_eq!(twin.get("riot-tracker-1").await.unwrap(), reported);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_twin_update() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _| Err(BrickError::Notify("throttled".to_string())));

        let handler = StatusHandler::new(twin.clone(), Arc::new(notifier), recipients(), Arc::default(), TIMEOUT);
        let event = json!({
            "payload": {
                "detector": { "keyValue": "riot-tracker-2" },
                "state": { "stateName": "responding" }
            }
        });
        handler.handle_event(&event).await.unwrap();

        assert_eq!(twin.get("riot-tracker-2").await.unwrap(), json!({ "status": "responding" }));
    }

    #[tokio::test]
    async fn test_unknown_state_does_not_touch_twin() {
        let mut twin = crate::cloud::twin::MockDeviceTwinStore::new();
        twin.expect_get().times(0);
        twin.expect_put().times(0);
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let handler = StatusHandler::new(Arc::new(twin), Arc::new(notifier), recipients(), Arc::default(), TIMEOUT);
        let event = json!({
            "payload": {
                "detector": { "keyValue": "riot-tracker-2" },
                "state": { "stateName": "hibernating" }
            }
        });
        assert!(matches!(handler.handle_event(&event).await, Err(BrickError::UnknownStatus(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_notifier_does_not_block_later_changes() {
        let twin = Arc::new(InMemoryTwinStore::new());
        let handler = StatusHandler::new(
            twin.clone(),
            Arc::new(HangingNotifier),
            recipients(),
            Arc::default(),
            TIMEOUT,
        );

        handler.on_status_change("riot-tracker-1", TrackerStatus::NotResponding).await.unwrap();
        handler.on_status_change("riot-tracker-1", TrackerStatus::Lost).await.unwrap();

        assert_eq!(twin.get("riot-tracker-1").await.unwrap(), json!({ "status": "lost" }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_twin_times_out() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let handler = StatusHandler::new(
            Arc::new(HangingTwinStore),
            Arc::new(notifier),
            recipients(),
            Arc::default(),
            TIMEOUT,
        );

        let result = handler.on_status_change("riot-tracker-1", TrackerStatus::Lost).await;
        assert!(matches!(result, Err(BrickError::Timeout(limit)) if limit == TIMEOUT));
    }
}
