//! # Notification Dispatcher
//!
//! Fire-and-forget messages to the people following the trackers.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

use super::within;
use crate::error::Result;

/// Structured message body, rendered by the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationBody {
    pub headline: String,
    pub lines: Vec<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
}

impl fmt::Display for NotificationBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline)?;
        for line in &self.lines {
            write!(f, "\n{}", line)?;
        }
        if let Some(image) = &self.image_url {
            write!(f, "\n{}", image)?;
        }
        if let Some(link) = &self.link {
            write!(f, "\nFor more information visit: {}", link)?;
        }
        Ok(())
    }
}

/// Message transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipients: &[String], subject: &str, body: &NotificationBody) -> Result<()>;
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipients: &[String], subject: &str, body: &NotificationBody) -> Result<()> {
        info!(recipients = recipients.len(), "{}\n{}", subject, body);
        Ok(())
    }
}

/// Send and log the outcome; failures are never retried
///
/// A transport that has not answered within `timeout` counts as failed.
/// Returns whether the transport accepted the message.
pub async fn dispatch(
    notifier: &dyn Notifier,
    recipients: &[String],
    subject: &str,
    body: &NotificationBody,
    timeout: Duration,
) -> bool {
    match within(timeout, notifier.notify(recipients, subject, body)).await {
        Ok(()) => {
            info!("Notification sent: {}", subject);
            true
        }
        Err(e) => {
            error!("Notification '{}' failed: {}", subject, e);
            false
        }
    }
}

/// Format elapsed seconds as `HH hours MM minutes`
///
/// # Examples
///
/// ```
/// use riot_brick::cloud::notify::hours_minutes;
///
/// assert_eq!(hours_minutes(3 * 3600 + 7 * 60 + 59), "03 hours 07 minutes");
/// ```
pub fn hours_minutes(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{:02} hours {:02} minutes", hours, minutes)
}

/// Transport that never answers
#[cfg(test)]
pub(crate) struct HangingNotifier;

#[cfg(test)]
#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _: &[String], _: &str, _: &NotificationBody) -> Result<()> {
        std::future::pending().await
    }
}
