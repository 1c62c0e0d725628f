//! # Uploader
//!
//! Periodic control loop that drains the outbox into the device twin store.
//!
//! ```text
//! IDLE -> PROBE -> CONNECTED -> DRAIN -> IDLE
//!              \-> DISCONNECTED -----/
//! ```
//!
//! Each cycle probes one well-known endpoint (with a single network reset
//! and re-probe on failure), then walks the pending records in FIFO order.
//! A record is marked processed only after the endpoint accepted it, so a
//! crash between upload and mark causes a retry, never a loss. A failing
//! record never stops the rest of the queue from being attempted.

use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::client::TwinUplink;
use super::probe::{NetworkReset, Prober};
use super::router::CredentialRouter;
use crate::config::UploaderConfig;
use crate::error::{BrickError, Result};
use crate::outbox::Outbox;

/// Timing and recovery parameters of the loop
#[derive(Debug, Clone)]
pub struct UploaderSettings {
    /// Cycle period (T_upload)
    pub period: Duration,
    pub probe_timeout: Duration,
    pub upload_timeout: Duration,
    /// Wait between a network reset and the re-probe
    pub settle_delay: Duration,
    /// Interface handed to the network reset
    pub interface: String,
}

impl UploaderSettings {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            period: config.period(),
            probe_timeout: config.probe_timeout(),
            upload_timeout: config.upload_timeout(),
            settle_delay: config.settle_delay(),
            interface: config.wlan_interface.clone(),
        }
    }
}

/// Phase of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    Idle,
    Probe,
    Connected,
    Disconnected,
    Drain,
}

impl fmt::Display for UploaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploaderState::Idle => "idle",
            UploaderState::Probe => "probe",
            UploaderState::Connected => "connected",
            UploaderState::Disconnected => "disconnected",
            UploaderState::Drain => "drain",
        };
        f.write_str(name)
    }
}

/// Counters for one drain pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Upload attempts made
    pub attempted: usize,
    /// Accepted and marked processed
    pub uploaded: usize,
    /// Attempted but not accepted; left pending
    pub failed: usize,
    /// No credential for the origin device; left pending
    pub unroutable: usize,
}

/// Terminal result of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Endpoint unreachable even after the reset; nothing attempted
    Disconnected,
    Drained(DrainReport),
    /// Local store failed; retried next period
    StorageFailed,
}

/// Time to sleep after a cycle that took `elapsed`
///
/// Zero when the cycle overran the period, so the next one starts at once.
pub fn cycle_delay(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Outbox drain loop
pub struct Uploader {
    outbox: Arc<dyn Outbox>,
    router: Arc<CredentialRouter>,
    uplink: Arc<dyn TwinUplink>,
    prober: Arc<dyn Prober>,
    reset: Arc<dyn NetworkReset>,
    settings: UploaderSettings,
    state: UploaderState,
}

impl Uploader {
    pub fn new(
        outbox: Arc<dyn Outbox>,
        router: Arc<CredentialRouter>,
        uplink: Arc<dyn TwinUplink>,
        prober: Arc<dyn Prober>,
        reset: Arc<dyn NetworkReset>,
        settings: UploaderSettings,
    ) -> Self {
        Self {
            outbox,
            router,
            uplink,
            prober,
            reset,
            settings,
            state: UploaderState::Idle,
        }
    }

    pub fn state(&self) -> UploaderState {
        self.state
    }

    /// Run a synchronous outbox call on the blocking pool
    async fn with_outbox<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&dyn Outbox) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let outbox = Arc::clone(&self.outbox);
        tokio::task::spawn_blocking(move || op(outbox.as_ref())).await?
    }

    fn transition(&mut self, next: UploaderState) {
        debug!("Uploader state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run cycles every `period` until `shutdown` resolves
    ///
    /// Shutdown is only observed between cycles; uploads in flight finish
    /// or time out first.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Uploader started ({} trackers, period {:?})",
            self.router.len(),
            self.settings.period
        );

        loop {
            let started = Instant::now();
            let outcome = self.run_cycle().await;
            debug!("Cycle finished in {:?}: {:?}", started.elapsed(), outcome);

            let delay = cycle_delay(self.settings.period, started.elapsed());
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Uploader stopped");
                    break;
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// One full PROBE -> DRAIN pass
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.transition(UploaderState::Probe);
        if !self.check_connectivity().await {
            self.transition(UploaderState::Disconnected);
            self.transition(UploaderState::Idle);
            return CycleOutcome::Disconnected;
        }

        self.transition(UploaderState::Connected);
        self.transition(UploaderState::Drain);
        let outcome = match self.drain().await {
            Ok(report) => {
                info!(
                    "Drain complete: {} uploaded, {} failed, {} unroutable",
                    report.uploaded, report.failed, report.unroutable
                );
                match self.with_outbox(|outbox| outbox.unprocessed_count()).await {
                    Ok(backlog) => info!(backlog, "Records awaiting upload"),
                    Err(e) => warn!("Cannot count pending records: {}", e),
                }
                CycleOutcome::Drained(report)
            }
            Err(e) => {
                error!("Drain aborted, retrying next period: {}", e);
                CycleOutcome::StorageFailed
            }
        };
        self.transition(UploaderState::Idle);
        outcome
    }

    /// Probe the well-known endpoint, resetting the network once on failure
    pub async fn check_connectivity(&self) -> bool {
        let Some((host, port)) = self.router.probe_target() else {
            warn!("No endpoint to probe; treating as disconnected");
            return false;
        };
        let timeout = self.settings.probe_timeout;

        if self.prober.probe(&host, port, timeout).await {
            debug!("Connection possible to {}:{}", host, port);
            return true;
        }

        warn!("No connectivity to {}:{}", host, port);
        if let Err(e) = self.reset.reset(&self.settings.interface).await {
            warn!("Network reset of {} failed: {}", self.settings.interface, e);
            return false;
        }
        info!("Restarted network interface {}", self.settings.interface);
        sleep(self.settings.settle_delay).await;

        let connected = self.prober.probe(&host, port, timeout).await;
        if connected {
            info!("Connection restored to {}:{}", host, port);
        } else {
            warn!("Failed to connect to {}:{}", host, port);
        }
        connected
    }

    /// Upload every pending record once, in id order
    ///
    /// # Errors
    ///
    /// Only local storage failures are returned; they end the pass early.
    /// Upload and routing failures are counted and logged per record.
    pub async fn drain(&self) -> Result<DrainReport> {
        let records = self.with_outbox(|outbox| outbox.pending()).await?;
        info!("Discovered {} cached records", records.len());

        let mut report = DrainReport::default();
        for record in records {
            let credential = match self.router.route(&record.origin_device) {
                Ok(credential) => credential,
                Err(e) => {
                    warn!(record_id = record.id, "{}; leaving record pending", e);
                    report.unroutable += 1;
                    continue;
                }
            };

            let body = match serde_json::to_vec(&record.payload) {
                Ok(body) => Bytes::from(body),
                Err(e) => {
                    error!(record_id = record.id, "Cannot encode payload: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            report.attempted += 1;
            let result = tokio::time::timeout(
                self.settings.upload_timeout,
                self.uplink.submit(credential, body),
            )
            .await
            .unwrap_or_else(|_| Err(BrickError::Timeout(self.settings.upload_timeout)));

            match result {
                Ok(()) => {
                    let id = record.id;
                    self.with_outbox(move |outbox| outbox.mark_processed(id)).await?;
                    report.uploaded += 1;
                    info!(record_id = record.id, device = %record.origin_device, "Successfully uploaded record");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(record_id = record.id, device = %record.origin_device, "Error during upload: {}", e);
                }
            }
        }

        if report.unroutable > 0 {
            error!(
                "{} records have no tracker credential and will not upload until one is configured",
                report.unroutable
            );
        }
        Ok(report)
    }
}
