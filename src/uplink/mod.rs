//! # Uplink Module
//!
//! Moves queued readings from the local outbox to the device twin store.
//!
//! This module handles:
//! - Probing connectivity and resetting the network link on failure
//! - Routing each origin device to its endpoint and client identity
//! - Posting payloads over mutual TLS
//! - Running the periodic drain loop

pub mod client;
pub mod probe;
pub mod router;
pub mod uploader;

pub use client::{HttpsUplink, TwinUplink};
pub use probe::{CommandReset, NetworkReset, Prober, TcpProber};
pub use router::{CredentialRouter, TrackerCredential};
pub use uploader::{CycleOutcome, DrainReport, Uploader, UploaderSettings, UploaderState};
