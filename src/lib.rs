//! # RIoT Brick Library
//!
//! Field gateway for battery-powered trackers.
//!
//! Readings relayed from the trackers are queued in a durable local outbox
//! and uploaded to each tracker's device twin whenever the uplink is
//! reachable. The cloud side reacts to twin updates: the geofence engine
//! announces zone arrivals and the status handler announces liveness
//! changes.

pub mod cloud;
pub mod config;
pub mod error;
pub mod geofence;
pub mod ingest;
pub mod outbox;
pub mod uplink;
