//! # Outbox Module
//!
//! Durable local queue of readings that have not reached the device twin yet.
//!
//! This module handles:
//! - Appending readings with monotonically increasing ids
//! - Listing unprocessed records in FIFO order
//! - Marking records processed after confirmed upload
//!
//! Records are never deleted; the table doubles as an audit log.

pub mod record;
pub mod store;

pub use record::OutboxRecord;
pub use store::{Outbox, SqliteOutbox};
