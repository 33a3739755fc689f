//! Snapshot of a live store
//!
//! The store has no whole-database transaction, so consistency is per key:
//! each record is the state of its key at one instant, but different keys
//! may be read at different instants.

mod reader;

pub use reader::{SnapshotReader, SnapshotStats};
