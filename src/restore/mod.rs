//! Write-back of a dump into a store
//!
//! Restoring always overwrites: every key of the table is deleted and
//! rebuilt, whatever the destination held before.

mod writer;

pub use writer::{RestoreStats, RestoreWriter};
