//! ferrumdl - dump and restore the contents of a live Redis-compatible store
//!
//! The crate is layered the same way in both directions:
//! - `protocol` and `client` talk to the store
//! - `codec` knows how each value kind is read, written and laid out
//! - `snapshot` and `restore` run the read and write protocols
//! - `literal` and `format` turn tables into text and back
//!
//! [`dumps`] and [`loads`] tie these together for one full pass.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod literal;
pub mod memory;
pub mod protocol;
pub mod record;
pub mod restore;
pub mod snapshot;

/// Re-export commonly used types
pub use client::{RedisClient, StoreClient};
pub use codec::{Codec, CodecRegistry};
pub use config::{ConnectionConfig, DumpOptions, Encoding, LoadOptions, ReadPolicy};
pub use error::{Error, Result};
pub use memory::{MemoryClient, MemoryStore};
pub use record::{Kind, Payload, Record, Table};
pub use restore::{RestoreStats, RestoreWriter};
pub use snapshot::{SnapshotReader, SnapshotStats};

/// Snapshot every key of the store and serialize the result
pub async fn dumps<C: StoreClient>(
    client: &mut C,
    registry: &CodecRegistry,
    options: &DumpOptions,
) -> Result<String> {
    let table = SnapshotReader::new(client, registry, options.read_policy())
        .snapshot()
        .await?;
    format::to_text(&table, registry, options.pretty)
}

/// Parse a dump and write it into the store
///
/// The whole text is parsed and validated before the first command is sent,
/// so malformed input or an unsupported kind leaves the store untouched.
pub async fn loads<C: StoreClient>(
    client: &mut C,
    registry: &CodecRegistry,
    text: &str,
    options: &LoadOptions,
) -> Result<RestoreStats> {
    let table = format::from_text(text, registry, options.encoding)?;

    let mut writer = RestoreWriter::new(client, registry, options.batch_size);
    if options.empty {
        writer.empty().await?;
    }
    writer.restore(&table).await
}
