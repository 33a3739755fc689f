//! Batched write-back of a table

use crate::client::StoreClient;
use crate::codec::CodecRegistry;
use crate::error::{Error, Result};
use crate::literal::quote_bytes;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Record, Table};
use tracing::{debug, info};

/// Counters of one restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub records_written: usize,
    pub batches_flushed: usize,
    /// Keys deleted by [`RestoreWriter::empty`]
    pub keys_emptied: usize,
}

/// Commands of the records queued since the last flush
#[derive(Default)]
struct WriteBatch {
    cmds: Vec<Cmd>,
    records: usize,
}

/// Replays a table into a store
///
/// Each record becomes `DEL key`, the commands of its codec, and
/// `EXPIREAT key ts` when it expires. Commands go out in non-transactional
/// pipelines holding the commands of `batch_size` records; a failure leaves
/// earlier batches applied.
pub struct RestoreWriter<'a, C> {
    client: &'a mut C,
    registry: &'a CodecRegistry,
    batch_size: usize,
    stats: RestoreStats,
}

impl<'a, C: StoreClient> RestoreWriter<'a, C> {
    pub fn new(client: &'a mut C, registry: &'a CodecRegistry, batch_size: usize) -> Self {
        RestoreWriter {
            client,
            registry,
            batch_size: batch_size.max(1),
            stats: RestoreStats::default(),
        }
    }

    pub fn stats(&self) -> RestoreStats {
        self.stats
    }

    /// Delete every key in the destination
    ///
    /// Not limited to the keys about to be restored. DELs go out in
    /// pipelines of at most `batch_size` commands.
    pub async fn empty(&mut self) -> Result<usize> {
        let keys = self.client.list_keys().await?;
        if keys.is_empty() {
            return Ok(0);
        }

        for chunk in keys.chunks(self.batch_size) {
            let cmds: Vec<Cmd> = chunk.iter().map(|key| Cmd::new("DEL").arg(key.clone())).collect();
            let replies = self.client.execute_pipeline(&cmds).await?;
            check_replies(&cmds, &replies)?;
            debug!("Deleted {} keys", cmds.len());
        }

        info!("Deleted {} existing keys", keys.len());
        self.stats.keys_emptied += keys.len();
        Ok(keys.len())
    }

    /// Write every record of `table`
    pub async fn restore(&mut self, table: &Table) -> Result<RestoreStats> {
        let mut batch = WriteBatch::default();
        for record in table.values() {
            self.queue(record, &mut batch)?;
            if batch.records >= self.batch_size {
                self.flush(&mut batch).await?;
            }
        }
        if batch.records > 0 {
            self.flush(&mut batch).await?;
        }

        info!(
            "Restore done: {} records in {} batches",
            self.stats.records_written, self.stats.batches_flushed
        );
        Ok(self.stats)
    }

    fn queue(&self, record: &Record, batch: &mut WriteBatch) -> Result<()> {
        let codec = self.registry.get(record.kind().tag())?;

        batch.cmds.push(Cmd::new("DEL").arg(record.key.clone()));
        codec.write_commands(&record.key, &record.payload, &mut batch.cmds)?;
        if let Some(expire_at) = record.expire_at {
            batch.cmds.push(
                Cmd::new("EXPIREAT")
                    .arg(record.key.clone())
                    .arg(expire_at.to_string()),
            );
        }
        batch.records += 1;
        Ok(())
    }

    async fn flush(&mut self, batch: &mut WriteBatch) -> Result<()> {
        let cmds = std::mem::take(&mut batch.cmds);
        let records = std::mem::take(&mut batch.records);
        debug!("Flushing {} commands for {} records", cmds.len(), records);

        let replies = self.client.execute_pipeline(&cmds).await?;
        check_replies(&cmds, &replies)?;

        self.stats.batches_flushed += 1;
        self.stats.records_written += records;
        Ok(())
    }
}

/// Fail on the first error reply of a pipeline
fn check_replies(cmds: &[Cmd], replies: &[RespValue]) -> Result<()> {
    if replies.len() != cmds.len() {
        return Err(Error::UnexpectedReply {
            command: "pipeline",
            reply: format!("{} replies for {} commands", replies.len(), cmds.len()),
        });
    }
    for (cmd, reply) in cmds.iter().zip(replies) {
        if let RespValue::Error(e) = reply {
            let key = cmd.args().first().map(|k| quote_bytes(k)).unwrap_or_default();
            return Err(Error::Server(format!("{} {}: {}", cmd.name(), key, e)));
        }
    }
    Ok(())
}
