//! Per-key optimistic read protocol

use crate::client::{parse_type_reply, StoreClient};
use crate::codec::CodecRegistry;
use crate::config::{system_clock, Clock, ReadPolicy};
use crate::error::{Error, Result};
use crate::literal::quote_bytes;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Record, Table};
use bytes::Bytes;
use tracing::{debug, info};

/// Counters of one snapshot pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub keys_listed: usize,
    pub records_read: usize,
    /// Keys deleted between listing and reading
    pub keys_vanished: usize,
    pub retries: usize,
}

/// Outcome of one read attempt
enum Attempt {
    Done(Record),
    Vanished,
    /// The key changed during the attempt; start over
    Raced(&'static str),
}

/// Reads every key of a store into records
///
/// Each key goes through `TYPE` (inspect), then `WATCH` followed by an
/// atomic `TYPE; TTL; <read>` group. A discarded group or a kind that
/// changed between inspect and read sends the key back to inspect, up to
/// `max_attempts` times.
pub struct SnapshotReader<'a, C> {
    client: &'a mut C,
    registry: &'a CodecRegistry,
    policy: ReadPolicy,
    clock: Clock,
    stats: SnapshotStats,
}

impl<'a, C: StoreClient> SnapshotReader<'a, C> {
    pub fn new(client: &'a mut C, registry: &'a CodecRegistry, policy: ReadPolicy) -> Self {
        SnapshotReader {
            client,
            registry,
            policy,
            clock: system_clock,
            stats: SnapshotStats::default(),
        }
    }

    /// Use `clock` as the time base of computed expirations
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    /// Read every key listed at the start of the pass
    ///
    /// Keys created after the listing are not visited; keys deleted before
    /// their turn are skipped.
    pub async fn snapshot(&mut self) -> Result<Table> {
        let keys = self.client.list_keys().await?;
        self.stats.keys_listed = keys.len();
        debug!("Listed {} keys", keys.len());

        let mut table = Table::new();
        for key in keys {
            if let Some(record) = self.read_key(&key).await? {
                table.insert(key, record);
            }
        }

        info!(
            "Snapshot done: {} keys listed, {} read, {} vanished, {} retries",
            self.stats.keys_listed, self.stats.records_read, self.stats.keys_vanished, self.stats.retries
        );
        Ok(table)
    }

    /// Read one key consistently
    ///
    /// Returns `None` when the key no longer exists.
    pub async fn read_key(&mut self, key: &Bytes) -> Result<Option<Record>> {
        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            match self.attempt(key).await? {
                Attempt::Done(record) => {
                    self.stats.records_read += 1;
                    return Ok(Some(record));
                }
                Attempt::Vanished => {
                    debug!("Key {} vanished, skipping", quote_bytes(key));
                    self.stats.keys_vanished += 1;
                    return Ok(None);
                }
                Attempt::Raced(reason) => {
                    debug!(
                        "Key {} {} (attempt {}/{})",
                        quote_bytes(key),
                        reason,
                        attempt,
                        max_attempts
                    );
                    self.stats.retries += 1;
                }
            }
        }

        Err(Error::ConcurrentModification { key: key.clone() })
    }

    async fn attempt(&mut self, key: &Bytes) -> Result<Attempt> {
        let Some(tag) = self.client.kind_of(key).await? else {
            return Ok(Attempt::Vanished);
        };
        let codec = self.registry.get(&tag)?;

        self.client.watch(key).await?;
        let group = [
            Cmd::new("TYPE").arg(key.clone()),
            Cmd::new("TTL").arg(key.clone()),
            codec.read_command(key),
        ];
        let Some(replies) = self.client.execute_atomic(&group).await? else {
            return Ok(Attempt::Raced("changed while being read"));
        };

        let [kind, ttl, value]: [RespValue; 3] = replies.try_into().map_err(|r: Vec<RespValue>| {
            Error::UnexpectedReply {
                command: "EXEC",
                reply: format!("{} results for {} commands", r.len(), group.len()),
            }
        })?;

        if parse_type_reply(&kind)?.as_deref() != Some(tag.as_str()) {
            return Ok(Attempt::Raced("changed kind"));
        }

        let ttl = ttl.as_integer().ok_or_else(|| Error::unexpected("TTL", &ttl))?;
        let expire_at = if ttl < 0 { None } else { Some((self.clock)() + ttl) };
        let payload = codec.shape(key, value, self.policy.sorted)?;

        Ok(Attempt::Done(Record {
            key: key.clone(),
            expire_at,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ListCodec, SetCodec, StringCodec, ZSetCodec};
    use crate::memory::{MemoryClient, MemoryStore, Value};
    use crate::record::Payload;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn fixed_clock() -> i64 {
        NOW
    }

    fn client() -> MemoryClient {
        MemoryClient::with_store(MemoryStore::with_clock(fixed_clock))
    }

    fn sorted_policy() -> ReadPolicy {
        ReadPolicy {
            sorted: true,
            ..ReadPolicy::default()
        }
    }

    /// Rewrite `key` after each of its first `times` WATCH commands
    fn racing_writer(key: &'static str, times: usize) -> impl FnMut(&Cmd, &mut MemoryStore) {
        let mut raced = 0;
        move |cmd: &Cmd, store: &mut MemoryStore| {
            if cmd.name() == "WATCH" && cmd.args()[0] == key && raced < times {
                raced += 1;
                store.set(key, Value::string(format!("v{}", raced)));
            }
        }
    }

    #[tokio::test]
    async fn test_reads_all_kinds() {
        let mut client = client();
        let store = client.store_mut();
        store.set("s", Value::string("text"));
        store.set("l", Value::list(["b", "a", "b"]));
        store.set("st", Value::set(["y", "x"]));
        store.set("z", Value::zset([("hi", 2.0), ("lo", f64::NEG_INFINITY)]));
        store.set("h", Value::hash([("f2", "2"), ("f1", "1")]));

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, sorted_policy());
        let table = reader.snapshot().await.unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table[&Bytes::from("s")].payload, Payload::String(Bytes::from("text")));
        assert_eq!(
            table[&Bytes::from("l")].payload,
            Payload::List(vec![Bytes::from("b"), Bytes::from("a"), Bytes::from("b")])
        );
        assert_eq!(
            table[&Bytes::from("st")].payload,
            Payload::Set(vec![Bytes::from("x"), Bytes::from("y")])
        );
        assert_eq!(
            table[&Bytes::from("z")].payload,
            Payload::ZSet(vec![
                (Bytes::from("lo"), f64::NEG_INFINITY),
                (Bytes::from("hi"), 2.0),
            ])
        );
        assert_eq!(
            table[&Bytes::from("h")].payload,
            Payload::Hash(vec![
                (Bytes::from("f1"), Bytes::from("1")),
                (Bytes::from("f2"), Bytes::from("2")),
            ])
        );
        assert!(table.values().all(|record| record.expire_at.is_none()));
        assert_eq!(reader.stats().records_read, 5);
    }

    #[tokio::test]
    async fn test_expiration_is_absolute() {
        let mut client = client();
        let key = Bytes::from("k");
        client.store_mut().set("k", Value::string("v"));
        client.store_mut().expire_at(&key, NOW + 100);

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default())
            .with_clock(fixed_clock);
        let record = reader.read_key(&key).await.unwrap().unwrap();
        assert_eq!(record.expire_at, Some(NOW + 100));
    }

    #[tokio::test]
    async fn test_key_deleted_after_listing_is_skipped() {
        let mut client = client();
        client.store_mut().set("kept", Value::string("1"));
        client.store_mut().set("gone", Value::string("2"));
        client.set_interference(|cmd, store| {
            if cmd.name() == "KEYS" {
                store.delete(&Bytes::from("gone"));
            }
        });

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default());
        let table = reader.snapshot().await.unwrap();

        assert_eq!(table.keys().collect::<Vec<_>>(), vec![&Bytes::from("kept")]);
        let stats = reader.stats();
        assert_eq!(stats.keys_listed, 2);
        assert_eq!(stats.keys_vanished, 1);
    }

    #[tokio::test]
    async fn test_converges_after_nine_races() {
        let mut client = client();
        client.store_mut().set("hot", Value::string("v0"));
        client.set_interference(racing_writer("hot", 9));

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default());
        let record = reader.read_key(&Bytes::from("hot")).await.unwrap().unwrap();

        assert_eq!(record.payload, Payload::String(Bytes::from("v9")));
        assert_eq!(reader.stats().retries, 9);
    }

    #[tokio::test]
    async fn test_gives_up_after_ten_races() {
        let mut client = client();
        client.store_mut().set("hot", Value::string("v0"));
        client.store_mut().set("calm", Value::string("c"));
        client.set_interference(racing_writer("hot", 10));

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default());
        let result = reader.snapshot().await;

        assert!(matches!(
            result,
            Err(Error::ConcurrentModification { key }) if key == Bytes::from("hot")
        ));
    }

    #[tokio::test]
    async fn test_kind_change_between_inspect_and_read() {
        let mut client = client();
        client.store_mut().set("k", Value::string("old"));
        let mut changed = false;
        client.set_interference(move |cmd, store| {
            if cmd.name() == "TYPE" && !changed {
                changed = true;
                store.set("k", Value::list(["new"]));
            }
        });

        let registry = CodecRegistry::new();
        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default());
        let record = reader.read_key(&Bytes::from("k")).await.unwrap().unwrap();

        assert_eq!(record.payload, Payload::List(vec![Bytes::from("new")]));
        assert_eq!(reader.stats().retries, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_fatal() {
        let mut client = client();
        client.store_mut().set("h", Value::hash([("f", "v")]));

        let mut registry = CodecRegistry::empty();
        registry.register(Arc::new(StringCodec));
        registry.register(Arc::new(ListCodec));
        registry.register(Arc::new(SetCodec));
        registry.register(Arc::new(ZSetCodec));

        let mut reader = SnapshotReader::new(&mut client, &registry, ReadPolicy::default());
        assert!(matches!(
            reader.snapshot().await,
            Err(Error::UnknownType(tag)) if tag == "hash"
        ));
    }
}
