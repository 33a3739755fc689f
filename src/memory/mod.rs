//! In-memory store backend
//!
//! A self-contained store speaking the subset of the Redis command set the
//! snapshot and restore passes use. [`MemoryClient`] implements
//! [`StoreClient`] on top of it, with real WATCH semantics, so the whole
//! dump/load cycle can run in process.

mod dispatch;
mod store;
mod value;

pub use dispatch::execute;
pub use store::{Entry, MemoryStore};
pub use value::Value;

use crate::client::StoreClient;
use crate::error::{Error, Result};
use crate::protocol::{Cmd, RespValue};
use bytes::Bytes;
use tracing::debug;

/// Hook run after every standalone command, standing in for another client
pub type Interference = Box<dyn FnMut(&Cmd, &mut MemoryStore)>;

/// [`StoreClient`] over a [`MemoryStore`]
pub struct MemoryClient {
    store: MemoryStore,

    /// Keys watched for the next atomic group, with their versions at WATCH time
    watched: Vec<(Bytes, u64)>,

    interference: Option<Interference>,

    pipelines: usize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        MemoryClient {
            store,
            watched: Vec::new(),
            interference: None,
            pipelines: 0,
        }
    }

    /// Install a hook that may mutate the store after each standalone command
    pub fn set_interference<F>(&mut self, hook: F)
    where
        F: FnMut(&Cmd, &mut MemoryStore) + 'static,
    {
        self.interference = Some(Box::new(hook));
    }

    pub fn clear_interference(&mut self) {
        self.interference = None;
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    /// Number of pipelines executed so far
    pub fn pipeline_count(&self) -> usize {
        self.pipelines
    }

    fn watch_keys(&mut self, keys: &[Bytes]) -> RespValue {
        if keys.is_empty() {
            return RespValue::error("ERR wrong number of arguments for 'watch' command");
        }
        for key in keys {
            let version = self.store.version_of(key);
            self.watched.push((key.clone(), version));
        }
        RespValue::ok()
    }

    fn watch_broken(&self) -> bool {
        self.watched
            .iter()
            .any(|(key, version)| self.store.version_of(key) != *version)
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryClient {
    async fn call(&mut self, cmd: &Cmd) -> Result<RespValue> {
        let reply = match cmd.name().to_ascii_uppercase().as_str() {
            "WATCH" => self.watch_keys(cmd.args()),
            "UNWATCH" => {
                self.watched.clear();
                RespValue::ok()
            }
            "MULTI" | "EXEC" | "DISCARD" => {
                RespValue::error(format!("ERR {} is only available in atomic groups", cmd.name()))
            }
            _ => execute(&mut self.store, cmd),
        };

        if let Some(hook) = self.interference.as_mut() {
            hook(cmd, &mut self.store);
        }

        match reply {
            RespValue::Error(e) => Err(Error::Server(e)),
            reply => Ok(reply),
        }
    }

    async fn execute_atomic(&mut self, cmds: &[Cmd]) -> Result<Option<Vec<RespValue>>> {
        let broken = self.watch_broken();
        self.watched.clear();
        if broken {
            debug!("Watched key changed, discarding {} queued commands", cmds.len());
            return Ok(None);
        }

        Ok(Some(
            cmds.iter().map(|cmd| execute(&mut self.store, cmd)).collect(),
        ))
    }

    async fn execute_pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        self.pipelines += 1;
        Ok(cmds.iter().map(|cmd| execute(&mut self.store, cmd)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_maps_error_replies() {
        let mut client = MemoryClient::new();
        client.call(&Cmd::new("RPUSH").arg("l").arg("a")).await.unwrap();

        let result = client.call(&Cmd::new("GET").arg("l")).await;
        assert!(matches!(result, Err(Error::Server(msg)) if msg.starts_with("WRONGTYPE")));
    }

    #[tokio::test]
    async fn test_atomic_group_commits_without_interference() {
        let mut client = MemoryClient::new();
        client.store_mut().set("k", Value::string("v"));
        let key = Bytes::from("k");

        client.watch(&key).await.unwrap();
        let results = client
            .execute_atomic(&[Cmd::new("TYPE").arg("k"), Cmd::new("GET").arg("k")])
            .await
            .unwrap();
        assert_eq!(
            results,
            Some(vec![RespValue::simple_string("string"), RespValue::bulk_string("v")])
        );
    }

    #[tokio::test]
    async fn test_interference_after_watch_aborts_group() {
        let mut client = MemoryClient::new();
        client.store_mut().set("k", Value::string("v"));
        client.set_interference(|cmd, store| {
            if cmd.name() == "WATCH" {
                store.set("k", Value::string("changed"));
            }
        });
        let key = Bytes::from("k");

        client.watch(&key).await.unwrap();
        let results = client.execute_atomic(&[Cmd::new("GET").arg("k")]).await.unwrap();
        assert_eq!(results, None);

        // The failed group cleared the watch
        client.clear_interference();
        let results = client.execute_atomic(&[Cmd::new("GET").arg("k")]).await.unwrap();
        assert_eq!(results, Some(vec![RespValue::bulk_string("changed")]));
    }

    #[tokio::test]
    async fn test_delete_and_recreate_breaks_watch() {
        let mut client = MemoryClient::new();
        let key = Bytes::from("k");
        client.watch(&key).await.unwrap();

        client.store_mut().set("k", Value::string("a"));
        client.store_mut().delete(&key);
        let results = client.execute_atomic(&[Cmd::new("TYPE").arg("k")]).await.unwrap();
        assert_eq!(results, None);
    }

    #[tokio::test]
    async fn test_unwatch_releases_watched_keys() {
        let mut client = MemoryClient::new();
        client.store_mut().set("k", Value::string("v"));
        let key = Bytes::from("k");

        client.watch(&key).await.unwrap();
        client.unwatch().await.unwrap();
        client.store_mut().set("k", Value::string("changed"));

        let results = client.execute_atomic(&[Cmd::new("GET").arg("k")]).await.unwrap();
        assert_eq!(results, Some(vec![RespValue::bulk_string("changed")]));
    }

    #[tokio::test]
    async fn test_expiration_and_delete_helpers() {
        const NOW: i64 = 1_700_000_000;
        fn fixed_clock() -> i64 {
            NOW
        }

        let mut client = MemoryClient::with_store(MemoryStore::with_clock(fixed_clock));
        client.store_mut().set("k", Value::string("v"));
        let key = Bytes::from("k");
        assert_eq!(client.ttl_of(&key).await.unwrap(), -1);

        client.set_expiration(&key, NOW + 100).await.unwrap();
        assert_eq!(client.ttl_of(&key).await.unwrap(), 100);
        assert_eq!(client.store_mut().expiration(&key), Some(NOW + 100));

        client.delete(&key).await.unwrap();
        assert_eq!(client.ttl_of(&key).await.unwrap(), -2);
        assert!(client.store().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_counts_and_keeps_errors() {
        let mut client = MemoryClient::new();
        let replies = client
            .execute_pipeline(&[
                Cmd::new("SET").arg("k").arg("v"),
                Cmd::new("RPUSH").arg("k").arg("x"),
            ])
            .await
            .unwrap();
        assert_eq!(replies[0], RespValue::ok());
        assert!(replies[1].is_error());
        assert_eq!(client.pipeline_count(), 1);
    }
}
