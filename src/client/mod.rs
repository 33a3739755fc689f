//! Store client abstraction
//!
//! The snapshot reader and the restore writer only talk to the store
//! through [`StoreClient`]. It is implemented by [`RedisClient`] for real
//! servers and by [`crate::memory::MemoryClient`] for the in-process store.

mod connection;
mod redis;

pub use connection::{Connection, Transport};
pub use redis::RedisClient;

use crate::error::{Error, Result};
use crate::protocol::{Cmd, RespValue};
use bytes::Bytes;

/// Capabilities the core needs from a store
///
/// All round trips are awaited one after the other; callers never issue
/// two requests at once.
#[allow(async_fn_in_trait)]
pub trait StoreClient {
    /// Send one command and wait for its reply
    ///
    /// Error replies are returned as `Err(Error::Server)`.
    async fn call(&mut self, cmd: &Cmd) -> Result<RespValue>;

    /// Run commands as one all-or-nothing group (MULTI ... EXEC)
    ///
    /// Returns `None` when a key watched since the last `watch` changed and
    /// the group was discarded. Watches are cleared either way.
    async fn execute_atomic(&mut self, cmds: &[Cmd]) -> Result<Option<Vec<RespValue>>>;

    /// Send commands in one non-transactional pipeline and collect every reply
    ///
    /// Error replies are returned in place for the caller to inspect.
    async fn execute_pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>>;

    /// All keys currently in the database
    async fn list_keys(&mut self) -> Result<Vec<Bytes>> {
        match self.call(&Cmd::new("KEYS").arg("*")).await? {
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::BulkString(key) => Ok(key),
                    other => Err(Error::unexpected("KEYS", &other)),
                })
                .collect(),
            other => Err(Error::unexpected("KEYS", &other)),
        }
    }

    /// Kind tag of a key, None if the key does not exist
    async fn kind_of(&mut self, key: &Bytes) -> Result<Option<String>> {
        let reply = self.call(&Cmd::new("TYPE").arg(key.clone())).await?;
        parse_type_reply(&reply)
    }

    /// Remaining time to live in seconds; negative when there is none
    async fn ttl_of(&mut self, key: &Bytes) -> Result<i64> {
        let reply = self.call(&Cmd::new("TTL").arg(key.clone())).await?;
        reply.as_integer().ok_or_else(|| Error::unexpected("TTL", &reply))
    }

    async fn delete(&mut self, key: &Bytes) -> Result<()> {
        self.call(&Cmd::new("DEL").arg(key.clone())).await?;
        Ok(())
    }

    /// Expire the key at an absolute UNIX timestamp
    async fn set_expiration(&mut self, key: &Bytes, expire_at: i64) -> Result<()> {
        let cmd = Cmd::new("EXPIREAT").arg(key.clone()).arg(expire_at.to_string());
        self.call(&cmd).await?;
        Ok(())
    }

    /// Start watching a key for the next atomic group
    async fn watch(&mut self, key: &Bytes) -> Result<()> {
        self.call(&Cmd::new("WATCH").arg(key.clone())).await?;
        Ok(())
    }

    async fn unwatch(&mut self) -> Result<()> {
        self.call(&Cmd::new("UNWATCH")).await?;
        Ok(())
    }
}

/// Interpret a TYPE reply: `none` means the key does not exist
pub(crate) fn parse_type_reply(reply: &RespValue) -> Result<Option<String>> {
    match reply.as_status() {
        Some("none") => Ok(None),
        Some(tag) => Ok(Some(tag.to_string())),
        None => Err(Error::unexpected("TYPE", reply)),
    }
}
