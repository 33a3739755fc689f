//! Redis server client

use super::{Connection, StoreClient, Transport};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::protocol::{Cmd, RespValue};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Client for a Redis-protocol server
pub struct RedisClient<S = Transport> {
    conn: Connection<S>,
}

impl RedisClient<Transport> {
    /// Connect, authenticate and select the configured database
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let transport = match &config.unix_socket {
            #[cfg(unix)]
            Some(path) => {
                info!("Connecting to {}", path.display());
                Transport::Unix(tokio::net::UnixStream::connect(path).await?)
            }
            #[cfg(not(unix))]
            Some(_) => {
                return Err(Error::Config(
                    "unix sockets are not supported on this platform".to_string(),
                ))
            }
            None => {
                let addr = config.address();
                info!("Connecting to {}", addr);
                Transport::Tcp(TcpStream::connect(&addr).await?)
            }
        };

        let mut client = RedisClient::from_stream(transport);
        client.handshake(config).await?;
        Ok(client)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> RedisClient<S> {
    /// Wrap an already connected stream
    pub fn from_stream(stream: S) -> Self {
        RedisClient {
            conn: Connection::new(stream),
        }
    }

    /// AUTH and SELECT as configured
    pub async fn handshake(&mut self, config: &ConnectionConfig) -> Result<()> {
        if let Some(password) = &config.password {
            self.call(&Cmd::new("AUTH").arg(password.clone())).await?;
            debug!("Authenticated");
        }
        if config.db != 0 {
            self.call(&Cmd::new("SELECT").arg(config.db.to_string())).await?;
            debug!("Selected database {}", config.db);
        }
        Ok(())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> StoreClient for RedisClient<S> {
    async fn call(&mut self, cmd: &Cmd) -> Result<RespValue> {
        self.conn.send(std::slice::from_ref(cmd)).await?;
        match self.conn.read_reply().await? {
            RespValue::Error(e) => Err(Error::Server(e)),
            reply => Ok(reply),
        }
    }

    async fn execute_atomic(&mut self, cmds: &[Cmd]) -> Result<Option<Vec<RespValue>>> {
        let mut group = Vec::with_capacity(cmds.len() + 2);
        group.push(Cmd::new("MULTI"));
        group.extend_from_slice(cmds);
        group.push(Cmd::new("EXEC"));
        self.conn.send(&group).await?;

        // Drain every reply before judging any of them, so the stream stays in step
        let mut replies = self.conn.read_replies(group.len()).await?;
        let exec = replies.pop().unwrap_or(RespValue::Null);

        if let Some(RespValue::Error(e)) = replies.iter().find(|r| r.is_error()) {
            return Err(Error::Server(e.clone()));
        }

        match exec {
            RespValue::Null => Ok(None),
            RespValue::Array(results) if results.len() == cmds.len() => Ok(Some(results)),
            other => Err(Error::unexpected("EXEC", &other)),
        }
    }

    async fn execute_pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        if cmds.is_empty() {
            return Ok(Vec::new());
        }
        self.conn.send(cmds).await?;
        self.conn.read_replies(cmds.len()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_handshake_auth_and_select() {
        let stream = Builder::new()
            .write(b"*2\r\n$4\r\nAUTH\r\n$6\r\nsecret\r\n")
            .read(b"+OK\r\n")
            .write(b"*2\r\n$6\r\nSELECT\r\n$1\r\n3\r\n")
            .read(b"+OK\r\n")
            .build();
        let config = ConnectionConfig {
            password: Some("secret".to_string()),
            db: 3,
            ..ConnectionConfig::default()
        };

        let mut client = RedisClient::from_stream(stream);
        client.handshake(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejected_password() {
        let stream = Builder::new()
            .write(b"*2\r\n$4\r\nAUTH\r\n$5\r\nwrong\r\n")
            .read(b"-WRONGPASS invalid username-password pair\r\n")
            .build();
        let config = ConnectionConfig {
            password: Some("wrong".to_string()),
            ..ConnectionConfig::default()
        };

        let mut client = RedisClient::from_stream(stream);
        assert!(matches!(
            client.handshake(&config).await,
            Err(Error::Server(msg)) if msg.starts_with("WRONGPASS")
        ));
    }

    #[tokio::test]
    async fn test_list_keys_and_kind() {
        let stream = Builder::new()
            .write(b"*2\r\n$4\r\nKEYS\r\n$1\r\n*\r\n")
            .read(b"*2\r\n$1\r\na\r\n$1\r\nb\r\n")
            .write(b"*2\r\n$4\r\nTYPE\r\n$1\r\na\r\n")
            .read(b"+none\r\n")
            .build();
        let mut client = RedisClient::from_stream(stream);

        let keys = client.list_keys().await.unwrap();
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(client.kind_of(&Bytes::from("a")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_atomic_group_committed() {
        let stream = Builder::new()
            .write(b"*1\r\n$5\r\nMULTI\r\n*2\r\n$4\r\nTYPE\r\n$1\r\nk\r\n*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n*1\r\n$4\r\nEXEC\r\n")
            .read(b"+OK\r\n+QUEUED\r\n+QUEUED\r\n*2\r\n+string\r\n:-1\r\n")
            .build();
        let mut client = RedisClient::from_stream(stream);

        let cmds = [Cmd::new("TYPE").arg("k"), Cmd::new("TTL").arg("k")];
        let results = client.execute_atomic(&cmds).await.unwrap();
        assert_eq!(
            results,
            Some(vec![RespValue::simple_string("string"), RespValue::Integer(-1)])
        );
    }

    #[tokio::test]
    async fn test_atomic_group_aborted_by_watch() {
        let stream = Builder::new()
            .write(b"*1\r\n$5\r\nMULTI\r\n*2\r\n$4\r\nTYPE\r\n$1\r\nk\r\n*1\r\n$4\r\nEXEC\r\n")
            .read(b"+OK\r\n+QUEUED\r\n*-1\r\n")
            .build();
        let mut client = RedisClient::from_stream(stream);

        let results = client.execute_atomic(&[Cmd::new("TYPE").arg("k")]).await.unwrap();
        assert_eq!(results, None);
    }

    #[tokio::test]
    async fn test_atomic_group_queue_error() {
        let stream = Builder::new()
            .write(b"*1\r\n$5\r\nMULTI\r\n*1\r\n$4\r\nNOPE\r\n*1\r\n$4\r\nEXEC\r\n")
            .read(b"+OK\r\n-ERR unknown command 'NOPE'\r\n-EXECABORT Transaction discarded\r\n")
            .build();
        let mut client = RedisClient::from_stream(stream);

        let result = client.execute_atomic(&[Cmd::new("NOPE")]).await;
        assert!(matches!(result, Err(Error::Server(msg)) if msg.contains("unknown command")));
    }

    #[tokio::test]
    async fn test_pipeline_returns_errors_in_place() {
        let stream = Builder::new()
            .write(b"*2\r\n$3\r\nDEL\r\n$1\r\nk\r\n*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
            .read(b":1\r\n-OOM command not allowed\r\n")
            .build();
        let mut client = RedisClient::from_stream(stream);

        let cmds = [Cmd::new("DEL").arg("k"), Cmd::new("SET").arg("k").arg("v")];
        let replies = client.execute_pipeline(&cmds).await.unwrap();
        assert_eq!(replies[0], RespValue::Integer(1));
        assert!(replies[1].is_error());
    }
}
