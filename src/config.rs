//! Connection settings and pass options
//!
//! Connection settings can come from a JSON file; command line flags are
//! applied on top by the binary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Attempts per key before the snapshot gives up on it
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Records per write pipeline during restore
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// How to reach the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Unix socket path; takes precedence over host and port
    pub unix_socket: Option<PathBuf>,
    pub password: Option<String>,
    /// Database index selected after connecting
    pub db: u32,
    /// Encoding of text string literals found in load input
    pub encoding: Encoding,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: "localhost".to_string(),
            port: 6379,
            unix_socket: None,
            password: None,
            db: 0,
            encoding: Encoding::default(),
        }
    }
}

impl ConnectionConfig {
    /// Load connection settings from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        serde_json::from_slice(&data).map_err(|e| {
            Error::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// `host:port` for TCP connections
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Text encodings accepted for `'...'` string literals in load input
///
/// Byte string literals are always taken verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "ascii")]
    Ascii,
}

impl Encoding {
    /// Encode decoded text back into bytes, None if a character is not representable
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            Encoding::Utf8 => Some(text.as_bytes().to_vec()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect(),
            Encoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { Some(c as u8) } else { None })
                .collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            other => Err(format!("unsupported encoding '{}'", other)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Latin1 => write!(f, "latin-1"),
            Encoding::Ascii => write!(f, "ascii"),
        }
    }
}

/// Source of the current UNIX time in seconds
pub type Clock = fn() -> i64;

/// Wall clock
pub fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Snapshot reader policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    pub max_attempts: usize,
    /// Sort set members so the output is reproducible
    pub sorted: bool,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sorted: false,
        }
    }
}

/// Options of a dump pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Multi-line, indented, deterministically ordered output
    pub pretty: bool,
}

impl DumpOptions {
    pub fn read_policy(&self) -> ReadPolicy {
        ReadPolicy {
            sorted: self.pretty,
            ..ReadPolicy::default()
        }
    }
}

/// Options of a load pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Delete every key in the destination before loading
    pub empty: bool,
    pub batch_size: usize,
    pub encoding: Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            empty: false,
            batch_size: DEFAULT_BATCH_SIZE,
            encoding: Encoding::default(),
        }
    }
}
