//! Snapshot records
//!
//! A record is one key with its kind, absolute expiration and value. The
//! kind is derived from the payload variant, so a record can never carry a
//! value of the wrong shape for its kind.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// Keys of a dump mapped to their records
pub type Table = BTreeMap<Bytes, Record>;

/// Container type of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    String,
    List,
    Set,
    ZSet,
    Hash,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::String, Kind::List, Kind::Set, Kind::ZSet, Kind::Hash];

    /// Tag reported by `TYPE` and written in dumps
    pub fn tag(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::List => "list",
            Kind::Set => "set",
            Kind::ZSet => "zset",
            Kind::Hash => "hash",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kind-dependent value of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    String(Bytes),
    /// Elements in list order
    List(Vec<Bytes>),
    /// Members, sorted only when sorted output was requested
    Set(Vec<Bytes>),
    /// (member, score) pairs in ascending score order
    ZSet(Vec<(Bytes, f64)>),
    /// Field/value pairs
    Hash(Vec<(Bytes, Bytes)>),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::String(_) => Kind::String,
            Payload::List(_) => Kind::List,
            Payload::Set(_) => Kind::Set,
            Payload::ZSet(_) => Kind::ZSet,
            Payload::Hash(_) => Kind::Hash,
        }
    }

    /// Number of elements, 1 for strings
    pub fn len(&self) -> usize {
        match self {
            Payload::String(_) => 1,
            Payload::List(items) | Payload::Set(items) => items.len(),
            Payload::ZSet(pairs) => pairs.len(),
            Payload::Hash(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One key of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Bytes,
    /// Absolute expiration in UNIX seconds
    pub expire_at: Option<i64>,
    pub payload: Payload,
}

impl Record {
    pub fn new(key: impl Into<Bytes>, payload: Payload) -> Self {
        Record {
            key: key.into(),
            expire_at: None,
            payload,
        }
    }

    pub fn with_expiration(mut self, expire_at: i64) -> Self {
        self.expire_at = Some(expire_at);
        self
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }
}

/// Build a table from records; a later record for the same key wins
pub fn into_table<I: IntoIterator<Item = Record>>(records: I) -> Table {
    records
        .into_iter()
        .map(|record| (record.key.clone(), record))
        .collect()
}
