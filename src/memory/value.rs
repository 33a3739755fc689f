//! Value types held by the in-memory store

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// Represents the different types of values that can be stored
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe)
    String(Bytes),

    /// List of values (ordered)
    List(VecDeque<Bytes>),

    /// Set of unique values (unordered)
    Set(HashSet<Bytes>),

    /// Member -> score
    ZSet(HashMap<Bytes, f64>),

    /// Hash map (field -> value)
    Hash(HashMap<Bytes, Bytes>),
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn set<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Value::Set(members.into_iter().map(Into::into).collect())
    }

    pub fn zset<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = (T, f64)>,
        T: Into<Bytes>,
    {
        Value::ZSet(members.into_iter().map(|(m, s)| (m.into(), s)).collect())
    }

    pub fn hash<I, F, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        Value::Hash(fields.into_iter().map(|(f, v)| (f.into(), v.into())).collect())
    }

    /// Get the type name as reported by TYPE
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::ZSet(_) => "zset",
            Value::Hash(_) => "hash",
        }
    }

    /// Sorted set members in ascending (score, member) order
    pub fn zset_ordered(members: &HashMap<Bytes, f64>) -> Vec<(&Bytes, f64)> {
        let mut ordered: Vec<(&Bytes, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
        ordered.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        ordered
    }
}
