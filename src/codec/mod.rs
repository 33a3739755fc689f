//! Value codecs
//!
//! One codec per value kind. A codec knows the command that reads its kind
//! inside an atomic group, how to shape the reply into a payload, which
//! commands rebuild the value on restore, and how the payload is laid out in
//! the dump literal. Supporting a new kind means adding a codec and
//! registering it; the snapshot and restore protocols stay untouched.

mod registry;

mod string;
mod list;
mod set;
mod zset;
mod hash;

pub use registry::CodecRegistry;
pub use string::StringCodec;
pub use list::ListCodec;
pub use set::SetCodec;
pub use zset::ZSetCodec;
pub use hash::HashCodec;
pub(crate) use zset::{format_score, parse_score};

use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Read and write strategy for one value kind
pub trait Codec: Send + Sync {
    /// The kind this codec handles
    fn kind(&self) -> Kind;

    /// Command fetching the whole value, queued inside the atomic group
    fn read_command(&self, key: &Bytes) -> Cmd;

    /// Turn the reply of `read_command` into a payload
    ///
    /// With `sorted` set, unordered collections are sorted so that output is
    /// reproducible.
    fn shape(&self, key: &Bytes, reply: RespValue, sorted: bool) -> Result<Payload>;

    /// Append the commands that rebuild `payload` under `key`
    ///
    /// The caller deletes the key first; an empty collection appends nothing.
    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()>;

    /// Layout of the payload inside the dump literal
    fn to_literal(&self, key: &Bytes, payload: &Payload, sorted: bool) -> Result<Literal>;

    /// Payload described by a dump literal
    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload>;
}

/// Error for a payload handed to the codec of another kind
pub(crate) fn kind_mismatch(key: &Bytes, expected: Kind, payload: &Payload) -> Error {
    Error::invalid_record(
        key,
        format!("{} payload given to the {} codec", payload.kind(), expected),
    )
}

/// Extract a bulk string reply
pub(crate) fn expect_bulk(command: &'static str, reply: RespValue) -> Result<Bytes> {
    match reply {
        RespValue::BulkString(bytes) => Ok(bytes),
        other => Err(Error::unexpected(command, &other)),
    }
}

/// Extract an array reply made only of bulk strings
pub(crate) fn expect_bulk_array(command: &'static str, reply: RespValue) -> Result<Vec<Bytes>> {
    match reply {
        RespValue::Array(items) => items
            .into_iter()
            .map(|item| expect_bulk(command, item))
            .collect(),
        other => Err(Error::unexpected(command, &other)),
    }
}

/// Byte value of a literal string element
pub(crate) fn literal_bytes(
    key: &Bytes,
    value: &Literal,
    encoding: Encoding,
    what: &str,
) -> Result<Bytes> {
    match value {
        Literal::Bytes(_) | Literal::Text(_) => value.to_bytes(encoding).ok_or_else(|| {
            Error::invalid_record(key, format!("{} is not representable in {}", what, encoding))
        }),
        other => Err(Error::invalid_record(
            key,
            format!("{} must be a string, found {}", what, other.type_name()),
        )),
    }
}

/// Elements of a literal list or tuple
pub(crate) fn literal_sequence<'a>(key: &Bytes, value: &'a Literal) -> Result<&'a [Literal]> {
    value.as_sequence().ok_or_else(|| {
        Error::invalid_record(
            key,
            format!("value must be a list, found {}", value.type_name()),
        )
    })
}

/// Element-wise byte values of a literal list
pub(crate) fn literal_byte_list(key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Vec<Bytes>> {
    literal_sequence(key, value)?
        .iter()
        .map(|item| literal_bytes(key, item, encoding, "element"))
        .collect()
}

/// Literal list of byte strings
pub(crate) fn byte_list_literal(items: &[Bytes]) -> Literal {
    Literal::List(items.iter().cloned().map(Literal::Bytes).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_bulk_array() {
        let reply = RespValue::array(vec![RespValue::bulk_string("a"), RespValue::bulk_string("b")]);
        assert_eq!(
            expect_bulk_array("LRANGE", reply).unwrap(),
            vec![Bytes::from("a"), Bytes::from("b")]
        );

        let reply = RespValue::array(vec![RespValue::Integer(1)]);
        assert!(matches!(
            expect_bulk_array("LRANGE", reply),
            Err(Error::UnexpectedReply { command: "LRANGE", .. })
        ));
    }

    #[test]
    fn test_literal_bytes_encodes_text() {
        let key = Bytes::from("k");
        let value = Literal::text("é");
        assert_eq!(
            literal_bytes(&key, &value, Encoding::Latin1, "value").unwrap(),
            Bytes::from_static(b"\xe9")
        );
        assert!(literal_bytes(&key, &Literal::Int(1), Encoding::Utf8, "value").is_err());
        assert!(literal_bytes(&key, &Literal::text("€"), Encoding::Ascii, "value").is_err());
    }
}
