//! Hash codec (HGETALL / HSET)

use super::{expect_bulk_array, kind_mismatch, literal_bytes, Codec};
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Field to value mapping, written to dumps as a dict
pub struct HashCodec;

impl Codec for HashCodec {
    fn kind(&self) -> Kind {
        Kind::Hash
    }

    fn read_command(&self, key: &Bytes) -> Cmd {
        Cmd::new("HGETALL").arg(key.clone())
    }

    fn shape(&self, _key: &Bytes, reply: RespValue, sorted: bool) -> Result<Payload> {
        let flat = expect_bulk_array("HGETALL", reply)?;
        if flat.len() % 2 != 0 {
            return Err(Error::UnexpectedReply {
                command: "HGETALL",
                reply: format!("odd number of elements ({})", flat.len()),
            });
        }

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field, value));
        }
        if sorted {
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Ok(Payload::Hash(pairs))
    }

    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()> {
        let pairs = match payload {
            Payload::Hash(pairs) => pairs,
            other => return Err(kind_mismatch(key, Kind::Hash, other)),
        };
        if pairs.is_empty() {
            return Ok(());
        }

        // All fields in one command
        let mut cmd = Cmd::new("HSET").arg(key.clone());
        for (field, value) in pairs {
            cmd.push_arg(field.clone());
            cmd.push_arg(value.clone());
        }
        out.push(cmd);
        Ok(())
    }

    fn to_literal(&self, key: &Bytes, payload: &Payload, sorted: bool) -> Result<Literal> {
        let pairs = match payload {
            Payload::Hash(pairs) => pairs,
            other => return Err(kind_mismatch(key, Kind::Hash, other)),
        };

        let mut entries: Vec<(Literal, Literal)> = pairs
            .iter()
            .map(|(field, value)| (Literal::Bytes(field.clone()), Literal::Bytes(value.clone())))
            .collect();
        if sorted {
            entries.sort_by(|a, b| match (&a.0, &b.0) {
                (Literal::Bytes(x), Literal::Bytes(y)) => x.cmp(y),
                _ => std::cmp::Ordering::Equal,
            });
        }
        Ok(Literal::Dict(entries))
    }

    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload> {
        let entries = match value {
            Literal::Dict(entries) => entries,
            other => {
                return Err(Error::invalid_record(
                    key,
                    format!("hash value must be a dict, found {}", other.type_name()),
                ))
            }
        };

        entries
            .iter()
            .map(|(field, value)| {
                Ok((
                    literal_bytes(key, field, encoding, "field")?,
                    literal_bytes(key, value, encoding, "field value")?,
                ))
            })
            .collect::<Result<Vec<_>>>()
            .map(Payload::Hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_pairs_sorted() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("name"),
            RespValue::bulk_string("ferrum"),
            RespValue::bulk_string("age"),
            RespValue::bulk_string("3"),
        ]);
        let payload = HashCodec.shape(&Bytes::from("h"), reply, true).unwrap();
        assert_eq!(
            payload,
            Payload::Hash(vec![
                (Bytes::from("age"), Bytes::from("3")),
                (Bytes::from("name"), Bytes::from("ferrum")),
            ])
        );
    }

    #[test]
    fn test_write_single_hset() {
        let key = Bytes::from("h");
        let mut out = Vec::new();
        let payload = Payload::Hash(vec![
            (Bytes::from("f1"), Bytes::from("v1")),
            (Bytes::from("f2"), Bytes::from("v2")),
        ]);
        HashCodec.write_commands(&key, &payload, &mut out).unwrap();
        assert_eq!(
            out,
            vec![Cmd::new("HSET").arg("h").arg("f1").arg("v1").arg("f2").arg("v2")]
        );
    }

    #[test]
    fn test_literal_dict() {
        let key = Bytes::from("h");
        let payload = Payload::Hash(vec![
            (Bytes::from("z"), Bytes::from("1")),
            (Bytes::from("a"), Bytes::from("2")),
        ]);
        let lit = HashCodec.to_literal(&key, &payload, true).unwrap();
        assert_eq!(
            lit,
            Literal::Dict(vec![
                (Literal::bytes("a"), Literal::bytes("2")),
                (Literal::bytes("z"), Literal::bytes("1")),
            ])
        );

        let parsed = HashCodec.from_literal(&key, &lit, Encoding::Utf8).unwrap();
        assert_eq!(
            parsed,
            Payload::Hash(vec![
                (Bytes::from("a"), Bytes::from("2")),
                (Bytes::from("z"), Bytes::from("1")),
            ])
        );

        assert!(HashCodec
            .from_literal(&key, &Literal::List(vec![]), Encoding::Utf8)
            .is_err());
    }
}
