//! Sorted set codec (ZRANGE WITHSCORES / ZADD)

use super::{expect_bulk_array, kind_mismatch, literal_bytes, literal_sequence, Codec};
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Members with scores, read in ascending score order
pub struct ZSetCodec;

/// Parse a score as replied by the server (`1.5`, `inf`, `-inf`)
pub(crate) fn parse_score(raw: &[u8]) -> Option<f64> {
    let score: f64 = std::str::from_utf8(raw).ok()?.trim().parse().ok()?;
    if score.is_nan() {
        None
    } else {
        Some(score)
    }
}

/// Format a score as a ZADD argument
pub(crate) fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

impl Codec for ZSetCodec {
    fn kind(&self) -> Kind {
        Kind::ZSet
    }

    fn read_command(&self, key: &Bytes) -> Cmd {
        Cmd::new("ZRANGE")
            .arg(key.clone())
            .arg("0")
            .arg("-1")
            .arg("WITHSCORES")
    }

    fn shape(&self, key: &Bytes, reply: RespValue, _sorted: bool) -> Result<Payload> {
        let flat = expect_bulk_array("ZRANGE", reply)?;
        if flat.len() % 2 != 0 {
            return Err(Error::UnexpectedReply {
                command: "ZRANGE",
                reply: format!("odd number of elements ({})", flat.len()),
            });
        }

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(member), Some(raw_score)) = (iter.next(), iter.next()) {
            let score = parse_score(&raw_score).ok_or_else(|| {
                Error::invalid_record(key, format!("invalid score {:?}", raw_score))
            })?;
            pairs.push((member, score));
        }
        Ok(Payload::ZSet(pairs))
    }

    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()> {
        let pairs = match payload {
            Payload::ZSet(pairs) => pairs,
            other => return Err(kind_mismatch(key, Kind::ZSet, other)),
        };
        if pairs.is_empty() {
            return Ok(());
        }

        let mut cmd = Cmd::new("ZADD").arg(key.clone());
        for (member, score) in pairs {
            cmd.push_arg(format_score(*score));
            cmd.push_arg(member.clone());
        }
        out.push(cmd);
        Ok(())
    }

    fn to_literal(&self, key: &Bytes, payload: &Payload, _sorted: bool) -> Result<Literal> {
        match payload {
            Payload::ZSet(pairs) => Ok(Literal::List(
                pairs
                    .iter()
                    .map(|(member, score)| {
                        Literal::Tuple(vec![Literal::Bytes(member.clone()), Literal::Float(*score)])
                    })
                    .collect(),
            )),
            other => Err(kind_mismatch(key, Kind::ZSet, other)),
        }
    }

    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload> {
        let mut pairs = Vec::new();
        for item in literal_sequence(key, value)? {
            match item.as_sequence() {
                Some([member, score]) => {
                    let member = literal_bytes(key, member, encoding, "member")?;
                    let score = score.as_f64().ok_or_else(|| {
                        Error::invalid_record(
                            key,
                            format!("score must be a number, found {}", score.type_name()),
                        )
                    })?;
                    pairs.push((member, score));
                }
                _ => {
                    return Err(Error::invalid_record(
                        key,
                        "sorted set entries must be (member, score) pairs",
                    ))
                }
            }
        }
        Ok(Payload::ZSet(pairs))
    }
}
