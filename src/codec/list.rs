//! List codec (LRANGE / RPUSH)

use super::{byte_list_literal, expect_bulk_array, kind_mismatch, literal_byte_list, Codec};
use crate::config::Encoding;
use crate::error::Result;
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Ordered sequence of elements
pub struct ListCodec;

impl Codec for ListCodec {
    fn kind(&self) -> Kind {
        Kind::List
    }

    fn read_command(&self, key: &Bytes) -> Cmd {
        Cmd::new("LRANGE").arg(key.clone()).arg("0").arg("-1")
    }

    fn shape(&self, _key: &Bytes, reply: RespValue, _sorted: bool) -> Result<Payload> {
        expect_bulk_array("LRANGE", reply).map(Payload::List)
    }

    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()> {
        let elements = match payload {
            Payload::List(elements) => elements,
            other => return Err(kind_mismatch(key, Kind::List, other)),
        };
        if elements.is_empty() {
            return Ok(());
        }

        // Appends in order, so the restored list matches element for element
        let mut cmd = Cmd::new("RPUSH").arg(key.clone());
        for element in elements {
            cmd.push_arg(element.clone());
        }
        out.push(cmd);
        Ok(())
    }

    fn to_literal(&self, key: &Bytes, payload: &Payload, _sorted: bool) -> Result<Literal> {
        match payload {
            Payload::List(elements) => Ok(byte_list_literal(elements)),
            other => Err(kind_mismatch(key, Kind::List, other)),
        }
    }

    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload> {
        literal_byte_list(key, value, encoding).map(Payload::List)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_keeps_order() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("c"),
            RespValue::bulk_string("a"),
            RespValue::bulk_string("c"),
        ]);
        let payload = ListCodec.shape(&Bytes::from("l"), reply, true).unwrap();
        assert_eq!(
            payload,
            Payload::List(vec![Bytes::from("c"), Bytes::from("a"), Bytes::from("c")])
        );
    }

    #[test]
    fn test_write_single_rpush() {
        let key = Bytes::from("l");
        let mut out = Vec::new();
        let payload = Payload::List(vec![Bytes::from("x"), Bytes::from("y")]);
        ListCodec.write_commands(&key, &payload, &mut out).unwrap();
        assert_eq!(out, vec![Cmd::new("RPUSH").arg("l").arg("x").arg("y")]);

        out.clear();
        ListCodec.write_commands(&key, &Payload::List(vec![]), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_from_literal_accepts_tuple_and_text() {
        let key = Bytes::from("l");
        let lit = Literal::Tuple(vec![Literal::bytes("a"), Literal::text("b")]);
        assert_eq!(
            ListCodec.from_literal(&key, &lit, Encoding::Utf8).unwrap(),
            Payload::List(vec![Bytes::from("a"), Bytes::from("b")])
        );
        assert!(ListCodec
            .from_literal(&key, &Literal::bytes("ab"), Encoding::Utf8)
            .is_err());
    }
}
