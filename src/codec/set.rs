//! Set codec (SMEMBERS / SADD)

use super::{byte_list_literal, expect_bulk_array, kind_mismatch, literal_byte_list, Codec};
use crate::config::Encoding;
use crate::error::Result;
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Unordered collection of unique members, written to dumps as a list
pub struct SetCodec;

impl Codec for SetCodec {
    fn kind(&self) -> Kind {
        Kind::Set
    }

    fn read_command(&self, key: &Bytes) -> Cmd {
        Cmd::new("SMEMBERS").arg(key.clone())
    }

    fn shape(&self, _key: &Bytes, reply: RespValue, sorted: bool) -> Result<Payload> {
        let mut members = expect_bulk_array("SMEMBERS", reply)?;
        if sorted {
            members.sort();
        }
        Ok(Payload::Set(members))
    }

    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()> {
        let members = match payload {
            Payload::Set(members) => members,
            other => return Err(kind_mismatch(key, Kind::Set, other)),
        };
        if members.is_empty() {
            return Ok(());
        }

        let mut cmd = Cmd::new("SADD").arg(key.clone());
        for member in members {
            cmd.push_arg(member.clone());
        }
        out.push(cmd);
        Ok(())
    }

    fn to_literal(&self, key: &Bytes, payload: &Payload, sorted: bool) -> Result<Literal> {
        match payload {
            Payload::Set(members) if sorted => {
                let mut members = members.clone();
                members.sort();
                Ok(byte_list_literal(&members))
            }
            Payload::Set(members) => Ok(byte_list_literal(members)),
            other => Err(kind_mismatch(key, Kind::Set, other)),
        }
    }

    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload> {
        literal_byte_list(key, value, encoding).map(Payload::Set)
    }
}
