//! String codec (GET / SET)

use super::{expect_bulk, kind_mismatch, literal_bytes, Codec};
use crate::config::Encoding;
use crate::error::Result;
use crate::literal::Literal;
use crate::protocol::{Cmd, RespValue};
use crate::record::{Kind, Payload};
use bytes::Bytes;

/// Scalar binary-safe value
pub struct StringCodec;

impl Codec for StringCodec {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn read_command(&self, key: &Bytes) -> Cmd {
        Cmd::new("GET").arg(key.clone())
    }

    fn shape(&self, _key: &Bytes, reply: RespValue, _sorted: bool) -> Result<Payload> {
        // The key was checked to exist inside the same group, so GET cannot be null
        expect_bulk("GET", reply).map(Payload::String)
    }

    fn write_commands(&self, key: &Bytes, payload: &Payload, out: &mut Vec<Cmd>) -> Result<()> {
        match payload {
            Payload::String(value) => {
                out.push(Cmd::new("SET").arg(key.clone()).arg(value.clone()));
                Ok(())
            }
            other => Err(kind_mismatch(key, Kind::String, other)),
        }
    }

    fn to_literal(&self, key: &Bytes, payload: &Payload, _sorted: bool) -> Result<Literal> {
        match payload {
            Payload::String(value) => Ok(Literal::Bytes(value.clone())),
            other => Err(kind_mismatch(key, Kind::String, other)),
        }
    }

    fn from_literal(&self, key: &Bytes, value: &Literal, encoding: Encoding) -> Result<Payload> {
        literal_bytes(key, value, encoding, "value").map(Payload::String)
    }
}
