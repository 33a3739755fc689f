//! RESP2 protocol implementation
//!
//! This module handles parsing server replies and encoding commands in the
//! Redis Serialization Protocol (RESP2). It is independent from other modules.

mod types;
mod resp;

pub use types::{Cmd, RespValue, RespError};
pub use resp::{FrameScanner, RespEncoder, RespParser};
