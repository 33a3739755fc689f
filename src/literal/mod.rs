//! Literal data format
//!
//! Dumps are written as a single literal data structure in a restricted
//! Python-literal grammar: byte strings, text strings, integers, floats,
//! `None`, booleans, lists, tuples and dicts. Nothing in the input is ever
//! evaluated; anything outside this grammar is a parse error.

mod parser;
mod printer;

pub use parser::parse;
pub use printer::{print, quote_bytes};

use crate::config::Encoding;
use bytes::Bytes;

/// A parsed or to-be-printed literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `b'...'`, taken verbatim
    Bytes(Bytes),
    /// `'...'`, turned into bytes with the load encoding
    Text(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    /// Entries in source order
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    pub fn bytes(b: impl Into<Bytes>) -> Self {
        Literal::Bytes(b.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Literal::Text(s.into())
    }

    /// Binary value of a byte or text string
    pub fn to_bytes(&self, encoding: Encoding) -> Option<Bytes> {
        match self {
            Literal::Bytes(b) => Some(b.clone()),
            Literal::Text(s) => encoding.encode(s).map(Bytes::from),
            _ => None,
        }
    }

    /// Numeric value of an int or float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Elements of a list or tuple
    pub fn as_sequence(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Short name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::None => "None",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Bytes(_) => "bytes",
            Literal::Text(_) => "str",
            Literal::List(_) => "list",
            Literal::Tuple(_) => "tuple",
            Literal::Dict(_) => "dict",
        }
    }
}
