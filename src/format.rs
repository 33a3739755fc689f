//! Dump text format
//!
//! A dump is one literal dict mapping each key to
//! `{'type': tag, 'expireat': timestamp or None, 'value': ...}`, where the
//! value layout is chosen by the codec of the kind. Keys and values are
//! written as byte strings so nothing depends on a text encoding.

use crate::codec::CodecRegistry;
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::literal::{self, Literal};
use crate::record::{Record, Table};
use bytes::Bytes;
use tracing::warn;

const TYPE_FIELD: &str = "type";
const EXPIRE_FIELD: &str = "expireat";
const VALUE_FIELD: &str = "value";

/// Serialize a table in compact or pretty form
///
/// Pretty output sorts record fields, hash fields and set members so that
/// the same data always prints the same way. Both forms parse back to the
/// same table.
pub fn to_text(table: &Table, registry: &CodecRegistry, pretty: bool) -> Result<String> {
    let mut entries = Vec::with_capacity(table.len());
    for record in table.values() {
        entries.push((Literal::Bytes(record.key.clone()), record_literal(record, registry, pretty)?));
    }
    Ok(literal::print(&Literal::Dict(entries), pretty))
}

fn record_literal(record: &Record, registry: &CodecRegistry, pretty: bool) -> Result<Literal> {
    let codec = registry.get(record.kind().tag())?;
    let kind = Literal::text(record.kind().tag());
    let expire_at = record.expire_at.map_or(Literal::None, Literal::Int);
    let value = codec.to_literal(&record.key, &record.payload, pretty)?;

    let fields = if pretty {
        vec![
            (Literal::text(EXPIRE_FIELD), expire_at),
            (Literal::text(TYPE_FIELD), kind),
            (Literal::text(VALUE_FIELD), value),
        ]
    } else {
        vec![
            (Literal::text(TYPE_FIELD), kind),
            (Literal::text(EXPIRE_FIELD), expire_at),
            (Literal::text(VALUE_FIELD), value),
        ]
    };
    Ok(Literal::Dict(fields))
}

/// Parse dump text back into a table
///
/// Every kind tag is resolved through the registry here, so a dump naming
/// an unsupported kind fails with `UnknownType` before anything is written.
pub fn from_text(text: &str, registry: &CodecRegistry, encoding: Encoding) -> Result<Table> {
    let entries = match literal::parse(text)? {
        Literal::Dict(entries) => entries,
        other => {
            return Err(Error::parse(
                0,
                format!("dump must be a dict, found {}", other.type_name()),
            ))
        }
    };

    let mut table = Table::new();
    for (key, value) in entries {
        let key = key.to_bytes(encoding).ok_or_else(|| {
            Error::parse(0, format!("dump keys must be strings, found {}", key.type_name()))
        })?;
        let record = parse_record(key, value, registry, encoding)?;
        table.insert(record.key.clone(), record);
    }
    Ok(table)
}

fn parse_record(
    key: Bytes,
    value: Literal,
    registry: &CodecRegistry,
    encoding: Encoding,
) -> Result<Record> {
    let fields = match value {
        Literal::Dict(fields) => fields,
        other => {
            return Err(Error::invalid_record(
                &key,
                format!("record must be a dict, found {}", other.type_name()),
            ))
        }
    };

    let mut tag = None;
    let mut expire_at = None;
    let mut payload_literal = None;
    for (name, field) in fields {
        let name = match &name {
            Literal::Text(name) => name.as_str(),
            other => {
                return Err(Error::invalid_record(
                    &key,
                    format!("field names must be text, found {}", other.type_name()),
                ))
            }
        };
        match name {
            "type" | "kind" => match field {
                Literal::Text(t) => tag = Some(t),
                Literal::Bytes(b) => tag = Some(String::from_utf8_lossy(&b).into_owned()),
                other => {
                    return Err(Error::invalid_record(
                        &key,
                        format!("type must be a string, found {}", other.type_name()),
                    ))
                }
            },
            "expireat" | "expiration" => match field {
                Literal::None => expire_at = None,
                // Older dumps write 0 for keys without an expiration
                Literal::Int(0) => {
                    warn!("{}: expireat 0 read as no expiration", literal::quote_bytes(&key));
                    expire_at = None;
                }
                Literal::Int(ts) => expire_at = Some(ts),
                other => {
                    return Err(Error::invalid_record(
                        &key,
                        format!("expireat must be an int or None, found {}", other.type_name()),
                    ))
                }
            },
            "value" => payload_literal = Some(field),
            other => {
                return Err(Error::invalid_record(&key, format!("unknown field '{}'", other)))
            }
        }
    }

    let tag = tag.ok_or_else(|| Error::invalid_record(&key, "missing type"))?;
    let payload_literal =
        payload_literal.ok_or_else(|| Error::invalid_record(&key, "missing value"))?;

    let codec = registry.get(&tag)?;
    let payload = codec.from_literal(&key, &payload_literal, encoding)?;
    Ok(Record {
        key,
        expire_at,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{into_table, Payload};

    fn sample_table() -> Table {
        into_table(vec![
            Record::new(Bytes::from_static(b"str\x00\xff"), Payload::String(Bytes::from("it's \"quoted\"\n")))
                .with_expiration(1_700_000_100),
            Record::new("list", Payload::List(vec![Bytes::from("b"), Bytes::from("a"), Bytes::from("b")])),
            Record::new("set", Payload::Set(vec![Bytes::from("x"), Bytes::from("y")])),
            Record::new(
                "zset",
                Payload::ZSet(vec![
                    (Bytes::from("lo"), f64::NEG_INFINITY),
                    (Bytes::from("mid"), 0.25),
                    (Bytes::from("hi"), 1e300),
                ]),
            ),
            Record::new(
                "hash",
                Payload::Hash(vec![
                    (Bytes::from("f1"), Bytes::from_static(b"\x01")),
                    (Bytes::from("f2"), Bytes::new()),
                ]),
            ),
        ])
    }

    #[test]
    fn test_round_trip_compact_and_pretty() {
        let registry = CodecRegistry::new();
        let table = sample_table();
        for pretty in [false, true] {
            let text = to_text(&table, &registry, pretty).unwrap();
            let parsed = from_text(&text, &registry, Encoding::Utf8).unwrap();
            assert_eq!(parsed, table, "pretty = {}", pretty);
        }
    }

    #[test]
    fn test_compact_has_no_whitespace_outside_strings() {
        let registry = CodecRegistry::new();
        let table = into_table(vec![Record::new("k", Payload::List(vec![Bytes::from("v")]))]);
        assert_eq!(
            to_text(&table, &registry, false).unwrap(),
            "{b'k':{'type':'list','expireat':None,'value':[b'v']}}"
        );
    }

    #[test]
    fn test_pretty_is_deterministic() {
        let registry = CodecRegistry::new();
        let a = into_table(vec![Record::new(
            "s",
            Payload::Set(vec![Bytes::from("2"), Bytes::from("1")]),
        )]);
        let b = into_table(vec![Record::new(
            "s",
            Payload::Set(vec![Bytes::from("1"), Bytes::from("2")]),
        )]);
        let text = to_text(&a, &registry, true).unwrap();
        assert_eq!(text, to_text(&b, &registry, true).unwrap());
        assert_eq!(
            text,
            "{\n  b's': {\n    'expireat': None,\n    'type': 'set',\n    'value': [\n      b'1',\n      b'2'\n    ]\n  }\n}"
        );
    }

    #[test]
    fn test_loads_text_dumps_and_aliases() {
        let registry = CodecRegistry::new();
        let text = "{'caf\\xe9': {'kind': 'string', 'expiration': 5, 'value': 'cr\\xe8me'}}";

        let table = from_text(text, &registry, Encoding::Latin1).unwrap();
        let record = &table[&Bytes::from_static(b"caf\xe9")];
        assert_eq!(record.expire_at, Some(5));
        assert_eq!(record.payload, Payload::String(Bytes::from_static(b"cr\xe8me")));

        let table = from_text(text, &registry, Encoding::Utf8).unwrap();
        assert!(table.contains_key(&Bytes::from("café")));
    }

    #[test]
    fn test_zero_expireat_means_no_expiration() {
        let registry = CodecRegistry::new();
        let text = "{b'k': {'type': 'string', 'expireat': 0, 'value': b'v'}}";
        let table = from_text(text, &registry, Encoding::Utf8).unwrap();
        assert_eq!(table[&Bytes::from("k")].expire_at, None);
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let registry = CodecRegistry::new();
        let text = "{b'k': {'type': 'stream', 'expireat': None, 'value': []}}";
        assert!(matches!(
            from_text(text, &registry, Encoding::Utf8),
            Err(Error::UnknownType(tag)) if tag == "stream"
        ));
    }

    #[test]
    fn test_invalid_records() {
        let registry = CodecRegistry::new();
        for text in [
            "[]",
            "{b'k': []}",
            "{b'k': {'value': b'v'}}",
            "{b'k': {'type': 'string'}}",
            "{b'k': {'type': 'string', 'value': b'v', 'extra': 1}}",
            "{b'k': {'type': 'string', 'expireat': 1.5, 'value': b'v'}}",
            "{b'k': {'type': 'hash', 'value': [b'v']}}",
            "{1: {'type': 'string', 'value': b'v'}}",
        ] {
            assert!(from_text(text, &registry, Encoding::Utf8).is_err(), "accepted {}", text);
        }
    }

    #[test]
    fn test_empty_dump() {
        let registry = CodecRegistry::new();
        assert_eq!(to_text(&Table::new(), &registry, false).unwrap(), "{}");
        assert!(from_text("{}", &registry, Encoding::Utf8).unwrap().is_empty());
    }
}
