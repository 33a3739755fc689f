//! Command execution against a [`MemoryStore`]
//!
//! Replies mirror what a Redis server sends for the same command, including
//! `WRONGTYPE` errors.

use super::store::MemoryStore;
use super::value::Value;
use crate::codec::{format_score, parse_score};
use crate::protocol::{Cmd, RespValue};
use bytes::Bytes;
use std::collections::hash_map;
use tracing::{debug, warn};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

type Reply = std::result::Result<RespValue, String>;

/// Execute one command and produce its reply
///
/// Transaction control (WATCH, MULTI, EXEC) belongs to the client and is
/// rejected here.
pub fn execute(store: &mut MemoryStore, cmd: &Cmd) -> RespValue {
    debug!("Dispatching command: {}", cmd.name());
    let name = cmd.name().to_ascii_uppercase();
    let args = cmd.args();

    let result = match name.as_str() {
        "PING" => Ok(RespValue::simple_string("PONG")),
        "KEYS" => keys(store, args),
        "TYPE" => type_of(store, args),
        "TTL" => ttl(store, args),
        "GET" => get(store, args),
        "SET" => set(store, args),
        "DEL" => del(store, args),
        "EXPIREAT" => expireat(store, args),
        "LRANGE" => lrange(store, args),
        "RPUSH" => rpush(store, args),
        "SMEMBERS" => smembers(store, args),
        "SADD" => sadd(store, args),
        "ZRANGE" => zrange(store, args),
        "ZADD" => zadd(store, args),
        "HGETALL" => hgetall(store, args),
        "HSET" => hset(store, args),
        "FLUSHDB" => {
            store.clear();
            Ok(RespValue::ok())
        }
        _ => {
            warn!("Unknown command: {}", cmd.name());
            Err(format!("ERR unknown command '{}'", cmd.name()))
        }
    };

    match result {
        Ok(reply) => reply,
        Err(message) => RespValue::error(message),
    }
}

fn arity(name: &str, args: &[Bytes], min: usize, max: Option<usize>) -> Result<(), String> {
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(format!("ERR wrong number of arguments for '{}' command", name));
    }
    Ok(())
}

fn integer(arg: &Bytes) -> Result<i64, String> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "ERR value is not an integer or out of range".to_string())
}

fn bulk_array<'a, I: IntoIterator<Item = &'a Bytes>>(items: I) -> RespValue {
    RespValue::array(items.into_iter().cloned().map(RespValue::BulkString).collect())
}

/// Resolve a start/stop pair the way LRANGE and ZRANGE do
fn range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Glob match supporting `*` and `?`
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn keys(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("keys", args, 1, Some(1))?;
    let matched: Vec<Bytes> = store
        .keys()
        .into_iter()
        .filter(|key| glob_match(&args[0], key))
        .collect();
    Ok(bulk_array(&matched))
}

fn type_of(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("type", args, 1, Some(1))?;
    let name = store.get(&args[0]).map_or("none", Value::type_name);
    Ok(RespValue::simple_string(name))
}

fn ttl(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("ttl", args, 1, Some(1))?;
    Ok(RespValue::integer(store.ttl(&args[0])))
}

fn get(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("get", args, 1, Some(1))?;
    match store.get(&args[0]) {
        Some(Value::String(value)) => Ok(RespValue::BulkString(value.clone())),
        Some(_) => Err(WRONGTYPE.to_string()),
        None => Ok(RespValue::Null),
    }
}

fn set(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("set", args, 2, Some(2))?;
    store.set(args[0].clone(), Value::String(args[1].clone()));
    Ok(RespValue::ok())
}

fn del(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("del", args, 1, None)?;
    let removed = args.iter().filter(|key| store.delete(key)).count();
    Ok(RespValue::integer(removed as i64))
}

fn expireat(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("expireat", args, 2, Some(2))?;
    let at = integer(&args[1])?;
    Ok(RespValue::integer(store.expire_at(&args[0], at) as i64))
}

fn lrange(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("lrange", args, 3, Some(3))?;
    let (start, stop) = (integer(&args[1])?, integer(&args[2])?);
    match store.get(&args[0]) {
        Some(Value::List(list)) => Ok(match range(list.len(), start, stop) {
            Some((from, to)) => bulk_array(list.range(from..=to)),
            None => RespValue::array(Vec::new()),
        }),
        Some(_) => Err(WRONGTYPE.to_string()),
        None => Ok(RespValue::array(Vec::new())),
    }
}

fn rpush(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("rpush", args, 2, None)?;
    let key = &args[0];
    let len = match store.get_or_insert(key, || Value::list(Vec::<Bytes>::new())) {
        Value::List(list) => {
            list.extend(args[1..].iter().cloned());
            list.len()
        }
        _ => return Err(WRONGTYPE.to_string()),
    };
    store.touch(key);
    Ok(RespValue::integer(len as i64))
}

fn smembers(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("smembers", args, 1, Some(1))?;
    match store.get(&args[0]) {
        Some(Value::Set(set)) => Ok(bulk_array(set.iter())),
        Some(_) => Err(WRONGTYPE.to_string()),
        None => Ok(RespValue::array(Vec::new())),
    }
}

fn sadd(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("sadd", args, 2, None)?;
    let key = &args[0];
    let added = match store.get_or_insert(key, || Value::set(Vec::<Bytes>::new())) {
        Value::Set(set) => args[1..]
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count(),
        _ => return Err(WRONGTYPE.to_string()),
    };
    store.touch(key);
    Ok(RespValue::integer(added as i64))
}

fn zrange(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("zrange", args, 3, Some(4))?;
    let (start, stop) = (integer(&args[1])?, integer(&args[2])?);
    let with_scores = match args.get(3) {
        Some(flag) if flag.eq_ignore_ascii_case(b"WITHSCORES") => true,
        Some(_) => return Err("ERR syntax error".to_string()),
        None => false,
    };

    let members = match store.get(&args[0]) {
        Some(Value::ZSet(members)) => members,
        Some(_) => return Err(WRONGTYPE.to_string()),
        None => return Ok(RespValue::array(Vec::new())),
    };
    let ordered = Value::zset_ordered(members);
    let Some((from, to)) = range(ordered.len(), start, stop) else {
        return Ok(RespValue::array(Vec::new()));
    };

    let mut items = Vec::new();
    for (member, score) in &ordered[from..=to] {
        items.push(RespValue::BulkString((*member).clone()));
        if with_scores {
            items.push(RespValue::bulk_string(reply_score(*score)));
        }
    }
    Ok(RespValue::array(items))
}

/// Scores are replied as `inf` / `-inf` rather than the ZADD spelling
fn reply_score(score: f64) -> String {
    if score == f64::INFINITY {
        "inf".to_string()
    } else {
        format_score(score)
    }
}

fn zadd(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("zadd", args, 3, None)?;
    if args.len() % 2 == 0 {
        return Err("ERR syntax error".to_string());
    }
    let mut pairs = Vec::with_capacity(args.len() / 2);
    for chunk in args[1..].chunks(2) {
        let score =
            parse_score(&chunk[0]).ok_or_else(|| "ERR value is not a valid float".to_string())?;
        pairs.push((chunk[1].clone(), score));
    }

    let key = &args[0];
    let added = match store.get_or_insert(key, || Value::zset(Vec::<(Bytes, f64)>::new())) {
        Value::ZSet(members) => pairs
            .into_iter()
            .filter(|(member, score)| members.insert(member.clone(), *score).is_none())
            .count(),
        _ => return Err(WRONGTYPE.to_string()),
    };
    store.touch(key);
    Ok(RespValue::integer(added as i64))
}

fn hgetall(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("hgetall", args, 1, Some(1))?;
    match store.get(&args[0]) {
        Some(Value::Hash(hash)) => Ok(bulk_array(hash.iter().flat_map(|(f, v)| [f, v]))),
        Some(_) => Err(WRONGTYPE.to_string()),
        None => Ok(RespValue::array(Vec::new())),
    }
}

fn hset(store: &mut MemoryStore, args: &[Bytes]) -> Reply {
    arity("hset", args, 3, None)?;
    if args.len() % 2 == 0 {
        return Err("ERR wrong number of arguments for 'hset' command".to_string());
    }

    let key = &args[0];
    let added = match store.get_or_insert(key, || Value::hash(Vec::<(Bytes, Bytes)>::new())) {
        Value::Hash(hash) => args[1..]
            .chunks(2)
            .filter(|pair| match hash.entry(pair[0].clone()) {
                hash_map::Entry::Occupied(mut slot) => {
                    slot.insert(pair[1].clone());
                    false
                }
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(pair[1].clone());
                    true
                }
            })
            .count(),
        _ => return Err(WRONGTYPE.to_string()),
    };
    store.touch(key);
    Ok(RespValue::integer(added as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(store: &mut MemoryStore, cmd: Cmd) -> RespValue {
        execute(store, &cmd)
    }

    #[test]
    fn test_string_commands() {
        let mut store = MemoryStore::new();
        assert_eq!(run(&mut store, Cmd::new("SET").arg("k").arg("v")), RespValue::ok());
        assert_eq!(run(&mut store, Cmd::new("GET").arg("k")), RespValue::bulk_string("v"));
        assert_eq!(run(&mut store, Cmd::new("GET").arg("nope")), RespValue::Null);
        assert_eq!(
            run(&mut store, Cmd::new("TYPE").arg("k")),
            RespValue::simple_string("string")
        );
        assert_eq!(
            run(&mut store, Cmd::new("TYPE").arg("nope")),
            RespValue::simple_string("none")
        );
    }

    #[test]
    fn test_wrong_type() {
        let mut store = MemoryStore::new();
        run(&mut store, Cmd::new("RPUSH").arg("l").arg("a"));
        let reply = run(&mut store, Cmd::new("GET").arg("l"));
        assert!(matches!(reply, RespValue::Error(ref e) if e.starts_with("WRONGTYPE")));
        let reply = run(&mut store, Cmd::new("SADD").arg("l").arg("a"));
        assert!(reply.is_error());
    }

    #[test]
    fn test_lrange_bounds() {
        let mut store = MemoryStore::new();
        run(&mut store, Cmd::new("RPUSH").arg("l").arg("a").arg("b").arg("c"));

        let all = run(&mut store, Cmd::new("LRANGE").arg("l").arg("0").arg("-1"));
        assert_eq!(
            all,
            RespValue::array(vec![
                RespValue::bulk_string("a"),
                RespValue::bulk_string("b"),
                RespValue::bulk_string("c"),
            ])
        );
        let tail = run(&mut store, Cmd::new("LRANGE").arg("l").arg("-2").arg("10"));
        assert_eq!(
            tail,
            RespValue::array(vec![RespValue::bulk_string("b"), RespValue::bulk_string("c")])
        );
        let none = run(&mut store, Cmd::new("LRANGE").arg("l").arg("5").arg("9"));
        assert_eq!(none, RespValue::array(vec![]));
    }

    #[test]
    fn test_zset_ordering_and_scores() {
        let mut store = MemoryStore::new();
        let added = run(
            &mut store,
            Cmd::new("ZADD").arg("z").arg("2.5").arg("b").arg("-inf").arg("a").arg("+inf").arg("c"),
        );
        assert_eq!(added, RespValue::integer(3));

        let reply = run(
            &mut store,
            Cmd::new("ZRANGE").arg("z").arg("0").arg("-1").arg("WITHSCORES"),
        );
        assert_eq!(
            reply,
            RespValue::array(vec![
                RespValue::bulk_string("a"),
                RespValue::bulk_string("-inf"),
                RespValue::bulk_string("b"),
                RespValue::bulk_string("2.5"),
                RespValue::bulk_string("c"),
                RespValue::bulk_string("inf"),
            ])
        );

        let bad = run(&mut store, Cmd::new("ZADD").arg("z").arg("nan").arg("x"));
        assert!(bad.is_error());
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let mut store = MemoryStore::new();
        let first = run(&mut store, Cmd::new("HSET").arg("h").arg("f").arg("1"));
        assert_eq!(first, RespValue::integer(1));
        let second = run(
            &mut store,
            Cmd::new("HSET").arg("h").arg("f").arg("2").arg("g").arg("3"),
        );
        assert_eq!(second, RespValue::integer(1));

        let RespValue::Array(flat) = run(&mut store, Cmd::new("HGETALL").arg("h")) else {
            panic!("expected array");
        };
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn test_del_and_keys() {
        let mut store = MemoryStore::new();
        run(&mut store, Cmd::new("SET").arg("user:1").arg("a"));
        run(&mut store, Cmd::new("SET").arg("user:2").arg("b"));
        run(&mut store, Cmd::new("SET").arg("other").arg("c"));

        let users = run(&mut store, Cmd::new("KEYS").arg("user:?"));
        assert_eq!(
            users,
            RespValue::array(vec![
                RespValue::bulk_string("user:1"),
                RespValue::bulk_string("user:2"),
            ])
        );

        let removed = run(&mut store, Cmd::new("DEL").arg("user:1").arg("missing"));
        assert_eq!(removed, RespValue::integer(1));
        assert_eq!(run(&mut store, Cmd::new("FLUSHDB")), RespValue::ok());
        assert_eq!(run(&mut store, Cmd::new("KEYS").arg("*")), RespValue::array(vec![]));
    }

    #[test]
    fn test_unknown_and_arity_errors() {
        let mut store = MemoryStore::new();
        assert!(run(&mut store, Cmd::new("MULTI")).is_error());
        assert!(run(&mut store, Cmd::new("GET")).is_error());
        assert!(run(&mut store, Cmd::new("EXPIREAT").arg("k").arg("soon")).is_error());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"a*c", b"abbbc"));
        assert!(!glob_match(b"a?c", b"ac"));
    }
}
