//! Literal printer
//!
//! Compact output uses `,` and `:` separators with no whitespace. Pretty
//! output puts every list and dict entry on its own line, indented by two
//! spaces; tuples always stay on one line.

use super::Literal;

const INDENT: &str = "  ";

/// Print a literal in compact or pretty form
pub fn print(lit: &Literal, pretty: bool) -> String {
    let mut out = String::new();
    write_literal(&mut out, lit, pretty, 0);
    out
}

/// Byte string literal for arbitrary bytes: `b'...'` with escapes
pub fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('\'');
    out
}

fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn format_float(f: f64) -> String {
    if f.is_infinite() {
        // Overflows back to infinity when parsed
        let s = if f > 0.0 { "1e999" } else { "-1e999" };
        s.to_string()
    } else {
        // Debug keeps a fraction or exponent, so the value reads back as a float
        format!("{:?}", f)
    }
}

fn write_literal(out: &mut String, lit: &Literal, pretty: bool, depth: usize) {
    match lit {
        Literal::None => out.push_str("None"),
        Literal::Bool(true) => out.push_str("True"),
        Literal::Bool(false) => out.push_str("False"),
        Literal::Int(i) => out.push_str(&i.to_string()),
        Literal::Float(f) => out.push_str(&format_float(*f)),
        Literal::Bytes(b) => out.push_str(&quote_bytes(b)),
        Literal::Text(s) => out.push_str(&quote_text(s)),
        Literal::Tuple(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(if pretty { ", " } else { "," });
                }
                write_literal(out, item, false, depth);
            }
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Literal::List(items) => {
            write_container(out, '[', ']', items.iter(), pretty, depth, |out, item, depth| {
                write_literal(out, item, pretty, depth)
            });
        }
        Literal::Dict(entries) => {
            write_container(out, '{', '}', entries.iter(), pretty, depth, |out, (k, v), depth| {
                write_literal(out, k, pretty, depth);
                out.push_str(if pretty { ": " } else { ":" });
                write_literal(out, v, pretty, depth);
            });
        }
    }
}

fn write_container<I, T, F>(
    out: &mut String,
    open: char,
    close: char,
    items: I,
    pretty: bool,
    depth: usize,
    mut write_item: F,
) where
    I: ExactSizeIterator<Item = T>,
    F: FnMut(&mut String, T, usize),
{
    out.push(open);
    if items.len() == 0 {
        out.push(close);
        return;
    }

    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if pretty {
            out.push('\n');
            push_indent(out, depth + 1);
        }
        write_item(out, item, depth + 1);
    }
    if pretty {
        out.push('\n');
        push_indent(out, depth);
    }
    out.push(close);
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
