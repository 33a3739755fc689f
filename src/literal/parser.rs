//! Literal parser
//!
//! A recursive descent parser over the restricted literal grammar. Input is
//! only ever turned into data: identifiers other than `None`, `True` and
//! `False`, calls, operators and set literals are rejected.

use super::Literal;
use crate::error::{Error, Result};
use bytes::Bytes;

/// Nesting limit, well above what a dump needs
const MAX_DEPTH: usize = 64;

/// Parse a complete literal; trailing non-whitespace is an error
pub fn parse(input: &str) -> Result<Literal> {
    let mut parser = Parser { src: input, pos: 0 };
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing data"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.pos, message)
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0c => self.pos += 1,
                b'#' => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Literal> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.skip_ws();
        let b = match self.peek() {
            Some(b) => b,
            None => return Err(self.error("unexpected end of input")),
        };

        match b {
            b'{' => self.dict(depth),
            b'[' => {
                self.pos += 1;
                let items = self.sequence(b']', depth)?.0;
                Ok(Literal::List(items))
            }
            b'(' => self.tuple(depth),
            b'\'' | b'"' => self.text(),
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number(),
            b if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            other => Err(self.error(format!("unexpected character '{}'", other as char))),
        }
    }

    /// Comma separated values up to `close`; reports whether a comma was seen
    fn sequence(&mut self, close: u8, depth: usize) -> Result<(Vec<Literal>, bool)> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, saw_comma));
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    saw_comma = true;
                }
                Some(b) if b == close => {}
                _ => return Err(self.error(format!("expected ',' or '{}'", close as char))),
            }
        }
    }

    fn tuple(&mut self, depth: usize) -> Result<Literal> {
        self.pos += 1;
        let (mut items, saw_comma) = self.sequence(b')', depth)?;
        // `(x)` is just a parenthesized value
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Literal::Tuple(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Literal> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Literal::Dict(entries));
            }
            let key = self.value(depth + 1)?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':' (set literals are not supported)"));
            }
            self.pos += 1;
            let value = self.value(depth + 1)?;
            entries.push((key, value));

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    /// `None`, `True`, `False`, or a prefixed string such as `b'...'`
    fn word(&mut self) -> Result<Literal> {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let word = &src[start..self.pos];

        if matches!(self.peek(), Some(b'\'') | Some(b'"')) {
            return match word {
                "b" | "B" => self.byte_string(),
                "u" | "U" => self.text(),
                _ => {
                    self.pos = start;
                    Err(self.error(format!("unsupported string prefix '{}'", word)))
                }
            };
        }

        match word {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            _ => {
                self.pos = start;
                Err(self.error(format!("names are not allowed: '{}'", word)))
            }
        }
    }

    fn number(&mut self) -> Result<Literal> {
        let src = self.src;
        let start = self.pos;
        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
            self.skip_ws();
        }
        let digits_start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.bytes().get(self.pos + 1), Some(b'-') | Some(b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        if self.pos == digits_start {
            self.pos = start;
            return Err(self.error("expected a number"));
        }
        if matches!(self.peek(), Some(b) if b.is_ascii_alphabetic() || b == b'_') {
            return Err(self.error("invalid numeric literal"));
        }

        let negative = self.bytes()[start] == b'-';
        let digits = &src[digits_start..self.pos];
        if is_float {
            let value: f64 = digits.parse().map_err(|_| {
                Error::parse(start, format!("invalid float '{}'", digits))
            })?;
            Ok(Literal::Float(if negative { -value } else { value }))
        } else {
            let text = if negative { format!("-{}", digits) } else { digits.to_string() };
            let value: i64 = text.parse().map_err(|_| {
                Error::parse(start, format!("integer out of range '{}'", text))
            })?;
            Ok(Literal::Int(value))
        }
    }

    /// Consume an opening quote, return it
    fn open_quote(&mut self) -> u8 {
        let quote = self.bytes()[self.pos];
        self.pos += 1;
        quote
    }

    fn byte_string(&mut self) -> Result<Literal> {
        let quote = self.open_quote();
        let mut out = Vec::new();
        loop {
            let b = match self.peek() {
                Some(b) => b,
                None => return Err(self.error("unterminated byte string")),
            };
            match b {
                b if b == quote => {
                    self.pos += 1;
                    return Ok(Literal::Bytes(Bytes::from(out)));
                }
                b'\n' => return Err(self.error("newline in byte string")),
                b'\\' => {
                    self.pos += 1;
                    self.escape(false)?.push_bytes(&mut out);
                }
                0x00..=0x7f => {
                    out.push(b);
                    self.pos += 1;
                }
                _ => return Err(self.error("non-ASCII character in byte string")),
            }
        }
    }

    fn text(&mut self) -> Result<Literal> {
        let quote = self.open_quote();
        let mut out = String::new();
        loop {
            let c = match self.src[self.pos..].chars().next() {
                Some(c) => c,
                None => return Err(self.error("unterminated string")),
            };
            match c {
                c if c == quote as char => {
                    self.pos += 1;
                    return Ok(Literal::Text(out));
                }
                '\n' => return Err(self.error("newline in string")),
                '\\' => {
                    self.pos += 1;
                    self.escape(true)?.push_text(&mut out);
                }
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    /// Decode the escape sequence after a backslash
    fn escape(&mut self, text: bool) -> Result<Escaped> {
        let b = match self.peek() {
            Some(b) => b,
            None => return Err(self.error("unterminated escape sequence")),
        };
        self.pos += 1;
        let escaped = match b {
            b'\n' => Escaped::Nothing,
            b'\\' => Escaped::Byte(b'\\'),
            b'\'' => Escaped::Byte(b'\''),
            b'"' => Escaped::Byte(b'"'),
            b'a' => Escaped::Byte(0x07),
            b'b' => Escaped::Byte(0x08),
            b'f' => Escaped::Byte(0x0c),
            b'n' => Escaped::Byte(b'\n'),
            b'r' => Escaped::Byte(b'\r'),
            b't' => Escaped::Byte(b'\t'),
            b'v' => Escaped::Byte(0x0b),
            b'x' => {
                let code = self.hex_digits(2)?;
                if text {
                    Escaped::Char(char::from(code as u8))
                } else {
                    Escaped::Byte(code as u8)
                }
            }
            b'0'..=b'7' => {
                let mut code = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                if text {
                    Escaped::Char(char::from_u32(code).ok_or_else(|| self.error("invalid octal escape"))?)
                } else {
                    Escaped::Byte((code & 0xff) as u8)
                }
            }
            b'u' if text => self.unicode_escape(4)?,
            b'U' if text => self.unicode_escape(8)?,
            other => {
                // Unknown escapes keep the backslash
                self.pos -= 1;
                if text {
                    let c = self.src[self.pos..].chars().next().unwrap_or(other as char);
                    self.pos += c.len_utf8();
                    return Ok(Escaped::Pair('\\', c));
                }
                if !other.is_ascii() {
                    return Err(self.error("non-ASCII character in byte string"));
                }
                self.pos += 1;
                return Ok(Escaped::BytePair(b'\\', other));
            }
        };
        Ok(escaped)
    }

    fn unicode_escape(&mut self, len: usize) -> Result<Escaped> {
        let code = self.hex_digits(len)?;
        char::from_u32(code)
            .map(Escaped::Char)
            .ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn hex_digits(&mut self, len: usize) -> Result<u32> {
        let end = self.pos + len;
        let digits = self
            .src
            .get(self.pos..end)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("truncated hex escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        Ok(code)
    }
}

/// Result of decoding one escape sequence
enum Escaped {
    /// Line continuation
    Nothing,
    Byte(u8),
    Char(char),
    /// Unknown escape in a byte string, kept verbatim
    BytePair(u8, u8),
    /// Unknown escape in a text string, kept verbatim
    Pair(char, char),
}

impl Escaped {
    fn push_bytes(self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        match self {
            Escaped::Nothing => {}
            Escaped::Byte(b) => out.push(b),
            Escaped::Char(c) => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            Escaped::BytePair(a, b) => out.extend_from_slice(&[a, b]),
            Escaped::Pair(a, c) => {
                out.push(a as u8);
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    fn push_text(self, out: &mut String) {
        match self {
            Escaped::Nothing => {}
            Escaped::Byte(b) => out.push(char::from(b)),
            Escaped::Char(c) => out.push(c),
            Escaped::BytePair(a, b) => {
                out.push(char::from(a));
                out.push(char::from(b));
            }
            Escaped::Pair(a, c) => {
                out.push(a);
                out.push(c);
            }
        }
    }
}
