//! PHP-serialized value rewriting.
//!
//! WordPress rows frequently hold PHP-serialized data (`s:13:"hello, world!";`
//! and friends) whose string payloads carry their own byte lengths. A plain
//! textual replace across such a value leaves stale lengths behind and the
//! consuming site fails to unserialize it. This module parses the value, runs
//! the replacement inside every string payload, and re-serializes with
//! recomputed lengths. Values that do not parse as serialized data get a
//! plain replace instead.
//!
//! Lengths in the wire format count bytes, not characters, so all offsets
//! here are byte offsets into the input.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected token at byte {0}")]
    Unexpected(usize),
    #[error("declared string length does not fit the input")]
    BadLength,
}

/// One PHP value. Numeric payloads keep their raw text so re-serializing an
/// untouched value reproduces it byte for byte.
#[derive(Debug, Clone, PartialEq)]
enum PhpValue {
    Null,
    Bool(bool),
    Int(String),
    Float(String),
    Str(String),
    Array(Vec<(PhpValue, PhpValue)>),
    Object {
        class: String,
        entries: Vec<(PhpValue, PhpValue)>,
    },
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn unexpected(&self) -> ParseError {
        if self.pos >= self.input.len() {
            ParseError::UnexpectedEnd
        } else {
            ParseError::Unexpected(self.pos)
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ParseError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn take_until_semicolon(&mut self) -> Result<&'a str, ParseError> {
        let idx = self.rest().find(';').ok_or(ParseError::UnexpectedEnd)?;
        let token = &self.rest()[..idx];
        if token.is_empty() {
            return Err(self.unexpected());
        }
        self.pos += idx + 1;
        Ok(token)
    }

    /// Decimal length followed by `:`.
    fn length(&mut self) -> Result<usize, ParseError> {
        let idx = self.rest().find(':').ok_or(ParseError::UnexpectedEnd)?;
        let digits = &self.rest()[..idx];
        let len = digits.parse::<usize>().map_err(|_| self.unexpected())?;
        self.pos += idx + 1;
        Ok(len)
    }

    /// `"PAYLOAD"` where PAYLOAD is exactly `len` bytes.
    fn quoted(&mut self, len: usize) -> Result<&'a str, ParseError> {
        self.expect("\"")?;
        let payload = self.rest().get(..len).ok_or(ParseError::BadLength)?;
        self.pos += len;
        self.expect("\"")?;
        Ok(payload)
    }

    fn entries(&mut self, count: usize) -> Result<Vec<(PhpValue, PhpValue)>, ParseError> {
        self.expect("{")?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.value()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect("}")?;
        Ok(entries)
    }

    fn value(&mut self) -> Result<PhpValue, ParseError> {
        match self
            .rest()
            .as_bytes()
            .first()
            .copied()
            .ok_or(ParseError::UnexpectedEnd)?
        {
            b'N' => {
                self.expect("N;")?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect("b:")?;
                match self.take_until_semicolon()? {
                    "0" => Ok(PhpValue::Bool(false)),
                    "1" => Ok(PhpValue::Bool(true)),
                    _ => Err(self.unexpected()),
                }
            }
            b'i' => {
                self.expect("i:")?;
                let raw = self.take_until_semicolon()?;
                if !raw.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '+') {
                    return Err(self.unexpected());
                }
                Ok(PhpValue::Int(raw.to_owned()))
            }
            b'd' => {
                self.expect("d:")?;
                Ok(PhpValue::Float(self.take_until_semicolon()?.to_owned()))
            }
            b's' => {
                self.expect("s:")?;
                let len = self.length()?;
                let payload = self.quoted(len)?;
                self.expect(";")?;
                Ok(PhpValue::Str(payload.to_owned()))
            }
            b'a' => {
                self.expect("a:")?;
                let count = self.length()?;
                Ok(PhpValue::Array(self.entries(count)?))
            }
            b'O' => {
                self.expect("O:")?;
                let class_len = self.length()?;
                let class = self.quoted(class_len)?.to_owned();
                self.expect(":")?;
                let count = self.length()?;
                Ok(PhpValue::Object {
                    class,
                    entries: self.entries(count)?,
                })
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn parse(input: &str) -> Result<PhpValue, ParseError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value()?;
    if parser.pos != input.len() {
        return Err(ParseError::Unexpected(parser.pos));
    }
    Ok(value)
}

fn write_value(value: &PhpValue, out: &mut String) {
    match value {
        PhpValue::Null => out.push_str("N;"),
        PhpValue::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        PhpValue::Int(raw) => {
            out.push_str("i:");
            out.push_str(raw);
            out.push(';');
        }
        PhpValue::Float(raw) => {
            out.push_str("d:");
            out.push_str(raw);
            out.push(';');
        }
        PhpValue::Str(s) => {
            out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
        }
        PhpValue::Array(entries) => {
            out.push_str(&format!("a:{}:{{", entries.len()));
            for (key, value) in entries {
                write_value(key, out);
                write_value(value, out);
            }
            out.push('}');
        }
        PhpValue::Object { class, entries } => {
            out.push_str(&format!("O:{}:\"{}\":{}:{{", class.len(), class, entries.len()));
            for (key, value) in entries {
                write_value(key, out);
                write_value(value, out);
            }
            out.push('}');
        }
    }
}

fn to_serialized(value: &PhpValue) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Replace in string payloads only. Keys and class names are left alone,
/// matching the behavior sites depend on from the usual search-replace tools.
fn replace_in(value: &mut PhpValue, search: &str, replace: &str) -> bool {
    match value {
        PhpValue::Str(s) => {
            if s.contains(search) {
                *s = s.replace(search, replace);
                true
            } else {
                false
            }
        }
        PhpValue::Array(entries) | PhpValue::Object { entries, .. } => {
            let mut changed = false;
            for (_key, value) in entries.iter_mut() {
                changed |= replace_in(value, search, replace);
            }
            changed
        }
        _ => false,
    }
}

fn looks_serialized(value: &str) -> bool {
    let bytes = value.as_bytes();
    match bytes.first().copied() {
        Some(b'N') => value.starts_with("N;"),
        Some(b'b' | b'i' | b'd' | b's' | b'a' | b'O') => bytes.get(1) == Some(&b':'),
        _ => false,
    }
}

/// Rewrite one cell value, replacing `search` with `replace`.
///
/// Serialized values are rewritten structurally with recomputed byte lengths;
/// anything else gets a plain substring replace. Values without a match come
/// back unchanged.
pub fn rewrite_value(value: &str, search: &str, replace: &str) -> String {
    if search.is_empty() || !value.contains(search) {
        return value.to_owned();
    }

    if looks_serialized(value) {
        if let Ok(mut parsed) = parse(value) {
            if replace_in(&mut parsed, search, replace) {
                return to_serialized(&parsed);
            }
            // Match lives in a key or class name only; leave the value alone.
            return value.to_owned();
        }
    }

    value.replace(search, replace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized_str(payload: &str) -> String {
        format!("s:{}:\"{}\";", payload.len(), payload)
    }

    #[test]
    fn plain_text_gets_plain_replace() {
        assert_eq!(
            rewrite_value("visit http://old.test/page", "http://old.test", "https://new.test"),
            "visit https://new.test/page"
        );
    }

    #[test]
    fn value_without_match_is_unchanged() {
        let value = serialized_str("nothing to see");
        assert_eq!(rewrite_value(&value, "http://old.test", "x"), value);
    }

    #[test]
    fn serialized_string_length_is_recomputed() {
        let input = serialized_str("http://old.test/wp-content");
        let expected = serialized_str("https://new.example.org/wp-content");

        assert_eq!(
            rewrite_value(&input, "http://old.test", "https://new.example.org"),
            expected
        );
    }

    #[test]
    fn lengths_count_bytes_not_characters() {
        let input = serialized_str("café at http://old.test");
        let rewritten = rewrite_value(&input, "http://old.test", "https://new.test");

        assert_eq!(rewritten, serialized_str("café at https://new.test"));
        // "café" is five bytes; the recomputed length must reflect that.
        assert!(rewritten.starts_with(&format!("s:{}:", "café at https://new.test".len())));
    }

    #[test]
    fn nested_arrays_are_rewritten_recursively() {
        let inner = format!("a:1:{{{}{}}}", serialized_str("siteurl"), serialized_str("http://old.test"));
        let input = format!(
            "a:2:{{i:0;{}i:1;{}}}",
            serialized_str("http://old.test/feed"),
            inner
        );

        let expected_inner = format!(
            "a:1:{{{}{}}}",
            serialized_str("siteurl"),
            serialized_str("https://new.test")
        );
        let expected = format!(
            "a:2:{{i:0;{}i:1;{}}}",
            serialized_str("https://new.test/feed"),
            expected_inner
        );

        assert_eq!(rewrite_value(&input, "http://old.test", "https://new.test"), expected);
    }

    #[test]
    fn object_properties_are_rewritten_but_class_names_are_not() {
        let input = format!(
            "O:8:\"stdClass\":1:{{{}{}}}",
            serialized_str("home"),
            serialized_str("http://old.test")
        );
        let expected = format!(
            "O:8:\"stdClass\":1:{{{}{}}}",
            serialized_str("home"),
            serialized_str("https://new.test")
        );

        assert_eq!(rewrite_value(&input, "http://old.test", "https://new.test"), expected);
    }

    #[test]
    fn match_only_in_array_key_leaves_value_untouched() {
        let input = format!(
            "a:1:{{{}{}}}",
            serialized_str("http://old.test"),
            serialized_str("unrelated")
        );

        assert_eq!(rewrite_value(&input, "http://old.test", "https://new.test"), input);
    }

    #[test]
    fn scalar_payloads_round_trip_raw() {
        for input in ["i:-42;", "d:0.10000000000000001;", "b:1;", "N;"] {
            let parsed = parse(input).expect("parse");
            assert_eq!(to_serialized(&parsed), input);
        }
    }

    #[test]
    fn malformed_serialized_input_falls_back_to_plain_replace() {
        // Declared length overshoots the payload.
        let input = "s:99:\"http://old.test\";";
        assert_eq!(
            rewrite_value(input, "http://old.test", "https://new.test"),
            "s:99:\"https://new.test\";"
        );
    }

    #[test]
    fn embedded_quotes_inside_payload_survive() {
        let payload = r#"say "http://old.test" loudly"#;
        let input = serialized_str(payload);
        let expected = serialized_str(r#"say "https://new.test" loudly"#);

        assert_eq!(rewrite_value(&input, "http://old.test", "https://new.test"), expected);
    }

    #[test]
    fn trailing_garbage_is_not_serialized_data() {
        let input = format!("{}extra", serialized_str("http://old.test"));
        // Falls back to a plain replace across the whole value.
        let expected = format!("{}extra", "s:15:\"https://new.test\";");

        assert_eq!(rewrite_value(&input, "http://old.test", "https://new.test"), expected);
    }
}
