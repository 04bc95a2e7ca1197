//! Deterministic JSON serialization of signed payloads
//!
//! Keys are sorted by code point at every nesting level, separators are fixed
//! to `,` and `:`, and every character outside printable ASCII is written as a
//! lowercase `\uXXXX` escape (surrogate pairs above the BMP). Two mappings with
//! the same key/value content therefore always yield the same bytes, whatever
//! their insertion order or the locale of the process.

use std::fmt::Write as _;

use serde_json::Value;

use crate::types::CertificatePayload;

/// Canonical bytes of a payload; the exact input to signing and verification
pub fn canonicalize_payload(payload: &CertificatePayload) -> Vec<u8> {
    canonicalize(&payload.to_value())
}

/// Canonical bytes of any JSON value
pub fn canonicalize(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}

/// Canonical text of any JSON value (always pure ASCII)
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    // writing into a String cannot fail
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}
