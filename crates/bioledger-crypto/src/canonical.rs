//! Deterministic JSON canonicalization and SHA-256 commitments.
//!
//! Object keys are sorted lexicographically by UTF-8 code unit, arrays
//! preserve order, numbers are emitted without redundant zeros, and strings
//! use minimal JSON escaping. Structurally equal inputs produce byte-identical
//! output regardless of field insertion order.

use bioledger_core::BioLedgerError;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest as _, Sha256};

mod finite_check;

/// Recursion guard. Ordinary credential/material payloads nest a handful of
/// levels deep; anything deeper is treated as outside the canonical subset
/// rather than risking unbounded recursion on a pathological input.
const MAX_DEPTH: usize = 64;

/// Serialize `value` to the canonical byte string.
///
/// `value` is walked twice: once by [`finite_check`] (against `value`'s own
/// `Serialize` impl, before any conversion happens) to reject non-finite
/// floats, and once by `serde_json::to_value` to build the `Value` tree
/// `write_canonical` renders. The two passes can't be collapsed into one:
/// `serde_json::to_value`'s own float handling silently maps NaN/Infinity
/// to `Value::Null` instead of erroring (`Number::from_f64` returns `None`
/// for non-finite input, and `Value::from(f64)` treats `None` as `Null`),
/// so by the time a `Value` exists the non-finite-ness is already lost.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, BioLedgerError> {
    finite_check::check(value)?;
    let v = serde_json::to_value(value).map_err(|_| BioLedgerError::NonSerializable)?;
    let mut buf = String::new();
    write_canonical(&v, &mut buf, 0)?;
    Ok(buf)
}

/// SHA-256 over the canonical byte string of `value`.
pub fn hash<T: Serialize>(value: &T) -> Result<[u8; 32], BioLedgerError> {
    let bytes = canonicalize(value)?;
    Ok(sha256(bytes.as_bytes()))
}

/// SHA-256 of raw bytes (used by C5 for artifact hashing).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn write_canonical(value: &Value, buf: &mut String, depth: usize) -> Result<(), BioLedgerError> {
    if depth > MAX_DEPTH {
        return Err(BioLedgerError::NonSerializable);
    }
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        // Non-finite floats are rejected up front in `canonicalize` (see
        // `finite_check`), before a `Value` tree — which can no longer
        // distinguish a non-finite input from a literal `null` — exists at
        // all. By the time this function runs, every `Number` here is
        // finite.
        Value::Number(n) => buf.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, buf),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf, depth + 1)?;
            }
            buf.push(']');
        }
        Value::Object(map) => {
            buf.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_json_string(key, buf);
                buf.push(':');
                write_canonical(&map[key], buf, depth + 1)?;
            }
            buf.push('}');
        }
    }
    Ok(())
}

/// Minimal JSON string escaping: only characters that JSON requires to be
/// escaped (`"`, `\`, and control characters) are escaped.
fn write_json_string(s: &str, buf: &mut String) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn permutation_invariance() {
        let a = json!({"b": 1, "a": 2, "c": 3});
        let b = json!({"c": 3, "a": 2, "b": 1});
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn nested_keys_sorted() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(canonicalize(&v).unwrap(), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn arrays_preserve_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn round_trip_hash_stable() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash(&a).unwrap(), hash(&b).unwrap());
    }

    #[test]
    fn non_finite_number_rejected() {
        #[derive(Serialize)]
        struct Wrapper {
            v: f64,
        }
        let w = Wrapper { v: f64::NAN };
        assert!(matches!(canonicalize(&w), Err(BioLedgerError::NonSerializable)));
    }

    #[test]
    fn minimal_escaping() {
        let v = json!({"k": "line1\nline2 \"quoted\""});
        assert_eq!(
            canonicalize(&v).unwrap(),
            r#"{"k":"line1\nline2 \"quoted\""}"#
        );
    }
}
