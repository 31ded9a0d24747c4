//! RFC 8785 JSON Canonicalization Scheme, the subset we need.
//!
//! Spec reference: §4.1 `[EXPANSION]` — the hash preimage must serialize
//! identically for every implementation that signs or verifies it. We
//! don't pull in a JCS crate: the rule set that matters here is narrow
//! (object keys sorted by UTF-16 code unit, no insignificant whitespace,
//! integers rendered without exponents) and correctness is load-bearing,
//! so it's worth being able to read the whole algorithm in one file.

use serde_json::Value;
use std::fmt::Write as _;

/// Serialize `value` to its canonical JSON byte representation.
///
/// Object keys are sorted by UTF-16 code unit (RFC 8785 §3.2.3); numbers
/// follow the ECMAScript `Number::toString` rendering used by JCS, which
/// for the integer-only timestamps and counts this system hashes reduces
/// to "no exponents, no trailing `.0`".
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_units(a).cmp(&utf16_units(b)));
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn write_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else if let Some(f) = n.as_f64() {
        // Only reachable for non-integral amounts, which this system's
        // preimage fields never carry (timestamps/counts are integers).
        let _ = write!(out, "{f}");
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_sort_lexicographically() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_structures_canonicalize_recursively() {
        let v = json!({"z": [1, 2, {"y": 1, "x": 2}], "a": null});
        assert_eq!(canonicalize(&v), r#"{"a":null,"z":[1,2,{"x":2,"y":1}]}"#);
    }

    #[test]
    fn strings_escape_control_characters() {
        let v = json!("line\nbreak\ttab");
        assert_eq!(canonicalize(&v), r#""line\nbreak\ttab""#);
    }
}
