//! Loose value coercions used when normalizing caller payloads.
//!
//! Callers of the generation endpoint are browser clients that were written
//! against a JavaScript backend, so field handling follows the JavaScript
//! truthiness, `Number()` and `String()` rules rather than strict typing.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A number as it would be produced by JavaScript's `Number()`.
///
/// Serializes like `JSON.stringify`: integral values without a fractional
/// part, non-finite values as `null`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JsNumber(pub f64);

// 2^53, the largest range in which every integer is exactly representable
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

impl JsNumber {
    pub fn value(&self) -> f64 {
        self.0
    }

    fn as_integer(&self) -> Option<i64> {
        if self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() <= MAX_SAFE_INTEGER {
            Some(self.0 as i64)
        } else {
            None
        }
    }
}

impl From<f64> for JsNumber {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Serialize for JsNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(int) = self.as_integer() {
            serializer.serialize_i64(int)
        } else if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_unit()
        }
    }
}

impl fmt::Display for JsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(int) = self.as_integer() {
            write!(f, "{}", int)
        } else if self.0.is_nan() {
            write!(f, "NaN")
        } else if self.0.is_infinite() {
            let sign = if self.0 < 0.0 { "-" } else { "" };
            write!(f, "{}Infinity", sign)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn to_number(value: &Value) -> JsNumber {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number(s),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [Value::Null] => 0.0,
            [single] if !single.is_object() => parse_number(&to_js_string(single)),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    };

    JsNumber(n)
}

pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => JsNumber(f).to_string(),
            None => n.to_string(),
        },
        Value::String(s) => s.clone(),
        // array elements that are null render as empty strings
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN);
        }
    }

    // rust accepts spellings like "inf" and "nan" that javascript does not
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }

    s.parse::<f64>().unwrap_or(f64::NAN)
}
