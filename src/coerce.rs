//! Type coercion (C2): compare, stringify, booleanize, numberize dynamic
//! values (spec §4.2). Values carry no static type; comparison is numeric
//! when both sides coerce to a number, string otherwise.

use crate::core::Value;

/// Attempt to coerce a value to a number. Number-looking strings parse;
/// booleans are not numbers (comparisons fall back to string ordering).
pub fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Stringify a value for string-mode comparison.
pub fn to_string_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.display(),
    }
}

/// Booleanize: non-zero numbers, non-empty strings/arrays/maps, and `true`
/// are truthy; `null`, `false`, `0`, `""`, `[]`, `{}` are falsy.
pub fn to_bool(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Map(m) => !m.is_empty(),
    }
}

/// Coerce a value into a list. A list coerces to itself; a bare non-list is
/// wrapped into a singleton (non-string) or, for a comma-separated string,
/// split on `,` with whitespace trimmed and empties dropped (spec §4.2,
/// ported from `core.ToArray`).
pub fn to_array(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(a) => a.clone(),
        Value::Null => Vec::new(),
        Value::String(s) => {
            if s.is_empty() {
                Vec::new()
            } else {
                s.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| Value::String(e.to_string()))
                    .collect()
            }
        }
        other => vec![other.clone()],
    }
}

/// Dynamic comparator: numeric when both sides coerce to number, string
/// otherwise. Returns -1/0/+1. Booleans compare via boolean coercion.
pub fn compare(a: &Value, b: &Value) -> i32 {
    if let (Value::Bool(_), _) | (_, Value::Bool(_)) = (a, b) {
        let (ab, bb) = (to_bool(a), to_bool(b));
        return match ab.cmp(&bb) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        };
    }

    if let (Some(an), Some(bn)) = (to_number(a), to_number(b)) {
        return match an.partial_cmp(&bn) {
            Some(std::cmp::Ordering::Less) => -1,
            Some(std::cmp::Ordering::Equal) => 0,
            Some(std::cmp::Ordering::Greater) => 1,
            None => -1,
        };
    }

    let (as_, bs) = (to_string_value(a), to_string_value(b));
    match as_.cmp(&bs) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

pub fn equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == 0
}
