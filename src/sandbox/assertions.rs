//! Structured assertions over an entry point's raw return value.
//!
//! Where a predicate row only checks truthiness against a label, an assertion
//! case inspects the value itself (converted to JSON):
//!
//! ```json
//! { "kind": "equals",    "expected": 42 }
//! { "kind": "approx",    "expected": 0.3, "tolerance": 1e-9 }
//! { "kind": "matches",   "pattern": "^SE-\\d+$" }
//! { "kind": "json_path", "path": "$.items[0].name", "expected": "a" }
//! { "kind": "one_of",    "values": ["low", "high"] }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    Equals { expected: Value },
    Approx { expected: f64, tolerance: f64 },
    Matches { pattern: String },
    JsonPath { path: String, expected: Value },
    OneOf { values: Vec<Value> },
}

/// Equality with numbers compared by value, so `1` equals `1.0`.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y)),
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len() && xs.iter().all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Select a value with a small JSONPath subset: `$`, `.key`, `[index]` and
/// `["key"]`/`['key']`. The leading `$` is optional.
pub(crate) fn select<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let path = path.trim();
    let mut rest = path.strip_prefix('$').unwrap_or(path);
    let mut current = root;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let inner = after[..end].trim();
            let quoted = inner
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
            current = match quoted {
                Some(key) => current.get(key)?,
                None => current.get(inner.parse::<usize>().ok()?)?,
            };
            rest = &after[end + 1..];
        } else {
            let segment = rest.strip_prefix('.').unwrap_or(rest);
            let end = segment.find(['.', '[']).unwrap_or(segment.len());
            if end == 0 {
                return None;
            }
            current = current.get(&segment[..end])?;
            rest = &segment[end..];
        }
    }

    Some(current)
}

impl Assertion {
    /// `Ok(())` when `actual` satisfies the assertion, otherwise a one-line reason.
    pub fn check(&self, actual: &Value) -> Result<(), String> {
        match self {
            Assertion::Equals { expected } => {
                if json_eq(actual, expected) {
                    Ok(())
                } else {
                    Err(format!("expected {expected}, got {actual}"))
                }
            }
            Assertion::Approx { expected, tolerance } => match actual.as_f64() {
                Some(value) if (value - expected).abs() <= *tolerance => Ok(()),
                Some(value) => Err(format!("expected {expected} ± {tolerance}, got {value}")),
                None => Err(format!("expected a number near {expected}, got {actual}")),
            },
            Assertion::Matches { pattern } => {
                let re = Regex::new(pattern).map_err(|err| format!("invalid pattern {pattern:?}: {err}"))?;
                let text = match actual {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if re.is_match(&text) { Ok(()) } else { Err(format!("{text:?} does not match /{pattern}/")) }
            }
            Assertion::JsonPath { path, expected } => match select(actual, path) {
                Some(found) if json_eq(found, expected) => Ok(()),
                Some(found) => Err(format!("{path}: expected {expected}, got {found}")),
                None => Err(format!("{path}: no value at this path")),
            },
            Assertion::OneOf { values } => {
                if values.iter().any(|v| json_eq(actual, v)) {
                    Ok(())
                } else {
                    let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
                    Err(format!("{actual} is not one of [{}]", allowed.join(", ")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_compares_numbers_by_value() {
        assert!(Assertion::Equals { expected: json!(1) }.check(&json!(1.0)).is_ok());
        assert!(Assertion::Equals { expected: json!({"a": [1, 2]}) }.check(&json!({"a": [1.0, 2]})).is_ok());
        assert!(Assertion::Equals { expected: json!("1") }.check(&json!(1)).is_err());
    }

    #[test]
    fn approx_uses_tolerance() {
        let a = Assertion::Approx { expected: 0.3, tolerance: 1e-9 };
        assert!(a.check(&json!(0.1 + 0.2)).is_ok());
        assert!(a.check(&json!(0.31)).is_err());
        assert!(a.check(&json!("0.3")).is_err());
    }

    #[test]
    fn matches_and_invalid_patterns() {
        assert!(Assertion::Matches { pattern: r"^SE-\d+$".into() }.check(&json!("SE-42")).is_ok());
        assert!(Assertion::Matches { pattern: r"^\d+$".into() }.check(&json!(42)).is_ok());
        let err = Assertion::Matches { pattern: "(".into() }.check(&json!("x")).unwrap_err();
        assert!(err.starts_with("invalid pattern"));
    }

    #[test]
    fn json_path_selection() {
        let value = json!({"items": [{"name": "a"}, {"name": "b"}], "odd key": true});
        assert_eq!(select(&value, "$.items[1].name"), Some(&json!("b")));
        assert_eq!(select(&value, "items[0]['name']"), Some(&json!("a")));
        assert_eq!(select(&value, "$[\"odd key\"]"), Some(&json!(true)));
        assert_eq!(select(&value, "$"), Some(&value));
        assert_eq!(select(&value, "$.items[9]"), None);
        assert_eq!(select(&value, "$..items"), None);
    }

    #[test]
    fn one_of_lists_allowed_values() {
        let a = Assertion::OneOf { values: vec![json!("low"), json!("high")] };
        assert!(a.check(&json!("high")).is_ok());
        assert_eq!(a.check(&json!("mid")).unwrap_err(), r#""mid" is not one of ["low", "high"]"#);
    }

    #[test]
    fn assertions_deserialize_from_tagged_json() {
        let parsed: Assertion = serde_json::from_value(json!({"kind": "json_path", "path": "$.a", "expected": 1})).unwrap();
        assert_eq!(parsed, Assertion::JsonPath { path: "$.a".into(), expected: json!(1) });
    }
}
