//! Conversions between JSON test data and interpreter values.

use rhai::{Array, Dynamic, FLOAT, INT, ImmutableString, Map};
use serde_json::{Number, Value};

pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from_int(i as INT),
            None => Dynamic::from_float(n.as_f64().unwrap_or(f64::NAN) as FLOAT),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => {
            let array: Array = items.iter().map(json_to_dynamic).collect();
            Dynamic::from_array(array)
        }
        Value::Object(entries) => Dynamic::from_map(json_object_to_map(entries)),
    }
}

pub(crate) fn json_object_to_map(entries: &serde_json::Map<String, Value>) -> Map {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.as_str().into(), json_to_dynamic(value));
    }
    map
}

pub(crate) fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if value.is::<bool>() {
        return Value::Bool(value.cast::<bool>());
    }
    if value.is::<INT>() {
        return Value::from(value.cast::<INT>());
    }
    if value.is::<FLOAT>() {
        return Number::from_f64(value.cast::<FLOAT>()).map_or(Value::Null, Value::Number);
    }
    if value.is::<ImmutableString>() {
        return Value::String(value.cast::<ImmutableString>().to_string());
    }
    if value.is::<char>() {
        return Value::String(value.cast::<char>().to_string());
    }
    if value.is::<Array>() {
        return Value::Array(value.cast::<Array>().into_iter().map(dynamic_to_json).collect());
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        return Value::Object(map.into_iter().map(|(k, v)| (k.to_string(), dynamic_to_json(v))).collect());
    }
    Value::String(value.to_string())
}

/// Boolean coercion of an entry point's return value.
///
/// `()` is false, numbers are true when non-zero (NaN is false), strings when
/// non-empty; arrays, maps and anything else are true.
pub(crate) fn truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if let Ok(b) = value.as_bool() {
        return b;
    }
    if let Ok(i) = value.as_int() {
        return i != 0;
    }
    if let Ok(f) = value.as_float() {
        return f != 0.0 && !f.is_nan();
    }
    if value.is::<ImmutableString>() {
        return !value.clone().cast::<ImmutableString>().is_empty();
    }
    true
}
