//! JSON bridge (`serde_json`)

use std::collections::HashSet;

use serde::{Serialize, Serializer};
use serde_json::{Map, Number};

use crate::value::Value;

impl Value {
    /// Convert to JSON the way `JSON.stringify` would: `undefined` and
    /// functions are dropped from objects and become `null` in arrays,
    /// non-finite numbers become `null`, repeated cycles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = HashSet::new();
        to_json_inner(self, &mut stack).unwrap_or(serde_json::Value::Null)
    }

    /// Build a value from JSON. Objects and arrays become fresh containers.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                Value::object_from(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))))
            }
        }
    }

    /// Parse a JSON document
    pub fn parse_json(text: &str) -> serde_json::Result<Value> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Value::from_json(&json))
    }

    /// Compact JSON text
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

/// `None` means "omit" (undefined/function)
fn to_json_inner(value: &Value, stack: &mut HashSet<usize>) -> Option<serde_json::Value> {
    Some(match value {
        Value::Undefined | Value::Function(_) => return None,
        Value::Null | Value::Node(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                serde_json::Value::Number(Number::from(*n as i64))
            } else {
                Number::from_f64(*n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(h) => {
            if !stack.insert(h.addr()) {
                return Some(serde_json::Value::Null);
            }
            let items = h
                .values_raw()
                .iter()
                .map(|v| to_json_inner(v, stack).unwrap_or(serde_json::Value::Null))
                .collect();
            stack.remove(&h.addr());
            serde_json::Value::Array(items)
        }
        Value::Object(h) => {
            if !stack.insert(h.addr()) {
                return Some(serde_json::Value::Null);
            }
            let mut map = Map::new();
            for key in h.keys() {
                if let Some(v) = to_json_inner(&h.get_raw(&key), stack) {
                    map.insert(key, v);
                }
            }
            stack.remove(&h.addr());
            serde_json::Value::Object(map)
        }
        Value::Host(host) => {
            let mut map = Map::new();
            for key in host.keys() {
                if let Some(v) = to_json_inner(&host.get(&key), stack) {
                    map.insert(key, v);
                }
            }
            serde_json::Value::Object(map)
        }
    })
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip_shape() {
        let v = Value::from(json!({"name": "ada", "tags": ["a", "b"], "age": 36}));
        assert_eq!(v.get("name").as_str(), Some("ada"));
        assert_eq!(v.to_json(), json!({"name": "ada", "tags": ["a", "b"], "age": 36}));
    }

    #[test]
    fn test_undefined_dropped_like_stringify() {
        let v = Value::object();
        v.set("a", Value::Undefined);
        v.set("b", Value::function("f", |_, _| Ok(Value::Null)));
        v.set("c", Value::array(vec![Value::Undefined]));
        assert_eq!(v.to_json_string(), r#"{"c":[null]}"#);
    }

    #[test]
    fn test_fractional_numbers() {
        assert_eq!(Value::from(1.5).to_json_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_json_string(), "null");
    }
}
