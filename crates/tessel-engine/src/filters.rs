//! Built-in filters
//!
//! `{{ value | name:arg1:arg2 }}`. Filters are plain functions of the
//! piped value and the resolved arguments.

use std::rc::Rc;

use tessel_store::{CallError, Value};

/// Filter function `(value, args) -> value`
pub type FilterFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, CallError>>;

/// The filters every engine starts with
pub fn builtin_filters() -> Vec<(&'static str, FilterFn)> {
    vec![
        ("uppercase", filter(|v, _| Ok(map_str(v, |s| s.to_uppercase())))),
        ("lowercase", filter(|v, _| Ok(map_str(v, |s| s.to_lowercase())))),
        ("capitalize", filter(|v, _| Ok(map_str(v, capitalize)))),
        ("truncate", filter(truncate)),
        ("json", filter(json)),
        ("default", filter(default)),
        ("currency", filter(currency)),
        ("join", filter(join)),
    ]
}

/// Box a closure as a [`FilterFn`]
pub fn filter(f: impl Fn(&Value, &[Value]) -> Result<Value, CallError> + 'static) -> FilterFn {
    Rc::new(f)
}

/// Nullish values pass through untouched
fn map_str(value: &Value, f: impl Fn(&str) -> String) -> Value {
    if value.is_nullish() {
        return value.clone();
    }
    Value::from(f(&value.to_display_string()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(value: &Value, args: &[Value]) -> Result<Value, CallError> {
    if value.is_nullish() {
        return Ok(value.clone());
    }
    let limit = args.first().map(Value::to_number).filter(|n| n.is_finite() && *n >= 0.0).unwrap_or(50.0) as usize;
    let ellipsis = args.get(1).map(Value::to_display_string).unwrap_or_else(|| "...".into());
    let text = value.to_display_string();
    if text.chars().count() <= limit {
        return Ok(Value::from(text));
    }
    let cut: String = text.chars().take(limit).collect();
    Ok(Value::from(format!("{cut}{ellipsis}")))
}

fn json(value: &Value, args: &[Value]) -> Result<Value, CallError> {
    let indent = args.first().map(Value::to_number).filter(|n| *n == 0.0);
    let json = value.to_json();
    let text = match indent {
        Some(_) => json.to_string(),
        None => serde_json::to_string_pretty(&json).map_err(|e| CallError::Type(e.to_string()))?,
    };
    Ok(Value::from(text))
}

fn default(value: &Value, args: &[Value]) -> Result<Value, CallError> {
    let empty = value.is_nullish() || value.as_str().is_some_and(str::is_empty);
    Ok(if empty { args.first().cloned().unwrap_or_default() } else { value.clone() })
}

fn currency(value: &Value, args: &[Value]) -> Result<Value, CallError> {
    let n = value.to_number();
    if !n.is_finite() {
        return Ok(value.clone());
    }
    let symbol = args.first().map(Value::to_display_string).unwrap_or_else(|| "$".into());
    let fixed = format!("{:.2}", n.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{symbol}{grouped}.{frac}")))
}

fn join(value: &Value, args: &[Value]) -> Result<Value, CallError> {
    let Some(handle) = value.as_handle().filter(|h| h.is_array()) else {
        return Ok(value.clone());
    };
    let sep = args.first().map(Value::to_display_string).unwrap_or_else(|| ", ".into());
    let parts: Vec<String> = handle
        .values_raw()
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
        .collect();
    Ok(Value::from(parts.join(&sep)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, value: Value, args: &[Value]) -> Value {
        let (_, f) = builtin_filters().into_iter().find(|(n, _)| *n == name).unwrap();
        f(&value, args).unwrap()
    }

    #[test]
    fn test_text_filters() {
        assert_eq!(run("uppercase", "abc".into(), &[]).as_str(), Some("ABC"));
        assert_eq!(run("capitalize", "élan vital".into(), &[]).as_str(), Some("Élan vital"));
        assert!(run("lowercase", Value::Null, &[]).is_nullish());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(run("truncate", "hello world".into(), &[5.into()]).as_str(), Some("hello..."));
        assert_eq!(run("truncate", "hi".into(), &[5.into()]).as_str(), Some("hi"));
        assert_eq!(run("truncate", "abcdef".into(), &[3.into(), "~".into()]).as_str(), Some("abc~"));
    }

    #[test]
    fn test_currency_and_default() {
        assert_eq!(run("currency", 1234.5.into(), &[]).as_str(), Some("$1,234.50"));
        assert_eq!(run("currency", (-3).into(), &["€".into()]).as_str(), Some("-€3.00"));
        assert_eq!(run("default", "".into(), &["n/a".into()]).as_str(), Some("n/a"));
        assert_eq!(run("default", 0.into(), &["n/a".into()]).as_number(), Some(0.0));
    }

    #[test]
    fn test_join_and_json() {
        let list = Value::array(vec!["a".into(), Value::Null, 3.into()]);
        assert_eq!(run("join", list.clone(), &[]).as_str(), Some("a, , 3"));
        assert_eq!(run("join", list, &["-".into()]).as_str(), Some("a--3"));
        let obj = Value::object_from([("k".to_string(), 1.into())]);
        assert_eq!(run("json", obj, &[0.into()]).as_str(), Some(r#"{"k":1}"#));
    }
}
