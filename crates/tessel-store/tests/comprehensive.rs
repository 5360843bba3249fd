//! Comprehensive tests for tessel-store
//!
//! Observation invariants: lazy nested observation, equality-gated
//! notifications, reserved keys, deletes, paths through containers.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tessel_store::{
    deep_equal, get_by_path, make_reactive, set_by_path, Change, ChangeHandler, HostObject, Value,
};

type Log = Rc<RefCell<Vec<Change>>>;

fn observed(json: serde_json::Value) -> (Value, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    let handler: ChangeHandler = Rc::new(move |c: &Change| l.borrow_mut().push(c.clone()));
    (make_reactive(Value::from(json), "test", handler), log)
}

#[test]
fn test_equal_write_does_not_notify() {
    let (data, log) = observed(json!({"user": {"name": "ada", "tags": ["x"]}}));
    data.set("user", Value::from(json!({"name": "ada", "tags": ["x"]})));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_different_write_notifies_once_with_values() {
    let (data, log) = observed(json!({"count": 1}));
    data.set("count", 2.into());
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].key, "count");
    assert_eq!(log[0].new_value.as_number(), Some(2.0));
    assert_eq!(log[0].old_value.as_number(), Some(1.0));
}

#[test]
fn test_nested_reads_keep_identity() {
    let (data, _) = observed(json!({"user": {"name": "ada"}}));
    let first = data.get("user");
    let second = data.get("user");
    assert!(first.strict_equals(&second));
    assert!(first.as_handle().unwrap().is_observed());
}

#[test]
fn test_nested_observed_lazily() {
    let (data, _) = observed(json!({"user": {"name": "ada"}}));
    let raw = data.as_handle().unwrap().get_raw("user");
    assert!(!raw.as_handle().unwrap().is_observed());
    data.get("user");
    assert!(raw.as_handle().unwrap().is_observed());
}

#[test]
fn test_nested_write_reports_full_path() {
    let (data, log) = observed(json!({"a": {"b": {"c": 1}}}));
    set_by_path(&data, "a.b.c", 2.into());
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].path, "a.b.c");
    assert_eq!(log[0].key, "c");
}

#[test]
fn test_delete_notifies_undefined() {
    let (data, log) = observed(json!({"a": 1}));
    data.as_handle().unwrap().delete("a").unwrap();
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert!(log[0].new_value.is_undefined());
    assert!(!data.has("a"));
}

#[test]
fn test_make_reactive_idempotent() {
    let (data, log) = observed(json!({"a": 1}));
    let other: ChangeHandler = Rc::new(|_| panic!("second handler must not be attached"));
    let again = make_reactive(data.clone(), "again", other);
    assert!(again.strict_equals(&data));
    again.set("a", 5.into());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_primitives_pass_through() {
    let handler: ChangeHandler = Rc::new(|_| {});
    assert!(make_reactive(Value::Null, "n", handler.clone()).is_nullish());
    assert_eq!(make_reactive(3.into(), "n", handler).as_number(), Some(3.0));
}

#[test]
fn test_frozen_never_observed() {
    let frozen = Value::from(json!({"k": 1}));
    frozen.as_handle().unwrap().freeze();
    let (data, log) = observed(json!({}));
    data.set("config", frozen.clone());
    log.borrow_mut().clear();
    let read = data.get("config");
    assert!(!read.as_handle().unwrap().is_observed());
    assert!(!read.set("k", 2.into()));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_setbypath_roundtrip_many_paths() {
    for path in ["x", "a.b", "deep.er.path.here", "list.0"] {
        let root = Value::object();
        let v = Value::from(json!({"marker": path}));
        assert!(set_by_path(&root, path, v.clone()), "{path}");
        assert!(get_by_path(&root, path).strict_equals(&v), "{path}");
    }
}

struct Counter {
    value: RefCell<f64>,
}

impl HostObject for Counter {
    fn get(&self, key: &str) -> Value {
        match key {
            "value" => Value::Number(*self.value.borrow()),
            _ => Value::Undefined,
        }
    }

    fn set(&self, key: &str, value: Value) -> bool {
        if key != "value" {
            return false;
        }
        *self.value.borrow_mut() = value.to_number();
        true
    }

    fn keys(&self) -> Vec<String> {
        vec!["value".into()]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn test_paths_through_host_objects() {
    let host = Value::Host(Rc::new(Counter { value: RefCell::new(1.0) }));
    let root = Value::object();
    root.set("counter", host);
    assert!(set_by_path(&root, "counter.value", 7.into()));
    assert_eq!(get_by_path(&root, "counter.value").as_number(), Some(7.0));
    assert!(!set_by_path(&root, "counter.other", 1.into()));
}

#[test]
fn test_deep_equal_distinguishes_types() {
    assert!(!deep_equal(&Value::from("1"), &Value::from(1)));
    assert!(!deep_equal(&Value::Null, &Value::Undefined));
    assert!(deep_equal(&Value::array(vec![]), &Value::array(vec![])));
    assert!(!deep_equal(&Value::array(vec![]), &Value::object()));
}
