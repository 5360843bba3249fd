//! Structural equality and cloning

use std::collections::{HashMap, HashSet};

use crate::reactive::Handle;
use crate::value::Value;

/// Recursive structural equality.
///
/// Containers compare by content (object key order is ignored), functions
/// and hosts by identity. `Undefined` fields are significant: `{a: undefined}`
/// differs from `{}`. Cycles are handled by assuming pairs already under
/// comparison are equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut seen = HashSet::new();
    equal_inner(a, b, &mut seen)
}

fn equal_inner(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            let (xs, ys) = (x.values_raw(), y.values_raw());
            xs.len() == ys.len() && xs.iter().zip(&ys).all(|(p, q)| equal_inner(p, q, seen))
        }
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            if x.len() != y.len() {
                return false;
            }
            x.keys()
                .iter()
                .all(|k| y.has(k) && equal_inner(&x.get_raw(k), &y.get_raw(k), seen))
        }
        _ => a.strict_equals(b),
    }
}

/// Copy containers into fresh, unobserved containers. Shared and cyclic
/// references are preserved; functions, hosts and nodes are shared.
pub fn deep_clone(value: &Value) -> Value {
    let mut copies = HashMap::new();
    clone_inner(value, &mut copies)
}

fn clone_inner(value: &Value, copies: &mut HashMap<usize, Handle>) -> Value {
    let Some(source) = value.as_handle() else {
        return value.clone();
    };
    if let Some(copy) = copies.get(&source.addr()) {
        return copy.to_value();
    }

    let copy = if source.is_array() {
        Handle::new_array(Vec::new())
    } else {
        Handle::new_object(Default::default())
    };
    copies.insert(source.addr(), copy.clone());

    for key in source.keys() {
        let child = clone_inner(&source.get_raw(&key), copies);
        // Fresh, unobserved, writable container.
        let _ = copy.set(&key, child);
    }
    copy.to_value()
}
