//! Observable containers
//!
//! A [`Handle`] is a shared object or array. Attaching an observer turns it
//! into a reactive container:
//!
//! - nested containers read through [`Handle::get`] inherit the observer
//!   (with the path extended) the first time they are read, and keep it;
//! - writes are compared with [`deep_equal`] and only effective writes
//!   notify, exactly once, after the mutation is applied;
//! - keys starting with [`RESERVED_PREFIX`] never notify;
//! - deleting a key notifies with `Undefined`.
//!
//! The observer handler runs with no borrow of the container held, so it
//! may read or write the same container.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::equality::deep_equal;
use crate::value::Value;

/// Keys with this prefix are bookkeeping and never notify
pub const RESERVED_PREFIX: &str = "__";

/// Change callback attached to a container tree
pub type ChangeHandler = Rc<dyn Fn(&Change)>;

/// One effective mutation
#[derive(Clone, Debug)]
pub struct Change {
    /// Container that was written
    pub target: Handle,
    pub key: String,
    /// Dotted path of the key from the observed root
    pub path: String,
    pub new_value: Value,
    pub old_value: Value,
}

/// Write rejected by a container
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("container is frozen")]
    Frozen,

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error("invalid array key '{0}'")]
    InvalidKey(String),
}

#[derive(Clone)]
struct Observer {
    handler: ChangeHandler,
    path: String,
    name: Rc<str>,
}

enum Storage {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
}

struct Container {
    storage: RefCell<Storage>,
    observer: RefCell<Option<Observer>>,
    frozen: Cell<bool>,
    readonly: Cell<bool>,
}

/// Shared object or array with identity
#[derive(Clone)]
pub struct Handle(Rc<Container>);

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl Handle {
    fn with_storage(storage: Storage) -> Self {
        Handle(Rc::new(Container {
            storage: RefCell::new(storage),
            observer: RefCell::new(None),
            frozen: Cell::new(false),
            readonly: Cell::new(false),
        }))
    }

    pub fn new_object(map: IndexMap<String, Value>) -> Self {
        Self::with_storage(Storage::Object(map))
    }

    pub fn new_array(items: Vec<Value>) -> Self {
        Self::with_storage(Storage::Array(items))
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.0.storage.borrow(), Storage::Array(_))
    }

    /// Wrap back into a [`Value`] of the right kind
    pub fn to_value(&self) -> Value {
        if self.is_array() {
            Value::Array(self.clone())
        } else {
            Value::Object(self.clone())
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address, used for identity fingerprints
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn is_observed(&self) -> bool {
        self.0.observer.borrow().is_some()
    }

    /// Attach an observer. No-op (returns false) if the container is
    /// already observed or frozen.
    pub fn observe(&self, handler: ChangeHandler, path: &str, name: &str) -> bool {
        if self.0.frozen.get() || self.is_observed() {
            return false;
        }
        *self.0.observer.borrow_mut() = Some(Observer {
            handler,
            path: path.to_string(),
            name: Rc::from(name),
        });
        true
    }

    /// Detach the observer (nested containers keep theirs)
    pub fn unobserve(&self) {
        self.0.observer.borrow_mut().take();
    }

    /// Path of this container from its observed root
    pub fn path(&self) -> Option<String> {
        self.0.observer.borrow().as_ref().map(|o| o.path.clone())
    }

    fn observed_by(&self, handler: &ChangeHandler) -> bool {
        self.0.observer.borrow().as_ref().is_some_and(|o| Rc::ptr_eq(&o.handler, handler))
    }

    /// Move this container to `path`, carrying along the nested containers
    /// that were observed through it
    fn rebase(&self, path: &str) {
        let (handler, old) = {
            let mut observer = self.0.observer.borrow_mut();
            let Some(obs) = observer.as_mut() else {
                return;
            };
            if obs.path == path {
                return;
            }
            (obs.handler.clone(), std::mem::replace(&mut obs.path, path.to_string()))
        };
        for key in self.keys() {
            if let Some(child) = self.get_raw(&key).as_handle()
                && child.observed_by(&handler)
                && child.path().is_some_and(|p| p == join_path(&old, &key))
            {
                child.rebase(&join_path(path, &key));
            }
        }
    }

    /// Re-path observed elements from `from` on after a shift
    fn reindex(&self, from: usize) {
        let Some((handler, base)) = self.0.observer.borrow().as_ref().map(|o| (o.handler.clone(), o.path.clone()))
        else {
            return;
        };
        for (index, item) in self.values_raw().into_iter().enumerate().skip(from) {
            if let Some(child) = item.as_handle()
                && child.observed_by(&handler)
            {
                child.rebase(&join_path(&base, &index.to_string()));
            }
        }
    }

    pub fn debug_name(&self) -> Option<String> {
        self.0.observer.borrow().as_ref().map(|o| o.name.to_string())
    }

    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    /// Read-only containers reject [`set`](Self::set) but accept
    /// [`force_set`](Self::force_set)
    pub fn set_readonly(&self, readonly: bool) {
        self.0.readonly.set(readonly);
    }

    pub fn is_readonly(&self) -> bool {
        self.0.readonly.get()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        match &*self.0.storage.borrow() {
            Storage::Object(map) => map.len(),
            Storage::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        match &*self.0.storage.borrow() {
            Storage::Object(map) => map.keys().cloned().collect(),
            Storage::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        match &*self.0.storage.borrow() {
            Storage::Object(map) => map.contains_key(key),
            Storage::Array(items) => key.parse::<usize>().is_ok_and(|i| i < items.len()),
        }
    }

    /// Read without observing nested containers
    pub fn get_raw(&self, key: &str) -> Value {
        match &*self.0.storage.borrow() {
            Storage::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Storage::Array(items) => {
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
        }
    }

    /// Read a property; nested containers inherit this container's observer
    pub fn get(&self, key: &str) -> Value {
        let value = self.get_raw(key);
        if let Some(child) = value.as_handle()
            && !child.is_observed()
            && !child.is_frozen()
        {
            let observer = self.0.observer.borrow().clone();
            if let Some(obs) = observer {
                child.observe(obs.handler, &join_path(&obs.path, key), &obs.name);
            }
        }
        value
    }

    /// Snapshot of the stored values without observing them
    pub fn values_raw(&self) -> Vec<Value> {
        match &*self.0.storage.borrow() {
            Storage::Object(map) => map.values().cloned().collect(),
            Storage::Array(items) => items.clone(),
        }
    }

    /// Observed snapshot of `(key, value)` pairs
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.keys()
            .into_iter()
            .map(|k| {
                let v = self.get(&k);
                (k, v)
            })
            .collect()
    }

    /// Observed snapshot of the values
    pub fn items(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn check_writable(&self, key: &str, force: bool) -> Result<(), WriteError> {
        if self.is_frozen() {
            warn!(key, "write to frozen container ignored");
            return Err(WriteError::Frozen);
        }
        if !force && self.is_readonly() {
            warn!(key, "write to read-only container rejected");
            return Err(WriteError::ReadOnly(key.to_string()));
        }
        Ok(())
    }

    /// Assign a property. Returns `Ok(true)` if the value changed (and the
    /// observer was notified), `Ok(false)` for a structurally equal write.
    pub fn set(&self, key: &str, value: Value) -> Result<bool, WriteError> {
        self.check_writable(key, false)?;
        self.store(key, value)
    }

    /// Assign bypassing the read-only flag
    pub fn force_set(&self, key: &str, value: Value) -> Result<bool, WriteError> {
        self.check_writable(key, true)?;
        self.store(key, value)
    }

    fn store(&self, key: &str, value: Value) -> Result<bool, WriteError> {
        let old = self.get_raw(key);
        let present = self.has(key) || (key == "length" && self.is_array());
        if present && deep_equal(&old, &value) {
            return Ok(false);
        }

        match &mut *self.0.storage.borrow_mut() {
            Storage::Object(map) => {
                map.insert(key.to_string(), value.clone());
            }
            Storage::Array(items) => {
                if key == "length" {
                    let len = value.to_number();
                    if !(len >= 0.0 && len.fract() == 0.0) {
                        return Err(WriteError::InvalidKey(key.to_string()));
                    }
                    items.resize(len as usize, Value::Undefined);
                } else {
                    let index: usize = key.parse().map_err(|_| WriteError::InvalidKey(key.to_string()))?;
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value.clone();
                }
            }
        }

        self.notify(key, value, old);
        Ok(true)
    }

    /// Remove a property. Array elements become `Undefined`.
    pub fn delete(&self, key: &str) -> Result<bool, WriteError> {
        self.check_writable(key, false)?;
        let old = match &mut *self.0.storage.borrow_mut() {
            Storage::Object(map) => map.shift_remove(key),
            Storage::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .map(std::mem::take),
        };
        match old {
            Some(old) => {
                self.notify(key, Value::Undefined, old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn with_array<R>(&self, key: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, WriteError> {
        self.check_writable(key, false)?;
        match &mut *self.0.storage.borrow_mut() {
            Storage::Array(items) => Ok(f(items)),
            Storage::Object(_) => Err(WriteError::InvalidKey(key.to_string())),
        }
    }

    /// Append to an array, returns the new length
    pub fn push(&self, value: Value) -> Result<usize, WriteError> {
        let index = self.with_array("push", |items| {
            items.push(value.clone());
            items.len() - 1
        })?;
        self.notify(&index.to_string(), value, Value::Undefined);
        Ok(index + 1)
    }

    /// Remove the last array element
    pub fn pop(&self) -> Result<Value, WriteError> {
        let popped = self.with_array("pop", |items| {
            let index = items.len().checked_sub(1)?;
            items.pop().map(|v| (index, v))
        })?;
        match popped {
            Some((index, old)) => {
                self.notify(&index.to_string(), Value::Undefined, old.clone());
                Ok(old)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Insert into an array, shifting later elements
    pub fn insert(&self, index: usize, value: Value) -> Result<(), WriteError> {
        let index = self.with_array("insert", |items| {
            let index = index.min(items.len());
            items.insert(index, value.clone());
            index
        })?;
        self.reindex(index + 1);
        self.notify(&index.to_string(), value, Value::Undefined);
        Ok(())
    }

    /// Remove an array element, shifting later elements
    pub fn remove(&self, index: usize) -> Result<Value, WriteError> {
        let removed = self.with_array("remove", |items| {
            (index < items.len()).then(|| {
                let old = items.remove(index);
                (old, items.get(index).cloned().unwrap_or_default())
            })
        })?;
        match removed {
            Some((old, now)) => {
                self.reindex(index);
                self.notify(&index.to_string(), now, old.clone());
                Ok(old)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Remove every element of an array or every key of an object
    pub fn clear(&self) -> Result<(), WriteError> {
        self.check_writable("length", false)?;
        let old_len = self.len();
        if old_len == 0 {
            return Ok(());
        }
        match &mut *self.0.storage.borrow_mut() {
            Storage::Object(map) => map.clear(),
            Storage::Array(items) => items.clear(),
        }
        self.notify("length", Value::Number(0.0), Value::Number(old_len as f64));
        Ok(())
    }

    fn notify(&self, key: &str, new_value: Value, old_value: Value) {
        if key.starts_with(RESERVED_PREFIX) {
            return;
        }
        let observer = self.0.observer.borrow().clone();
        let Some(obs) = observer else {
            return;
        };
        let path = join_path(&obs.path, key);
        trace!(store = %obs.name, path = %path, "change");
        (obs.handler)(&Change {
            target: self.clone(),
            key: key.to_string(),
            path,
            new_value,
            old_value,
        });
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "Array" } else { "Object" };
        write!(f, "{kind}@{:x}(len={})", self.addr(), self.len())
    }
}

/// Attach `on_change` to a container value.
///
/// Idempotent: containers that are already observed keep their observer.
/// Primitives, functions, nodes, hosts and frozen containers pass through.
pub fn make_reactive(value: Value, debug_name: &str, on_change: ChangeHandler) -> Value {
    if let Some(handle) = value.as_handle() {
        handle.observe(on_change, "", debug_name);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (ChangeHandler, Rc<RefCell<Vec<(String, Value, Value)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let handler: ChangeHandler = Rc::new(move |c: &Change| {
            l.borrow_mut().push((c.path.clone(), c.new_value.clone(), c.old_value.clone()));
        });
        (handler, log)
    }

    #[test]
    fn test_set_notifies_once() {
        let (handler, log) = recorder();
        let data = make_reactive(Value::object(), "root", handler);
        let h = data.as_handle().unwrap();
        assert_eq!(h.set("count", 1.into()), Ok(true));
        assert_eq!(h.set("count", 1.into()), Ok(false));
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "count");
        assert!(log[0].2.is_undefined());
    }

    #[test]
    fn test_reserved_prefix_silent() {
        let (handler, log) = recorder();
        let data = make_reactive(Value::object(), "root", handler);
        data.as_handle().unwrap().set("__inflight", true.into()).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(data.get("__inflight").as_bool(), Some(true));
    }

    #[test]
    fn test_nested_path_extended() {
        let (handler, log) = recorder();
        let inner = Value::object();
        let root = Value::object_from([("user".to_string(), inner)]);
        let root = make_reactive(root, "root", handler);
        let user = root.get("user");
        user.set("name", "ada".into());
        assert_eq!(log.borrow()[0].0, "user.name");
    }

    #[test]
    fn test_shifted_elements_report_current_index() {
        let (handler, log) = recorder();
        let items = Value::array(vec![
            Value::object_from([("name".to_string(), "a".into())]),
            Value::object_from([("name".to_string(), "b".into())]),
        ]);
        let list = make_reactive(Value::object_from([("items".to_string(), items)]), "root", handler);
        let items = list.get("items");
        let second = items.get("1");
        let address = second.get("address");
        assert!(address.is_undefined());
        second.set("address", Value::object());
        let address = second.get("address");

        items.as_handle().unwrap().remove(0).unwrap();
        log.borrow_mut().clear();
        second.set("name", "b2".into());
        address.set("city", "Oslo".into());
        assert_eq!(log.borrow()[0].0, "items.0.name");
        assert_eq!(log.borrow()[1].0, "items.0.address.city");

        items.as_handle().unwrap().insert(0, Value::object()).unwrap();
        log.borrow_mut().clear();
        second.set("name", "b3".into());
        assert_eq!(log.borrow()[0].0, "items.1.name");
    }

    #[test]
    fn test_readonly_accepts_force_set() {
        let h = Handle::new_object(IndexMap::new());
        h.set_readonly(true);
        assert!(matches!(h.set("a", 1.into()), Err(WriteError::ReadOnly(_))));
        assert_eq!(h.force_set("a", 1.into()), Ok(true));
    }

    #[test]
    fn test_array_ops_notify() {
        let (handler, log) = recorder();
        let list = make_reactive(Value::array(vec![]), "list", handler);
        let h = list.as_handle().unwrap();
        h.push("a".into()).unwrap();
        h.push("b".into()).unwrap();
        assert_eq!(h.pop().unwrap().as_str(), Some("b"));
        h.clear().unwrap();
        let paths: Vec<String> = log.borrow().iter().map(|(p, _, _)| p.clone()).collect();
        assert_eq!(paths, vec!["0", "1", "1", "length"]);
    }

    #[test]
    fn test_handler_may_reenter() {
        let data = Value::object();
        let weak_target = data.clone();
        let handler: ChangeHandler = Rc::new(move |c: &Change| {
            if c.key == "a" {
                weak_target.set("b", c.new_value.clone());
            }
        });
        let data = make_reactive(data, "root", handler);
        data.set("a", 5.into());
        assert_eq!(data.get("b").as_number(), Some(5.0));
    }
}
