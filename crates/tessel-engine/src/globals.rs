//! Global state and global data
//!
//! Two reactive containers owned by the engine and threaded into every
//! scope. Global state additionally supports path watchers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessel_store::{deep_clone, deep_equal, get_by_path, make_reactive, ChangeHandler, Value};
use tracing::debug;

/// Handle returned by state watchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

/// State watcher callback `(new, old)`
pub type StateWatchFn = Rc<dyn Fn(&Value, &Value)>;

struct StateWatcher {
    id: WatchId,
    path: String,
    callback: StateWatchFn,
    last: Value,
}

/// `a` and `b` name the same value or one contains the other
pub(crate) fn paths_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| inner.len() > outer.len() && inner.starts_with(outer) && inner.as_bytes()[outer.len()] == b'.';
    a == b || nested(a, b) || nested(b, a)
}

pub(crate) struct Globals {
    state: Value,
    data: Value,
    watchers: RefCell<Vec<StateWatcher>>,
    next_watch: Cell<u64>,
}

impl Globals {
    pub fn new(on_state: ChangeHandler, on_data: ChangeHandler) -> Self {
        Self {
            state: make_reactive(Value::object(), "$state", on_state),
            data: make_reactive(Value::object(), "$global", on_data),
            watchers: RefCell::new(Vec::new()),
            next_watch: Cell::new(0),
        }
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn watch(&self, path: &str, callback: StateWatchFn) -> WatchId {
        self.next_watch.set(self.next_watch.get() + 1);
        let id = WatchId(self.next_watch.get());
        let last = deep_clone(&get_by_path(&self.state, path));
        self.watchers.borrow_mut().push(StateWatcher { id, path: path.to_string(), callback, last });
        debug!(path, "state watcher added");
        id
    }

    pub fn unwatch(&self, id: WatchId) -> bool {
        let mut watchers = self.watchers.borrow_mut();
        let before = watchers.len();
        watchers.retain(|w| w.id != id);
        watchers.len() != before
    }

    /// Run watchers related to `changed` whose value actually differs
    pub fn dispatch(&self, changed: &str) {
        let mut due = Vec::new();
        {
            let mut watchers = self.watchers.borrow_mut();
            for watcher in watchers.iter_mut().filter(|w| paths_overlap(&w.path, changed)) {
                let current = get_by_path(&self.state, &watcher.path);
                if deep_equal(&current, &watcher.last) {
                    continue;
                }
                let old = std::mem::replace(&mut watcher.last, deep_clone(&current));
                due.push((watcher.callback.clone(), current, old));
            }
        }
        for (callback, new, old) in due {
            callback(&new, &old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> Globals {
        Globals::new(Rc::new(|_| {}), Rc::new(|_| {}))
    }

    #[test]
    fn test_paths_overlap() {
        assert!(paths_overlap("user", "user"));
        assert!(paths_overlap("user", "user.name"));
        assert!(paths_overlap("user.name", "user"));
        assert!(!paths_overlap("user", "username"));
        assert!(!paths_overlap("a.b", "a.c"));
    }

    #[test]
    fn test_watchers_fire_on_real_change_only() {
        let g = globals();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        g.watch("user.name", Rc::new(move |new, old| {
            s.borrow_mut().push((new.to_display_string(), old.to_display_string()));
        }));

        tessel_store::set_by_path(g.state(), "user.name", "ada".into());
        g.dispatch("user.name");
        g.dispatch("user");
        assert_eq!(*seen.borrow(), vec![("ada".to_string(), "undefined".to_string())]);
    }

    #[test]
    fn test_unwatch() {
        let g = globals();
        let id = g.watch("x", Rc::new(|_, _| panic!("should not run")));
        assert!(g.unwatch(id));
        assert!(!g.unwatch(id));
        g.state().set("x", 1.into());
        g.dispatch("x");
    }
}
