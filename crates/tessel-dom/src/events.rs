//! DOM Events
//!
//! Listener registry and bubbling dispatch. Listeners are reference-counted
//! closures; dispatch clones the handlers for a node out of the registry
//! before calling them so a handler is free to mutate the document (and
//! the registry) while it runs.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::{Document, NodeId};

/// Event listener callback
pub type Listener = Rc<dyn Fn(&mut Event)>;

/// Handle returned by [`ListenerRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Options accepted by `addEventListener`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,
}

/// DOM event
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: NodeId,
    pub bubbles: bool,
    pub composed: bool,
    pub cancelable: bool,
    /// Payload of custom events
    pub detail: Option<Rc<dyn Any>>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl Event {
    /// Non-bubbling event
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: NodeId::NONE,
            current_target: NodeId::NONE,
            bubbles: false,
            composed: false,
            cancelable: true,
            detail: None,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    /// Bubbling event (click, input, change)
    pub fn bubbling(event_type: &str) -> Self {
        Self { bubbles: true, ..Self::new(event_type) }
    }

    /// Bubbling, composed custom event carrying `detail`
    pub fn custom(event_type: &str, detail: Rc<dyn Any>) -> Self {
        Self {
            bubbles: true,
            composed: true,
            detail: Some(detail),
            ..Self::new(event_type)
        }
    }

    /// Downcast the detail payload
    pub fn detail_as<T: 'static>(&self) -> Option<&T> {
        self.detail.as_ref()?.downcast_ref::<T>()
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .field("bubbles", &self.bubbles)
            .field("has_detail", &self.detail.is_some())
            .field("default_prevented", &self.default_prevented)
            .finish()
    }
}

struct Entry {
    id: ListenerId,
    node: NodeId,
    event_type: String,
    callback: Listener,
    options: ListenerOptions,
}

/// All listeners of a tree, keyed by node
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Entry>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn add(
        &mut self,
        node: NodeId,
        event_type: &str,
        callback: Listener,
        options: ListenerOptions,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Entry {
            id,
            node,
            event_type: event_type.to_string(),
            callback,
            options,
        });
        id
    }

    /// Remove one listener, returns true if it existed
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Remove every listener on a node, returns how many were removed
    pub fn remove_all(&mut self, node: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.node != node);
        before - self.entries.len()
    }

    /// Is the listener still registered
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Snapshot of the listeners for a node and event type, in order
    pub fn listeners_for(&self, node: NodeId, event_type: &str) -> Vec<(ListenerId, Listener, ListenerOptions)> {
        self.entries
            .iter()
            .filter(|e| e.node == node && e.event_type == event_type)
            .map(|e| (e.id, Rc::clone(&e.callback), e.options))
            .collect()
    }

    /// Total number of listeners
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Number of listeners on one node
    pub fn count_for(&self, node: NodeId) -> usize {
        self.entries.iter().filter(|e| e.node == node).count()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Dispatch an event at `target`, walking up the parent chain if it bubbles.
///
/// The document is only borrowed between handler calls. Returns false if a
/// handler called `prevent_default`.
pub fn dispatch_event(document: &RefCell<Document>, target: NodeId, event: &mut Event) -> bool {
    event.target = target;
    trace!(event = %event.event_type, target = %target, "dispatching event");

    let path: Vec<NodeId> = {
        let doc = document.borrow();
        let mut path = vec![target];
        if event.bubbles {
            let mut current = doc.tree.parent(target);
            while let Some(id) = current {
                path.push(id);
                current = doc.tree.parent(id);
            }
        }
        path
    };

    for node in path {
        event.current_target = node;
        let handlers = document.borrow().tree.listeners().listeners_for(node, &event.event_type);
        for (id, callback, options) in handlers {
            let registered = if options.once {
                document.borrow_mut().tree.listeners_mut().remove(id)
            } else {
                document.borrow().tree.listeners().contains(id)
            };
            // Removed by an earlier handler of this dispatch.
            if !registered {
                continue;
            }
            callback(event);
            if event.immediate_propagation_stopped {
                break;
            }
        }
        if event.propagation_stopped {
            break;
        }
    }

    event.current_target = NodeId::NONE;
    !event.default_prevented
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn doc_with_button() -> (RefCell<Document>, NodeId, NodeId) {
        let mut doc = Document::new("app");
        let mount = doc.mount();
        let button = doc.tree.create_element("button");
        doc.tree.append_child(mount, button).unwrap();
        (RefCell::new(doc), mount, button)
    }

    #[test]
    fn test_bubbles_to_ancestors() {
        let (doc, mount, button) = doc_with_button();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        doc.borrow_mut().tree.listeners_mut().add(
            mount,
            "click",
            Rc::new(move |e: &mut Event| {
                assert_eq!(e.current_target, mount);
                h.set(h.get() + 1);
            }),
            ListenerOptions::default(),
        );
        dispatch_event(&doc, button, &mut Event::bubbling("click"));
        dispatch_event(&doc, button, &mut Event::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_once_listener_runs_once() {
        let (doc, _, button) = doc_with_button();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        doc.borrow_mut().tree.listeners_mut().add(
            button,
            "click",
            Rc::new(move |_| h.set(h.get() + 1)),
            ListenerOptions { once: true },
        );
        dispatch_event(&doc, button, &mut Event::bubbling("click"));
        dispatch_event(&doc, button, &mut Event::bubbling("click"));
        assert_eq!(hits.get(), 1);
        assert_eq!(doc.borrow().tree.listeners().count(), 0);
    }

    #[test]
    fn test_handler_may_mutate_document() {
        let (doc, mount, button) = doc_with_button();
        let doc = Rc::new(doc);
        let weak = Rc::downgrade(&doc);
        doc.borrow_mut().tree.listeners_mut().add(
            button,
            "click",
            Rc::new(move |_| {
                if let Some(doc) = weak.upgrade() {
                    doc.borrow_mut().tree.set_attr(mount, "data-clicked", "yes");
                }
            }),
            ListenerOptions::default(),
        );
        dispatch_event(&doc, button, &mut Event::bubbling("click"));
        assert_eq!(doc.borrow().tree.attr(mount, "data-clicked"), Some("yes"));
    }

    #[test]
    fn test_stop_propagation() {
        let (doc, mount, button) = doc_with_button();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut reg = doc.borrow_mut();
        reg.tree.listeners_mut().add(
            button,
            "click",
            Rc::new(|e: &mut Event| e.stop_propagation()),
            ListenerOptions::default(),
        );
        reg.tree.listeners_mut().add(
            mount,
            "click",
            Rc::new(move |_| h.set(h.get() + 1)),
            ListenerOptions::default(),
        );
        drop(reg);
        dispatch_event(&doc, button, &mut Event::bubbling("click"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_custom_event_detail() {
        let event = Event::custom("selected", Rc::new(42_i32));
        assert!(event.bubbles && event.composed);
        assert_eq!(event.detail_as::<i32>(), Some(&42));
        assert_eq!(event.detail_as::<String>(), None);
    }
}
