//! `data-on:<event>[.prevent][.stop]`
//!
//! One listener per (node, directive attribute). The handler expression is
//! evaluated at fire time against the node's latest render context, so a
//! re-render never needs to rebind.

use std::rc::Rc;

use tessel_dom::{Event, Listener, ListenerOptions, NodeId};
use tessel_store::Value;
use tracing::{error, trace};

use crate::runtime::Runtime;

/// Event name and modifiers of an `data-on:` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EventSpec {
    pub event: String,
    pub prevent: bool,
    pub stop: bool,
}

impl EventSpec {
    pub fn parse(attr: &str) -> Option<Self> {
        let rest = attr.strip_prefix("data-on:")?;
        let mut parts = rest.split('.');
        let event = parts.next().filter(|e| !e.is_empty())?.to_string();
        let mut spec = EventSpec { event, prevent: false, stop: false };
        for modifier in parts {
            match modifier {
                "prevent" => spec.prevent = true,
                "stop" => spec.stop = true,
                _ => {}
            }
        }
        Some(spec)
    }
}

impl Runtime {
    /// Attach the handler for `attr` on `node` unless it is already attached
    pub(crate) fn bind_event(&self, node: NodeId, attr: &str, expression: &str) {
        let Some(spec) = EventSpec::parse(attr) else {
            return;
        };
        let me = self.weak();
        let expression: Rc<str> = Rc::from(expression);
        let (prevent, stop) = (spec.prevent, spec.stop);
        let listener: Listener = Rc::new(move |event: &mut Event| {
            if prevent {
                event.prevent_default();
            }
            if stop {
                event.stop_propagation();
            }
            if let Some(rt) = me.upgrade() {
                rt.run_handler(node, &expression, event);
            }
        });
        self.attach_listener(node, attr, &spec.event, listener);
    }

    /// Register `listener` under `key`. An existing listener for the same
    /// key is kept if it listens to `event_type`, replaced otherwise.
    pub(crate) fn attach_listener(&self, node: NodeId, key: &str, event_type: &str, listener: Listener) {
        let existing = self.read_state(node, |s| s.listeners.get(key).cloned()).flatten();
        if let Some((current, id)) = existing {
            let live = self.doc().tree.listeners().contains(id);
            if live && current == event_type {
                return;
            }
            self.document.borrow_mut().tree.listeners_mut().remove(id);
        }
        let id = self
            .document
            .borrow_mut()
            .tree
            .listeners_mut()
            .add(node, event_type, listener, ListenerOptions::default());
        trace!(node = %node, event = event_type, "listener attached");
        self.with_state(node, |s| s.listeners.insert(key.to_string(), (event_type.to_string(), id)));
    }

    fn run_handler(&self, node: NodeId, expression: &str, event: &Event) {
        let Some(ctx) = self.read_state(node, |s| s.context.clone()).flatten() else {
            return;
        };
        let event_value = self.event_value(event);
        let (receiver, result) = self.evaluate_receiver(expression, &ctx, &[("$event", event_value.clone())]);
        // `user.greet` runs with `this` bound to `user`.
        let this = if receiver.is_undefined() { ctx.this_value() } else { receiver };
        if let Value::Function(handler) = result
            && let Err(err) = handler.call(&this, &[event_value])
        {
            error!(handler = expression, error = %err, "event handler failed");
        }
        if let Some(err) = self.take_failure() {
            error!(handler = expression, error = %err, "event handler failed");
        }
    }

    /// `$event`: the detail of a component event, else a summary of the DOM event
    pub(crate) fn event_value(&self, event: &Event) -> Value {
        if let Some(detail) = event.detail_as::<Value>() {
            return detail.clone();
        }
        let doc = self.doc();
        let element = doc.tree.element(event.target);
        Value::object_from([
            ("type".to_string(), Value::from(event.event_type.as_str())),
            ("target".to_string(), Value::Node(event.target)),
            ("value".to_string(), element.map(|e| Value::from(e.current_value())).unwrap_or_default()),
            ("checked".to_string(), element.map(|e| Value::Bool(e.checked)).unwrap_or_default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_spec_modifiers() {
        let spec = EventSpec::parse("data-on:submit.prevent.stop").unwrap();
        assert_eq!(spec.event, "submit");
        assert!(spec.prevent && spec.stop);

        let spec = EventSpec::parse("data-on:click").unwrap();
        assert!(!spec.prevent && !spec.stop);

        assert!(EventSpec::parse("data-on:").is_none());
        assert!(EventSpec::parse("data-bind:x").is_none());
    }
}
