//! Prop sources on the host element
//!
//! A prop comes from, highest priority first: props passed by the
//! application, `data-bind:prop` (or `data-model` for the model prop), a
//! plain attribute (coerced to the declared type, interpolation allowed),
//! the declared default.

use std::rc::Rc;

use indexmap::IndexMap;
use tessel_dom::{Event, Listener, NodeId};
use tessel_store::Value;
use tracing::{debug, error};

use super::definition::ComponentDefinition;
use crate::interpolate::has_interpolation;
use crate::runtime::Runtime;
use crate::scope::RenderContext;

#[derive(Debug, Clone)]
pub(crate) enum PropSource {
    /// `data-bind:prop="expr"`, written back on `update:prop` with `.sync`
    Bound { expression: String, sync: bool },
    Static(String),
    Template(Rc<str>),
}

/// Collect the prop sources declared on `host`
pub(crate) fn prop_sources(rt: &Runtime, host: NodeId, definition: &ComponentDefinition) -> IndexMap<String, PropSource> {
    let attrs = rt.doc().tree.attrs(host);
    let mut sources = IndexMap::new();
    for (name, value) in attrs {
        if let Some(target) = name.strip_prefix("data-bind:") {
            let (target, sync) = match target.strip_suffix(".sync") {
                Some(target) => (target, true),
                None => (target, false),
            };
            if let Some(prop) = definition.prop_for_attribute(target) {
                sources.insert(prop.to_string(), PropSource::Bound { expression: value, sync });
            }
        } else if name == "data-model" {
            if let Some(model) = &definition.model {
                sources.insert(model.prop.clone(), PropSource::Bound { expression: value, sync: false });
            }
        } else if name.starts_with("data-") {
            continue;
        } else if let Some(prop) = definition.prop_for_attribute(&name) {
            let source = if has_interpolation(&value) {
                PropSource::Template(Rc::from(value.as_str()))
            } else {
                PropSource::Static(value)
            };
            sources.entry(prop.to_string()).or_insert(source);
        }
    }
    sources
}

/// Current value of every declared prop
pub(crate) fn evaluate(
    rt: &Runtime,
    definition: &ComponentDefinition,
    sources: &IndexMap<String, PropSource>,
    parent: &RenderContext,
    explicit: Option<&Value>,
) -> IndexMap<String, Value> {
    let mut props = IndexMap::new();
    for (name, def) in &definition.props {
        let value = match (explicit.filter(|e| e.has(name)), sources.get(name)) {
            (Some(explicit), _) => explicit.get(name),
            (None, Some(PropSource::Bound { expression, .. })) => rt.evaluate_filtered(expression, parent),
            (None, Some(PropSource::Static(raw))) => def.coerce(name, raw),
            (None, Some(PropSource::Template(template))) => def.coerce(name, &rt.interpolate_text(template, parent)),
            (None, None) => Value::Undefined,
        };
        let value = if value.is_undefined() { def.fallback() } else { value };
        props.insert(name.clone(), value);
    }
    props
}

impl Runtime {
    /// Write-back listeners on the host: `update:prop` for `.sync` bindings
    /// and the model event for `data-model`
    pub(crate) fn bind_prop_sync(&self, host: NodeId, definition: &ComponentDefinition, sources: &IndexMap<String, PropSource>) {
        let model_prop = definition.model.as_ref().filter(|_| self.doc().tree.has_attr(host, "data-model"));
        for (prop, source) in sources {
            let PropSource::Bound { expression, sync } = source else {
                continue;
            };
            if *sync {
                self.bind_write_back(host, &format!("sync:{prop}"), &format!("update:{prop}"), expression);
            }
            if let Some(model) = model_prop
                && model.prop == *prop
            {
                self.bind_write_back(host, "model", &model.event, expression);
            }
        }
    }

    fn bind_write_back(&self, host: NodeId, key: &str, event_type: &str, expression: &str) {
        let me = self.weak();
        let expression: Rc<str> = Rc::from(expression);
        let listener: Listener = Rc::new(move |event: &mut Event| {
            // Events re-emitted by nested components are not ours.
            if event.target != host {
                return;
            }
            if let Some(rt) = me.upgrade() {
                rt.write_to_parent(host, &expression, event);
            }
        });
        self.attach_listener(host, key, event_type, listener);
    }

    fn write_to_parent(&self, host: NodeId, expression: &str, event: &Event) {
        let Some(ctx) = self.read_state(host, |s| s.context.clone()).flatten() else {
            return;
        };
        let value = self.event_value(event);
        debug!(binding = expression, event = %event.event_type, "prop written back to parent");
        self.assign(expression, &ctx, value);
        if let Some(err) = self.take_failure() {
            error!(binding = expression, error = %err, "prop write-back failed");
        }
    }
}
