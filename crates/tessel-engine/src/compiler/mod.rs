//! Directive processor
//!
//! Walks live DOM subtrees and applies directives in a fixed order per
//! element:
//!
//! 1. `data-if` (placeholder comment + live clone)
//! 2. registered component tag (delegated to the component runtime)
//! 3. `data-repeat` (anchor comment + rendered clones)
//! 4. `data-show`
//! 5. attribute sweep: events, model, bindings, custom directives,
//!    interpolated plain attributes
//! 6. `data-fetch`
//! 7. `data-text` / `data-html` / `data-safe-html` (children not processed)
//! 8. children
//!
//! Interpolation templates are captured from a node the first time it is
//! processed, so later passes render from the original text and only touch
//! the DOM when the output changes.

mod bindings;
mod conditional;
mod content;
mod events;
mod model;
mod repeat;

use std::collections::HashMap;
use std::rc::Rc;

use tessel_dom::{ListenerId, NodeData, NodeId};

use crate::interpolate::has_interpolation;
use crate::runtime::Runtime;
use crate::scope::RenderContext;

pub(crate) use conditional::ConditionalBinding;
pub(crate) use content::RawBinding;
pub(crate) use repeat::RepeatBinding;

/// Per-node bookkeeping
#[derive(Default)]
pub(crate) struct NodeState {
    /// Original text of an interpolated text node
    pub text: Option<Rc<str>>,
    /// Plain attributes with interpolation markers, captured once
    pub attr_templates: Option<Vec<(String, Rc<str>)>>,
    /// `class` / `style` as written, before bindings
    pub static_class: Option<String>,
    pub static_style: Option<String>,
    /// On a placeholder comment
    pub conditional: Option<ConditionalBinding>,
    /// On a live conditional clone: its placeholder
    pub live_of: Option<NodeId>,
    /// On a loop anchor
    pub repeat: Option<RepeatBinding>,
    /// On a raw-interpolation anchor
    pub raw: Option<RawBinding>,
    /// Listener per directive attribute (`data-on:click`, `data-model`)
    pub listeners: HashMap<String, (String, ListenerId)>,
    /// Context of the latest pass; handlers resolve against it at fire time
    pub context: Option<RenderContext>,
    /// `(pass, context key)` of the latest processing
    pub memo: Option<(u64, u64)>,
    /// Signature of this node's in-flight fetch
    pub fetch_inflight: Option<String>,
    /// Last markup written by `data-html` / `data-safe-html`
    pub html_source: Option<String>,
    /// On a slot region's start comment: its end comment
    pub slot_end: Option<NodeId>,
}

enum Kind {
    Element,
    Text,
    Comment,
    Other,
}

impl Runtime {
    /// Process the children of `parent`. Nodes inserted during the walk
    /// (loop clones) are processed by their directive, nodes removed
    /// during the walk are skipped, slot regions belong to the parent
    /// context and are skipped.
    pub(crate) fn process_children(&self, parent: NodeId, ctx: &RenderContext) {
        let children = self.doc().tree.child_ids(parent);
        let mut skip_until: Option<NodeId> = None;
        for child in children {
            if self.failed() || self.is_torn_down() {
                return;
            }
            if let Some(end) = skip_until {
                if child == end {
                    skip_until = None;
                }
                continue;
            }
            if self.doc().tree.parent(child) != Some(parent) {
                continue;
            }
            if let Some(end) = self.read_state(child, |s| s.slot_end).flatten() {
                skip_until = Some(end);
                continue;
            }
            self.process_node(child, ctx);
        }
    }

    pub(crate) fn process_node(&self, node: NodeId, ctx: &RenderContext) {
        let kind = match self.doc().tree.get(node).map(|n| &n.data) {
            Some(NodeData::Element(_)) => Kind::Element,
            Some(NodeData::Text(_)) => Kind::Text,
            Some(NodeData::Comment(_)) => Kind::Comment,
            _ => Kind::Other,
        };
        match kind {
            Kind::Element => {
                if !self.enter(node) {
                    return;
                }
                self.process_element(node, ctx);
                self.leave();
            }
            Kind::Text => self.process_text(node, ctx),
            Kind::Comment => self.process_anchor(node, ctx),
            Kind::Other => {}
        }
    }

    fn process_anchor(&self, node: NodeId, ctx: &RenderContext) {
        let (is_conditional, is_repeat, is_raw) = self
            .read_state(node, |s| (s.conditional.is_some(), s.repeat.is_some(), s.raw.is_some()))
            .unwrap_or_default();
        if is_conditional {
            self.process_conditional(node, ctx);
        } else if is_repeat {
            self.process_repeat(node, ctx);
        } else if is_raw {
            self.process_raw(node, ctx);
        }
    }

    fn process_element(&self, node: NodeId, ctx: &RenderContext) {
        if let Some(placeholder) = self.read_state(node, |s| s.live_of).flatten() {
            self.process_conditional(placeholder, ctx);
            return;
        }
        if self.doc().tree.has_attr(node, "data-if") {
            let placeholder = self.init_conditional(node);
            self.process_conditional(placeholder, ctx);
            return;
        }
        self.process_element_body(node, ctx);
    }

    /// Steps 2 to 8 for a node whose condition (if any) holds
    pub(crate) fn process_element_body(&self, node: NodeId, ctx: &RenderContext) {
        let key = (self.pass(), ctx.key());
        let seen = self.with_state(node, |s| {
            let seen = s.memo == Some(key);
            s.memo = Some(key);
            s.context = Some(ctx.clone());
            seen
        });
        if seen {
            return;
        }

        let (tag, attr_names) = {
            let doc = self.doc();
            let Some(element) = doc.tree.element(node) else {
                return;
            };
            let names: Vec<String> = element.attrs.iter().map(|a| a.name.clone()).collect();
            (element.tag.clone(), names)
        };
        let has = |name: &str| attr_names.iter().any(|a| a == name);

        let definition = self.components.borrow().get(&tag);
        if let Some(definition) = definition {
            self.process_component(node, definition, ctx);
            return;
        }

        if has("data-repeat") {
            let anchor = self.init_repeat(node);
            self.process_repeat(anchor, ctx);
            return;
        }

        if has("data-show") {
            self.apply_show(node, ctx);
        }

        self.sweep_attributes(node, ctx);

        if has("data-fetch") {
            self.process_fetch(node, ctx);
        }

        if has("data-text") {
            self.apply_text_content(node, ctx);
            return;
        }
        if has("data-html") {
            self.apply_html_content(node, ctx, false);
            return;
        }
        if has("data-safe-html") {
            self.apply_html_content(node, ctx, true);
            return;
        }

        // Slot wrappers left in a component template have no meaning of their own.
        if tag == "template" && has("data-slot") {
            return;
        }
        self.process_children(node, ctx);
    }

    /// Re-interpolate a text node from its original template
    fn process_text(&self, node: NodeId, ctx: &RenderContext) {
        let template = match self.read_state(node, |s| s.text.clone()).flatten() {
            Some(template) => template,
            None => {
                let text = match self.doc().tree.get(node).and_then(|n| n.as_text()) {
                    Some(text) if has_interpolation(text) => text.to_string(),
                    _ => return,
                };
                if text.contains("{{{") {
                    let anchor = self.init_raw(node, &text);
                    self.process_raw(anchor, ctx);
                    return;
                }
                let template: Rc<str> = Rc::from(text.as_str());
                self.with_state(node, |s| s.text = Some(template.clone()));
                template
            }
        };
        let rendered = self.interpolate_text(&template, ctx);
        self.document.borrow_mut().tree.set_text(node, &rendered);
    }
}
