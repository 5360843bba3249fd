//! Content directives and raw interpolation
//!
//! `data-text`, `data-html` and `data-safe-html` own the element's content;
//! its children are never processed. Text nodes containing `{{{ }}}` are
//! turned into an anchor comment followed by the parsed output.

use std::rc::Rc;

use tessel_dom::NodeId;
use tracing::{trace, warn};

use crate::runtime::Runtime;
use crate::scope::RenderContext;

pub(crate) struct RawBinding {
    pub template: Rc<str>,
    /// Top-level nodes parsed from the latest output
    pub rendered: Vec<NodeId>,
    pub html: Option<String>,
}

impl Runtime {
    /// Swap a raw-interpolated text node for an anchor comment
    pub(super) fn init_raw(&self, node: NodeId, text: &str) -> NodeId {
        let anchor = {
            let mut doc = self.document.borrow_mut();
            let anchor = doc.tree.create_comment(" raw ");
            let _ = doc.tree.replace(node, anchor);
            anchor
        };
        self.nodes.borrow_mut().remove(&node);
        self.with_state(anchor, |s| {
            s.raw = Some(RawBinding { template: Rc::from(text), rendered: Vec::new(), html: None })
        });
        anchor
    }

    pub(super) fn process_raw(&self, anchor: NodeId, ctx: &RenderContext) {
        let Some(template) = self.read_state(anchor, |s| s.raw.as_ref().map(|b| b.template.clone())).flatten() else {
            return;
        };
        let html = self.interpolate_text_node_html(&template, ctx);
        let unchanged = self
            .read_state(anchor, |s| s.raw.as_ref().is_some_and(|b| b.html.as_deref() == Some(html.as_str())))
            .unwrap_or(false);
        if unchanged {
            return;
        }

        let old = self
            .with_state(anchor, |s| s.raw.as_mut().map(|b| std::mem::take(&mut b.rendered)))
            .unwrap_or_default();
        for node in &old {
            self.dispose(*node);
            let _ = self.document.borrow_mut().tree.detach(*node);
        }

        let rendered = {
            let mut doc = self.document.borrow_mut();
            let tree = &mut doc.tree;
            match tessel_html::parse_fragment(&html, tree) {
                Ok(fragment) => {
                    let nodes = tree.child_ids(fragment);
                    if let Some(parent) = tree.parent(anchor) {
                        let next = tree.next_sibling(anchor);
                        let _ = tree.insert_before(parent, fragment, next);
                    }
                    nodes
                }
                Err(err) => {
                    warn!(error = %err, "raw interpolation output failed to parse");
                    Vec::new()
                }
            }
        };
        trace!(nodes = rendered.len(), "raw interpolation rendered");
        self.with_state(anchor, |s| {
            if let Some(binding) = s.raw.as_mut() {
                binding.rendered = rendered;
                binding.html = Some(html);
            }
        });
    }

    /// `data-text`: replace the content with the stringified value
    pub(super) fn apply_text_content(&self, node: NodeId, ctx: &RenderContext) {
        let Some(source) = self.doc().tree.attr(node, "data-text").map(str::to_string) else {
            return;
        };
        let text = self.stringify(&self.evaluate_filtered(&source, ctx));
        if self.doc().tree.text_content(node) == text {
            return;
        }
        self.clear_children(node);
        let mut doc = self.document.borrow_mut();
        let child = doc.tree.create_text(&text);
        let _ = doc.tree.append_child(node, child);
    }

    /// `data-html` / `data-safe-html`: replace the content with parsed
    /// markup. Unsanitized markup needs `allow_raw_html`; without it the
    /// markup is sanitized.
    pub(super) fn apply_html_content(&self, node: NodeId, ctx: &RenderContext, safe: bool) {
        let attr = if safe { "data-safe-html" } else { "data-html" };
        let Some(source) = self.doc().tree.attr(node, attr).map(str::to_string) else {
            return;
        };
        let value = self.evaluate_filtered(&source, ctx);
        let html = if value.is_nullish() { self.config.empty_placeholder.clone() } else { self.stringify(&value) };
        if self.read_state(node, |s| s.html_source.as_deref() == Some(html.as_str())).unwrap_or(false) {
            return;
        }

        let sanitize = safe || !self.config.allow_raw_html;
        if !safe && sanitize {
            warn!(expression = %source, "data-html needs allow_raw_html; markup sanitized");
        }

        self.clear_children(node);
        {
            let mut doc = self.document.borrow_mut();
            let tree = &mut doc.tree;
            let parsed = if sanitize {
                tessel_html::parse_sanitized(&html, tree)
            } else {
                tessel_html::parse_fragment(&html, tree)
            };
            match parsed {
                Ok(fragment) => {
                    let _ = tree.append_child(node, fragment);
                }
                Err(err) => warn!(error = %err, "html content failed to parse"),
            }
        }
        self.with_state(node, |s| s.html_source = Some(html));
    }
}
