//! `data-if`
//!
//! The element is swapped with a placeholder comment while the condition is
//! false. Exactly one of the two is in the parent at any time. Each time the
//! condition turns true a fresh clone of the original element is inserted.

use std::rc::Rc;

use tessel_dom::NodeId;
use tracing::trace;

use crate::runtime::Runtime;
use crate::scope::RenderContext;

pub(crate) struct ConditionalBinding {
    pub expression: Rc<str>,
    /// Detached original, without `data-if`
    pub template: NodeId,
    /// Live clone, `None` while the placeholder is shown
    pub live: Option<NodeId>,
}

impl Runtime {
    /// First encounter: capture the template, turn `node` into the live
    /// clone and create its (detached) placeholder
    pub(super) fn init_conditional(&self, node: NodeId) -> NodeId {
        let (placeholder, template, expression) = {
            let mut doc = self.document.borrow_mut();
            let tree = &mut doc.tree;
            let expression = tree.attr(node, "data-if").unwrap_or_default().to_string();
            tree.remove_attr(node, "data-if");
            let placeholder = tree.create_comment(&format!(" if: {expression} "));
            let template = tree.clone_node(node, true).unwrap_or(node);
            (placeholder, template, expression)
        };

        self.with_state(placeholder, |s| {
            s.conditional = Some(ConditionalBinding {
                expression: Rc::from(expression.as_str()),
                template,
                live: Some(node),
            })
        });
        self.with_state(node, |s| s.live_of = Some(placeholder));
        placeholder
    }

    pub(super) fn process_conditional(&self, placeholder: NodeId, ctx: &RenderContext) {
        let Some((expression, template, live)) = self.read_state(placeholder, |s| {
            s.conditional.as_ref().map(|b| (b.expression.clone(), b.template, b.live))
        })
        .flatten() else {
            return;
        };

        let show = self.evaluate(&expression, ctx).truthy();
        match (show, live) {
            (true, Some(live)) => self.process_element_body(live, ctx),
            (true, None) => {
                let clone = {
                    let mut doc = self.document.borrow_mut();
                    let Ok(clone) = doc.tree.clone_node(template, true) else {
                        return;
                    };
                    if doc.tree.replace(placeholder, clone).is_err() {
                        return;
                    }
                    clone
                };
                trace!(expression = %expression, "condition became true");
                self.with_state(clone, |s| s.live_of = Some(placeholder));
                self.set_live(placeholder, Some(clone));
                self.process_element_body(clone, ctx);
            }
            (false, Some(live)) => {
                if self.document.borrow_mut().tree.replace(live, placeholder).is_err() {
                    return;
                }
                trace!(expression = %expression, "condition became false");
                self.with_state(live, |s| s.live_of = None);
                self.dispose(live);
                self.set_live(placeholder, None);
            }
            (false, None) => {}
        }
    }

    fn set_live(&self, placeholder: NodeId, live: Option<NodeId>) {
        self.with_state(placeholder, |s| {
            if let Some(binding) = s.conditional.as_mut() {
                binding.live = live;
            }
        });
    }
}
