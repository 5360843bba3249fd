//! `data-model`: two-way binding on form controls

use std::rc::Rc;

use tessel_dom::{Event, Listener, NodeId};
use tessel_store::Value;
use tracing::{debug, error};

use crate::runtime::Runtime;
use crate::scope::RenderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Checkbox,
    Radio,
    Select,
    Text,
}

impl Control {
    fn event(self) -> &'static str {
        match self {
            Control::Checkbox | Control::Radio | Control::Select => "change",
            Control::Text => "input",
        }
    }
}

impl Runtime {
    fn control_kind(&self, node: NodeId) -> Option<Control> {
        let doc = self.doc();
        let element = doc.tree.element(node)?;
        Some(match (element.tag.as_str(), element.input_type().as_str()) {
            ("input", "checkbox") => Control::Checkbox,
            ("input", "radio") => Control::Radio,
            ("select", _) => Control::Select,
            _ => Control::Text,
        })
    }

    /// Push the bound value into the control and make sure the write-back
    /// listener is attached
    pub(super) fn apply_model(&self, node: NodeId, expression: &str, ctx: &RenderContext) {
        let Some(kind) = self.control_kind(node) else {
            return;
        };
        let value = self.evaluate(expression, ctx);
        {
            let mut doc = self.document.borrow_mut();
            let Some(element) = doc.tree.element_mut(node) else {
                return;
            };
            match kind {
                Control::Checkbox => element.checked = value.truthy(),
                Control::Radio => element.checked = value.to_display_string() == element.current_value(),
                Control::Select | Control::Text => {
                    let text = if value.is_nullish() { String::new() } else { value.to_display_string() };
                    element.value = Some(text);
                }
            }
        }

        let me = self.weak();
        let expression: Rc<str> = Rc::from(expression);
        let listener: Listener = Rc::new(move |_event: &mut Event| {
            if let Some(rt) = me.upgrade() {
                rt.write_back(node, &expression);
            }
        });
        self.attach_listener(node, "data-model", kind.event(), listener);
    }

    fn write_back(&self, node: NodeId, expression: &str) {
        let Some(ctx) = self.read_state(node, |s| s.context.clone()).flatten() else {
            return;
        };
        let Some(kind) = self.control_kind(node) else {
            return;
        };
        let (checked, raw) = {
            let doc = self.doc();
            let Some(element) = doc.tree.element(node) else {
                return;
            };
            (element.checked, element.current_value())
        };
        let value = match kind {
            Control::Checkbox => Value::Bool(checked),
            Control::Radio if !checked => return,
            _ => coerce_like(&self.evaluate(expression, &ctx), raw),
        };
        debug!(model = expression, value = ?value, "model write-back");
        self.assign(expression, &ctx, value);
        if let Some(err) = self.take_failure() {
            error!(model = expression, error = %err, "model write-back failed");
        }
    }
}

/// Convert control text to the type of the value it replaces
fn coerce_like(current: &Value, raw: String) -> Value {
    match current {
        Value::Number(_) => match raw.trim().parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::from(raw),
        },
        Value::Bool(_) => Value::Bool(matches!(raw.as_str(), "true" | "on" | "1")),
        _ => Value::from(raw),
    }
}
