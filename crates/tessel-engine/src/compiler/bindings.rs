//! Attribute sweep: `data-show`, `data-bind:*`, events, models, refs,
//! custom directives and interpolated plain attributes

use std::rc::Rc;

use tessel_dom::{camel_to_kebab, NodeId, StyleDeclarations};
use tessel_store::Value;
use tracing::{error, trace, warn};

use crate::interpolate::has_interpolation;
use crate::registry::DirectiveArgs;
use crate::runtime::Runtime;
use crate::scope::RenderContext;

/// Attributes whose presence is their value
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "disabled", "checked", "selected", "readonly", "required", "hidden", "multiple", "autofocus", "open",
];

/// `data-*` names handled by the compiler itself
const BUILTIN: &[&str] = &[
    "if",
    "repeat",
    "show",
    "model",
    "text",
    "html",
    "safe-html",
    "fetch",
    "fetch-as",
    "fetch-method",
    "fetch-loading-class",
    "fetch-error-class",
    "fetch-cache",
    "ref",
    "slot",
    "component",
    "cid",
];

impl Runtime {
    /// Snapshot `class` and `style` as written, once per node
    fn capture_statics(&self, node: NodeId) {
        if self.read_state(node, |s| s.static_class.is_some()).unwrap_or(false) {
            return;
        }
        let (class, style) = {
            let doc = self.doc();
            (
                doc.tree.attr(node, "class").unwrap_or_default().to_string(),
                doc.tree.attr(node, "style").unwrap_or_default().to_string(),
            )
        };
        self.with_state(node, |s| {
            s.static_class = Some(class);
            s.static_style = Some(style);
        });
    }

    /// `data-show`: hide with `display: none`, restore the written display
    pub(super) fn apply_show(&self, node: NodeId, ctx: &RenderContext) {
        self.capture_statics(node);
        let Some(source) = self.doc().tree.attr(node, "data-show").map(str::to_string) else {
            return;
        };
        let show = self.evaluate(&source, ctx).truthy();
        let original = self
            .read_state(node, |s| s.static_style.clone())
            .flatten()
            .and_then(|css| StyleDeclarations::parse(&css).get_property("display").map(str::to_string));
        let display = if show { original } else { Some("none".to_string()) };
        self.document.borrow_mut().tree.set_style_property(node, "display", display.as_deref());
    }

    pub(super) fn sweep_attributes(&self, node: NodeId, ctx: &RenderContext) {
        self.capture_statics(node);
        let attrs = self.doc().tree.attrs(node);

        let templates = match self.read_state(node, |s| s.attr_templates.clone()).flatten() {
            Some(templates) => templates,
            None => {
                let templates: Vec<(String, Rc<str>)> = attrs
                    .iter()
                    .filter(|(name, value)| !name.starts_with("data-") && has_interpolation(value))
                    .map(|(name, value)| (name.clone(), Rc::from(value.as_str())))
                    .collect();
                self.with_state(node, |s| s.attr_templates = Some(templates.clone()));
                templates
            }
        };

        for (name, value) in &attrs {
            if name.starts_with("data-on:") {
                self.bind_event(node, name, value);
            } else if name == "data-model" {
                self.apply_model(node, value, ctx);
            } else if let Some(target) = name.strip_prefix("data-bind:") {
                let target = target.strip_suffix(".sync").unwrap_or(target);
                self.apply_binding(node, target, value, ctx);
            } else if name == "data-ref" {
                self.register_ref(node, value, ctx);
            } else if let Some(directive) = name.strip_prefix("data-")
                && !BUILTIN.contains(&directive)
            {
                self.run_directive(node, directive, value, ctx);
            }
        }

        for (name, template) in templates {
            let rendered = self.interpolate_text(&template, ctx);
            if self.document.borrow_mut().tree.set_attr(node, &name, &rendered) {
                trace!(node = %node, attr = %name, "attribute re-interpolated");
            }
        }
    }

    fn apply_binding(&self, node: NodeId, target: &str, expression: &str, ctx: &RenderContext) {
        let value = self.evaluate_filtered(expression, ctx);
        match target {
            "class" => self.bind_class(node, &value),
            "style" => self.bind_style(node, &value),
            name if BOOLEAN_ATTRIBUTES.contains(&name) => {
                let mut doc = self.document.borrow_mut();
                if value.truthy() {
                    doc.tree.set_attr(node, name, "");
                } else {
                    doc.tree.remove_attr(node, name);
                }
            }
            name => {
                let mut doc = self.document.borrow_mut();
                if value.is_nullish() {
                    doc.tree.remove_attr(node, name);
                    return;
                }
                let text = match &value {
                    Value::Array(_) | Value::Object(_) => value.to_json_string(),
                    other => other.to_display_string(),
                };
                if name == "value"
                    && let Some(element) = doc.tree.element_mut(node)
                {
                    element.value = Some(text.clone());
                }
                doc.tree.set_attr(node, name, &text);
            }
        }
    }

    /// Static classes first, then the bound ones: a string, an array of
    /// names or an object of `name: condition`
    fn bind_class(&self, node: NodeId, value: &Value) {
        let static_class = self.read_state(node, |s| s.static_class.clone()).flatten().unwrap_or_default();
        let mut tokens: Vec<String> = static_class.split_whitespace().map(str::to_string).collect();
        let mut push = |token: &str| {
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        };
        match value {
            Value::String(s) => s.split_whitespace().for_each(&mut push),
            Value::Array(h) => {
                for item in h.items() {
                    if let Some(s) = item.as_str() {
                        s.split_whitespace().for_each(&mut push);
                    }
                }
            }
            Value::Object(h) => {
                for (name, on) in h.entries() {
                    if on.truthy() {
                        push(&name);
                    }
                }
            }
            _ => {}
        }

        let mut doc = self.document.borrow_mut();
        if tokens.is_empty() {
            doc.tree.remove_attr(node, "class");
        } else {
            doc.tree.set_attr(node, "class", &tokens.join(" "));
        }
    }

    /// Static style first, then an object of properties (camelCase allowed)
    /// or a CSS string
    fn bind_style(&self, node: NodeId, value: &Value) {
        let static_style = self.read_state(node, |s| s.static_style.clone()).flatten().unwrap_or_default();
        let mut style = StyleDeclarations::parse(&static_style);
        match value {
            Value::Object(h) => {
                for (prop, v) in h.entries() {
                    if v.is_nullish() || matches!(v, Value::Bool(false)) {
                        continue;
                    }
                    style.set_property(&camel_to_kebab(&prop), &v.to_display_string());
                }
            }
            Value::String(css) => style.merge(&StyleDeclarations::parse(css)),
            _ => {}
        }

        let mut doc = self.document.borrow_mut();
        // Keep what data-show decided.
        if doc.tree.has_attr(node, "data-show")
            && let Some(display) = doc.tree.style(node).get_property("display")
        {
            let display = display.to_string();
            style.set_property("display", &display);
        }
        doc.tree.set_style(node, &style);
    }

    fn register_ref(&self, node: NodeId, name: &str, ctx: &RenderContext) {
        match &ctx.component {
            Some(instance) => instance.set_ref(name, node),
            None => {
                self.root_refs.borrow_mut().insert(name.to_string(), node);
            }
        }
    }

    fn run_directive(&self, node: NodeId, name: &str, expression: &str, ctx: &RenderContext) {
        let directive = self.directives.borrow().get(name);
        let Some(directive) = directive else {
            if self.directives.borrow_mut().note_unknown(name) {
                warn!(attr = %format!("data-{name}"), "no directive registered for data attribute");
            }
            return;
        };
        let value = self.evaluate_filtered(expression, ctx);
        let args = DirectiveArgs {
            document: &self.document,
            element: node,
            expression,
            value,
            data: ctx.data.clone(),
            component: ctx.component.as_ref().map(|c| c.context_value()),
        };
        if let Err(err) = directive(&args) {
            error!(directive = name, error = %err, "custom directive failed");
        }
    }
}
