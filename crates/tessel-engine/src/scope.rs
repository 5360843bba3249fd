//! Render contexts and name resolution
//!
//! A [`RenderContext`] is what a template node is processed against: the
//! base data, the owning component (if any) and the loop scope. Name lookup
//! precedence, highest first:
//!
//! 1. extra names (`$event` in handlers)
//! 2. loop scope
//! 3. component context (reserved `$` members, methods, computed, data,
//!    props, inherited loop variables, global data)
//! 4. own keys of the base data
//! 5. global data keys
//! 6. `$state` and `$global`

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;
use tessel_expr::Scope;
use tessel_store::Value;
use tracing::warn;

use crate::component::ComponentInstance;
use crate::runtime::Runtime;

/// Loop variables, innermost overlay already merged in
pub(crate) type Locals = IndexMap<String, Value>;

/// Data scope, component and loop scope of a node
#[derive(Clone)]
pub(crate) struct RenderContext {
    pub data: Value,
    pub component: Option<Rc<ComponentInstance>>,
    pub locals: Rc<Locals>,
}

impl RenderContext {
    pub fn root(data: Value) -> Self {
        Self { data, component: None, locals: Rc::new(Locals::new()) }
    }

    /// Context for a component's own template
    pub fn component(instance: &Rc<ComponentInstance>) -> Self {
        Self {
            data: instance.context_value(),
            component: Some(instance.clone()),
            locals: Rc::new(Locals::new()),
        }
    }

    /// Same data and component, loop scope extended with `overlay`
    pub fn with_locals(&self, overlay: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut locals = (*self.locals).clone();
        locals.extend(overlay);
        Self { data: self.data.clone(), component: self.component.clone(), locals: Rc::new(locals) }
    }

    /// `this` for handlers and method calls
    pub fn this_value(&self) -> Value {
        match &self.component {
            Some(instance) => instance.context_value(),
            None => self.data.clone(),
        }
    }

    /// Container new state (fetch state) is created in
    pub fn owning_data(&self) -> Value {
        match &self.component {
            Some(instance) => instance.data(),
            None => self.data.clone(),
        }
    }

    /// Identity fingerprint: component, base data and loop-scope values
    pub fn key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.component.as_ref().map(|c| c.id()).hash(&mut hasher);
        identity(&self.data, &mut hasher);
        for (name, value) in self.locals.iter() {
            name.hash(&mut hasher);
            identity(value, &mut hasher);
        }
        hasher.finish()
    }
}

/// Hash containers by identity and primitives by value
fn identity(value: &Value, hasher: &mut DefaultHasher) {
    match value {
        Value::Array(h) | Value::Object(h) => h.addr().hash(hasher),
        Value::Host(h) => (Rc::as_ptr(h) as *const () as usize).hash(hasher),
        Value::Node(id) => id.hash(hasher),
        Value::Number(n) => n.to_bits().hash(hasher),
        other => {
            other.type_of().hash(hasher);
            other.to_display_string().hash(hasher);
        }
    }
}

/// Scope handed to the expression interpreter
pub(crate) struct EvalScope<'a> {
    pub rt: &'a Runtime,
    pub ctx: &'a RenderContext,
    pub extra: &'a [(&'a str, Value)],
}

impl<'a> EvalScope<'a> {
    pub fn new(rt: &'a Runtime, ctx: &'a RenderContext) -> Self {
        Self { rt, ctx, extra: &[] }
    }

    pub fn with_extra(rt: &'a Runtime, ctx: &'a RenderContext, extra: &'a [(&'a str, Value)]) -> Self {
        Self { rt, ctx, extra }
    }
}

impl Scope for EvalScope<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if let Some((_, value)) = self.extra.iter().find(|(n, _)| *n == name) {
            return Some(value.clone());
        }
        if let Some(value) = self.ctx.locals.get(name) {
            return Some(value.clone());
        }
        if let Some(instance) = &self.ctx.component
            && let Some(value) = instance.lookup(name)
        {
            return Some(value);
        }
        if self.ctx.data.has(name) {
            return Some(self.ctx.data.get(name));
        }
        let globals = &self.rt.globals;
        if globals.data().has(name) {
            return Some(globals.data().get(name));
        }
        match name {
            "$state" => Some(globals.state().clone()),
            "$global" => Some(globals.data().clone()),
            _ => None,
        }
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        if self.ctx.locals.contains_key(name) {
            warn!(name, "cannot assign to a loop variable");
            return false;
        }
        match &self.ctx.component {
            Some(instance) => instance.assign(name, value),
            None => self.ctx.data.set(name, value),
        }
    }

    fn this(&self) -> Value {
        self.ctx.this_value()
    }
}

/// Merged lookup used for filter arguments: component, base data, loop
/// scope, global data
pub(crate) fn lookup_path(rt: &Runtime, ctx: &RenderContext, path: &str) -> Value {
    let Some(segments) = tessel_store::split_path(path) else {
        return Value::Undefined;
    };
    let Some((first, rest)) = segments.split_first() else {
        return Value::Undefined;
    };
    let scope = EvalScope::new(rt, ctx);
    let Some(mut current) = scope.resolve(first) else {
        return Value::Undefined;
    };
    for segment in rest {
        current = current.get(segment);
    }
    current
}
