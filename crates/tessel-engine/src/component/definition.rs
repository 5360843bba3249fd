//! Component definitions
//!
//! ```
//! use tessel_engine::{ComponentDefinition, PropDef, PropType};
//! use tessel_store::Value;
//!
//! let counter = ComponentDefinition::new("click-counter")
//!     .template("<button data-on:click=\"increment\">{{ label }}: {{ count }}</button>")
//!     .prop("label", PropDef::new(PropType::String).default_value("Clicks"))
//!     .data(|_| Value::object_from([("count".to_string(), 0.into())]))
//!     .method("increment", |this, _| {
//!         let next = this.get("count").to_number() + 1.0;
//!         this.set("count", next.into());
//!         Ok(Value::Undefined)
//!     });
//! assert_eq!(counter.name(), "click-counter");
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tessel_store::{deep_clone, CallError, Value};
use tracing::warn;

use crate::hooks::HookPoint;

/// Template render function, called with the template context
pub type RenderFn = Rc<dyn Fn(&Value) -> String>;

/// Method, computed getter or lifecycle callback; the first argument is the
/// template context
pub type MethodFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, CallError>>;

/// Data factory, called with the template context
pub type DataFn = Rc<dyn Fn(&Value) -> Value>;

/// Watch callback: `(context, new, old)`
pub type WatchFn = Rc<dyn Fn(&Value, &Value, &Value) -> Result<(), CallError>>;

/// Component template
#[derive(Clone)]
pub enum Template {
    Static(String),
    Render(RenderFn),
}

impl Template {
    pub(crate) fn source(&self, context: &Value) -> String {
        match self {
            Template::Static(html) => html.clone(),
            Template::Render(render) => render(context),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Static(html) => f.debug_tuple("Static").field(&html.len()).finish(),
            Template::Render(_) => f.write_str("Render"),
        }
    }
}

/// Declared prop type; static attribute strings are coerced to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropType {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Function,
}

/// Default of a prop that the host does not provide
#[derive(Clone)]
pub enum PropDefault {
    /// Deep-cloned for every instance
    Value(Value),
    Factory(Rc<dyn Fn() -> Value>),
}

impl PropDefault {
    fn produce(&self) -> Value {
        match self {
            PropDefault::Value(value) => deep_clone(value),
            PropDefault::Factory(factory) => factory(),
        }
    }
}

#[derive(Clone, Default)]
pub struct PropDef {
    pub kind: PropType,
    pub default: Option<PropDefault>,
}

impl PropDef {
    pub fn new(kind: PropType) -> Self {
        Self { kind, default: None }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(PropDefault::Value(value.into()));
        self
    }

    pub fn default_with(mut self, factory: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(PropDefault::Factory(Rc::new(factory)));
        self
    }

    /// Value of a prop the host does not provide. Booleans default to false.
    pub(crate) fn fallback(&self) -> Value {
        match (&self.default, self.kind) {
            (Some(default), _) => default.produce(),
            (None, PropType::Boolean) => Value::Bool(false),
            (None, _) => Value::Undefined,
        }
    }

    /// Coerce a static attribute string
    pub(crate) fn coerce(&self, name: &str, raw: &str) -> Value {
        match self.kind {
            PropType::Any | PropType::String => Value::from(raw),
            PropType::Number => match raw.trim().parse::<f64>() {
                Ok(n) => Value::Number(n),
                Err(_) => {
                    warn!(prop = name, value = raw, "prop expects a number");
                    Value::Number(f64::NAN)
                }
            },
            // Presence means true: `<x-toggle open>`
            PropType::Boolean => Value::Bool(!matches!(raw.trim(), "false" | "0")),
            PropType::Array | PropType::Object => match Value::parse_json(raw) {
                Ok(value) if value.is_array() == (self.kind == PropType::Array) && value.is_container() => value,
                _ => {
                    warn!(prop = name, value = raw, expected = ?self.kind, "prop attribute is not valid JSON of the declared type");
                    Value::Undefined
                }
            },
            PropType::Function => {
                warn!(prop = name, "function props must be bound with data-bind");
                Value::Undefined
            }
        }
    }
}

impl fmt::Debug for PropDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropDef").field("kind", &self.kind).field("has_default", &self.default.is_some()).finish()
    }
}

/// Computed property with an optional explicit dependency list
#[derive(Clone)]
pub struct ComputedDef {
    pub getter: MethodFn,
    /// Paths this value depends on (`items`, `$state.user`). `None`
    /// recomputes on every change of the instance.
    pub deps: Option<Vec<String>>,
}

/// `model: {prop, event}`: what `data-model` on the host binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    pub prop: String,
    pub event: String,
}

impl Default for ModelDef {
    fn default() -> Self {
        Self { prop: "value".to_string(), event: "input".to_string() }
    }
}

/// A component type, registered under its tag name
#[derive(Clone)]
pub struct ComponentDefinition {
    name: String,
    pub(crate) template: Template,
    pub(crate) props: IndexMap<String, PropDef>,
    pub(crate) data: Option<DataFn>,
    pub(crate) computed: IndexMap<String, ComputedDef>,
    pub(crate) methods: IndexMap<String, MethodFn>,
    pub(crate) watch: Vec<(String, WatchFn)>,
    pub(crate) model: Option<ModelDef>,
    pub(crate) lifecycle: Vec<(HookPoint, MethodFn)>,
}

impl ComponentDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            template: Template::Static(String::new()),
            props: IndexMap::new(),
            data: None,
            computed: IndexMap::new(),
            methods: IndexMap::new(),
            watch: Vec::new(),
            model: None,
            lifecycle: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(mut self, html: &str) -> Self {
        self.template = Template::Static(html.to_string());
        self
    }

    /// Template computed from the context on every render
    pub fn render(mut self, render: impl Fn(&Value) -> String + 'static) -> Self {
        self.template = Template::Render(Rc::new(render));
        self
    }

    pub fn prop(mut self, name: &str, def: PropDef) -> Self {
        self.props.insert(name.to_string(), def);
        self
    }

    pub fn data(mut self, factory: impl Fn(&Value) -> Value + 'static) -> Self {
        self.data = Some(Rc::new(factory));
        self
    }

    /// Computed property recomputed on every change of the instance
    pub fn computed(mut self, name: &str, getter: impl Fn(&Value) -> Value + 'static) -> Self {
        self.computed.insert(name.to_string(), ComputedDef { getter: Rc::new(move |ctx, _| Ok(getter(ctx))), deps: None });
        self
    }

    /// Computed property recomputed when one of `deps` changes
    pub fn computed_with_deps(mut self, name: &str, deps: &[&str], getter: impl Fn(&Value) -> Value + 'static) -> Self {
        self.computed.insert(
            name.to_string(),
            ComputedDef {
                getter: Rc::new(move |ctx, _| Ok(getter(ctx))),
                deps: Some(deps.iter().map(|d| d.to_string()).collect()),
            },
        );
        self
    }

    pub fn method(
        mut self,
        name: &str,
        method: impl Fn(&Value, &[Value]) -> Result<Value, CallError> + 'static,
    ) -> Self {
        self.methods.insert(name.to_string(), Rc::new(method));
        self
    }

    /// Watch a component path, or `$state.` / `$global.` paths
    pub fn watch(
        mut self,
        path: &str,
        callback: impl Fn(&Value, &Value, &Value) -> Result<(), CallError> + 'static,
    ) -> Self {
        self.watch.push((path.to_string(), Rc::new(callback)));
        self
    }

    pub fn model(mut self, prop: &str, event: &str) -> Self {
        self.model = Some(ModelDef { prop: prop.to_string(), event: event.to_string() });
        self
    }

    /// Lifecycle callback (`Created`, `Mounted`, ...), called with the context
    pub fn on(mut self, point: HookPoint, callback: impl Fn(&Value) -> Result<(), CallError> + 'static) -> Self {
        self.lifecycle.push((point, Rc::new(move |ctx, _| callback(ctx).map(|_| Value::Undefined))));
        self
    }

    pub(crate) fn callbacks(&self, point: HookPoint) -> impl Iterator<Item = &MethodFn> {
        self.lifecycle.iter().filter(move |(p, _)| *p == point).map(|(_, f)| f)
    }

    /// Declared prop matching an attribute name: case and dashes ignored
    pub(crate) fn prop_for_attribute(&self, attr: &str) -> Option<&str> {
        let wanted = normalize_prop_name(attr);
        self.props.keys().find(|name| normalize_prop_name(name) == wanted).map(String::as_str)
    }
}

fn normalize_prop_name(name: &str) -> String {
    name.chars().filter(|c| *c != '-' && *c != '_').flat_map(char::to_lowercase).collect()
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("props", &self.props)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("model", &self.model)
            .finish()
    }
}
