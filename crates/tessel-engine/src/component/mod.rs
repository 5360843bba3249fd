//! Component runtime
//!
//! An element whose tag is a registered component becomes a host. The first
//! pass that reaches it captures its light-DOM children as slot content,
//! creates the instance and renders the template into the host. Later
//! passes refresh props and slot regions; the instance re-renders itself
//! when its own state changes.

mod definition;
mod instance;
mod props;
mod slots;

use std::rc::Rc;

use tessel_dom::NodeId;
use tessel_store::Value;
use tracing::debug;

use crate::runtime::Runtime;
use crate::scope::RenderContext;

pub use definition::{
    ComponentDefinition, ComputedDef, DataFn, MethodFn, ModelDef, PropDef, PropDefault, PropType, RenderFn, Template,
    WatchFn,
};
pub(crate) use instance::ComponentInstance;
pub(crate) use slots::SlotBuckets;

impl Runtime {
    pub(crate) fn process_component(&self, host: NodeId, definition: Rc<ComponentDefinition>, ctx: &RenderContext) {
        let existing = self.instance_at(host).filter(|instance| {
            if Rc::ptr_eq(instance.definition(), &definition) {
                return true;
            }
            debug!(host = %host, from = instance.name(), to = definition.name(), "component type changed");
            instance.destroy();
            false
        });

        let sources = props::prop_sources(self, host, &definition);
        self.bind_host_events(host);
        self.bind_prop_sync(host, &definition, &sources);

        match existing {
            Some(instance) => {
                instance.set_parent(ctx.clone());
                let values = props::evaluate(self, &definition, &sources, ctx, instance.explicit_props());
                instance.refresh_props(values);
                instance.process_slots(self, ctx);
            }
            None => {
                let buckets = slots::capture(self, host);
                self.mount_instance(host, definition, ctx, buckets, None);
            }
        }
    }

    /// `data-on:*` on the host listen for the component's events
    fn bind_host_events(&self, host: NodeId) {
        let attrs = self.doc().tree.attrs(host);
        for (name, value) in attrs.iter().filter(|(name, _)| name.starts_with("data-on:")) {
            self.bind_event(host, name, value);
        }
    }

    /// Create, register and render an instance on `host`
    pub(crate) fn mount_instance(
        &self,
        host: NodeId,
        definition: Rc<ComponentDefinition>,
        ctx: &RenderContext,
        buckets: SlotBuckets,
        explicit: Option<Value>,
    ) -> Rc<ComponentInstance> {
        let instance = ComponentInstance::create(self, host, definition, ctx, buckets, explicit);
        self.instances.borrow_mut().insert(host, instance.clone());
        instance.update();
        instance
    }
}

impl ComponentInstance {
    /// Apply new prop values from the parent in one batch. Container props
    /// may have been mutated in place, so they always re-render the child.
    pub(crate) fn refresh_props(&self, values: indexmap::IndexMap<String, Value>) {
        let Some(handle) = self.props().as_handle().cloned() else {
            return;
        };
        let has_containers = values.values().any(Value::is_container);
        let mut changed = false;
        self.batch(|| {
            for (name, value) in values {
                changed |= handle.force_set(&name, value).unwrap_or(false);
            }
        });
        if !changed && has_containers && self.is_mounted() {
            self.update();
        }
    }
}

/// Application-side handle to a live component instance
#[derive(Clone)]
pub struct ComponentHandle {
    instance: Rc<ComponentInstance>,
}

impl ComponentHandle {
    pub(crate) fn new(instance: Rc<ComponentInstance>) -> Self {
        Self { instance }
    }

    pub fn id(&self) -> u64 {
        self.instance.id()
    }

    pub fn name(&self) -> &str {
        self.instance.name()
    }

    pub fn host(&self) -> NodeId {
        self.instance.host()
    }

    /// The template context: `get`/`set` behave like template expressions
    pub fn context(&self) -> Value {
        self.instance.context_value()
    }

    pub fn data(&self) -> Value {
        self.instance.data()
    }

    pub fn props(&self) -> Value {
        self.instance.props()
    }

    /// Resolve a name the way the template does
    pub fn get(&self, name: &str) -> Value {
        self.instance.lookup(name).unwrap_or_default()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        self.instance.assign(name, value.into())
    }

    /// Call a method with the instance as `this`
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, tessel_store::CallError> {
        match self.instance.lookup(method) {
            Some(Value::Function(f)) => f.call(&self.instance.context_value(), args),
            _ => Err(tessel_store::CallError::NotCallable(method.to_string())),
        }
    }

    pub fn emit(&self, event: &str, payload: &[Value]) {
        self.instance.emit(event, payload);
    }

    pub fn watch(&self, path: &str, callback: impl Fn(&Value, &Value) + 'static) -> u64 {
        let function = tessel_store::Function::new(path, move |_this, args| {
            let new = args.first().cloned().unwrap_or_default();
            let old = args.get(1).cloned().unwrap_or_default();
            callback(&new, &old);
            Ok(Value::Undefined)
        });
        self.instance.watch(path, function)
    }

    pub fn unwatch(&self, id: u64) -> bool {
        self.instance.unwatch(id)
    }

    pub fn refs(&self) -> indexmap::IndexMap<String, NodeId> {
        self.instance.refs()
    }

    pub fn update(&self) {
        self.instance.update();
    }

    pub fn destroy(&self) {
        self.instance.destroy();
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.is_mounted()
    }

    pub fn is_destroyed(&self) -> bool {
        self.instance.is_destroyed()
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle").field("id", &self.id()).field("name", &self.name()).finish()
    }
}
