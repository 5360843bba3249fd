//! Live component instances
//!
//! An instance owns its props and data containers, computed cache, watchers
//! and captured slot content. The host node is not owned: the runtime keeps
//! a host -> instance registry instead of a back-reference on the node.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tessel_dom::{dispatch_event, Event, NodeId};
use tessel_store::{
    deep_clone, deep_equal, get_by_path, make_reactive, CallError, Change, ChangeHandler, Function, Handle, HostObject,
    Value,
};
use tracing::{debug, error, warn};

use super::definition::ComponentDefinition;
use super::slots;
use crate::globals::paths_overlap;
use crate::hooks::HookPoint;
use crate::runtime::{GlobalKind, Runtime};
use crate::scope::RenderContext;
use crate::vocabulary;

/// Re-renders queued while rendering before giving up
const MAX_RERENDERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Mounted,
    Destroyed,
}

#[derive(Clone)]
struct Watcher {
    id: u64,
    path: String,
    callback: Function,
    last: Value,
}

pub(crate) struct ComponentInstance {
    id: u64,
    host: NodeId,
    definition: Rc<ComponentDefinition>,
    rt: Weak<Runtime>,
    me: Weak<ComponentInstance>,
    context: Value,
    props: Value,
    data: RefCell<Value>,
    /// Props given by the application (`Engine::mount_component`)
    explicit: Option<Value>,
    parent: RefCell<RenderContext>,
    computed: RefCell<HashMap<String, Value>>,
    stale: RefCell<HashSet<String>>,
    computing: RefCell<HashSet<String>>,
    methods: RefCell<HashMap<String, Value>>,
    watchers: RefCell<Vec<Watcher>>,
    next_watch: Cell<u64>,
    refs: RefCell<IndexMap<String, NodeId>>,
    slots: RefCell<IndexMap<String, Vec<NodeId>>>,
    regions: RefCell<Vec<(NodeId, NodeId)>>,
    phase: Cell<Phase>,
    rendering: Cell<bool>,
    held: Cell<bool>,
    pending: Cell<bool>,
    rendered_pass: Cell<u64>,
}

fn local_handler(me: Weak<ComponentInstance>) -> ChangeHandler {
    Rc::new(move |change: &Change| {
        if let Some(instance) = me.upgrade() {
            instance.on_local_change(&change.path);
        }
    })
}

impl ComponentInstance {
    /// Build the instance: props, `BeforeCreate`, data, watchers, `Created`.
    /// Nothing is rendered yet.
    pub(crate) fn create(
        rt: &Runtime,
        host: NodeId,
        definition: Rc<ComponentDefinition>,
        parent: &RenderContext,
        slots: IndexMap<String, Vec<NodeId>>,
        explicit: Option<Value>,
    ) -> Rc<Self> {
        let id = rt.next_component_id();
        let sources = super::props::prop_sources(rt, host, &definition);
        let initial = super::props::evaluate(rt, &definition, &sources, parent, explicit.as_ref());

        let instance = Rc::new_cyclic(|me: &Weak<ComponentInstance>| {
            let props = Value::Object(Handle::new_object(initial));
            let props = make_reactive(props, &format!("{}.props", definition.name()), local_handler(me.clone()));
            if let Some(handle) = props.as_handle() {
                handle.set_readonly(true);
            }
            Self {
                id,
                host,
                rt: rt.weak(),
                me: me.clone(),
                context: Value::Host(Rc::new(ComponentContext { instance: me.clone() })),
                props,
                data: RefCell::new(Value::object()),
                explicit,
                parent: RefCell::new(parent.clone()),
                computed: RefCell::new(HashMap::new()),
                stale: RefCell::new(HashSet::new()),
                computing: RefCell::new(HashSet::new()),
                methods: RefCell::new(HashMap::new()),
                watchers: RefCell::new(Vec::new()),
                next_watch: Cell::new(0),
                refs: RefCell::new(IndexMap::new()),
                slots: RefCell::new(slots),
                regions: RefCell::new(Vec::new()),
                phase: Cell::new(Phase::Created),
                rendering: Cell::new(false),
                held: Cell::new(false),
                pending: Cell::new(false),
                rendered_pass: Cell::new(0),
                definition,
            }
        });

        instance.fire(HookPoint::BeforeCreate);
        let data = match &instance.definition.data {
            Some(factory) => factory(&instance.context),
            None => Value::object(),
        };
        let data = if matches!(data, Value::Object(_)) {
            data
        } else {
            warn!(component = instance.name(), "data factory must return an object");
            Value::object()
        };
        let data = make_reactive(data, instance.name(), local_handler(instance.me.clone()));
        instance.data.replace(data);

        for (path, callback) in instance.definition.watch.clone() {
            let function = Function::new(&path, move |this, args| {
                let new = args.first().cloned().unwrap_or_default();
                let old = args.get(1).cloned().unwrap_or_default();
                callback(this, &new, &old).map(|_| Value::Undefined)
            });
            instance.watch(&path, function);
        }
        instance.fire(HookPoint::Created);
        debug!(component = instance.name(), id, "component created");
        instance
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Rc<ComponentDefinition> {
        &self.definition
    }

    /// Template context (`this` of methods, hooks and handlers)
    pub fn context_value(&self) -> Value {
        self.context.clone()
    }

    pub fn data(&self) -> Value {
        self.data.borrow().clone()
    }

    pub fn props(&self) -> Value {
        self.props.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.phase.get() == Phase::Mounted
    }

    pub fn is_destroyed(&self) -> bool {
        self.phase.get() == Phase::Destroyed
    }

    /// Root pass of the latest render
    pub fn rendered_pass(&self) -> u64 {
        self.rendered_pass.get()
    }

    pub fn refs(&self) -> IndexMap<String, NodeId> {
        self.refs.borrow().clone()
    }

    pub(crate) fn set_ref(&self, name: &str, node: NodeId) {
        self.refs.borrow_mut().insert(name.to_string(), node);
    }

    pub(crate) fn set_parent(&self, parent: RenderContext) {
        self.parent.replace(parent);
    }

    pub(crate) fn explicit_props(&self) -> Option<&Value> {
        self.explicit.as_ref()
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    /// Resolve a name in the template context: reserved `$` members,
    /// methods, computed, data, props, inherited loop variables, global data
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if name.starts_with('$') {
            return self.reserved(name);
        }
        if self.definition.methods.contains_key(name) {
            return self.bound_method(name);
        }
        if self.definition.computed.contains_key(name) {
            return Some(self.computed_value(name));
        }
        let data = self.data();
        if data.has(name) {
            return Some(data.get(name));
        }
        if self.props.has(name) {
            return Some(self.props.get(name));
        }
        if let Some(value) = self.parent.borrow().locals.get(name) {
            return Some(value.clone());
        }
        let rt = self.rt.upgrade()?;
        let globals = rt.globals.data();
        globals.has(name).then(|| globals.get(name))
    }

    fn reserved(&self, name: &str) -> Option<Value> {
        let rt = self.rt.upgrade()?;
        Some(match name {
            "$el" => Value::Node(self.host),
            "$props" => self.props.clone(),
            "$data" => self.data(),
            "$slots" => Value::object_from(
                self.slots.borrow().iter().map(|(name, nodes)| (name.clone(), Value::Bool(!nodes.is_empty()))),
            ),
            "$refs" => Value::object_from(self.refs.borrow().iter().map(|(name, node)| (name.clone(), Value::Node(*node)))),
            "$emit" | "$watch" | "$unwatch" | "$destroy" | "$update" => self.builtin(name),
            "$state" => rt.globals.state().clone(),
            "$global" => rt.globals.data().clone(),
            "$parent" => self.parent.borrow().component.as_ref().map(|p| p.context_value()).unwrap_or(Value::Null),
            "$id" => Value::Number(self.id as f64),
            _ => return None,
        })
    }

    /// Method bound to this instance, created once
    fn bound_method(&self, name: &str) -> Option<Value> {
        if let Some(bound) = self.methods.borrow().get(name) {
            return Some(bound.clone());
        }
        let method = self.definition.methods.get(name)?.clone();
        let me = self.me.clone();
        let bound = Value::function(name, move |_this, args| {
            let instance = me.upgrade().ok_or_else(|| CallError::msg("component destroyed"))?;
            method(&instance.context, args)
        });
        self.methods.borrow_mut().insert(name.to_string(), bound.clone());
        Some(bound)
    }

    fn builtin(&self, name: &str) -> Value {
        if let Some(bound) = self.methods.borrow().get(name) {
            return bound.clone();
        }
        let me = self.me.clone();
        let member = name.to_string();
        let function = Value::function(name, move |_this, args| {
            let instance = me.upgrade().ok_or_else(|| CallError::msg("component destroyed"))?;
            instance.call_builtin(&member, args)
        });
        self.methods.borrow_mut().insert(name.to_string(), function.clone());
        function
    }

    fn call_builtin(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        match name {
            "$emit" => {
                let event = args.first().and_then(Value::as_str).ok_or_else(|| CallError::Type("$emit needs an event name".into()))?;
                self.emit(event, &args[1..]);
                Ok(Value::Undefined)
            }
            "$watch" => {
                let path = args.first().and_then(Value::as_str).ok_or_else(|| CallError::Type("$watch needs a path".into()))?;
                let callback = args
                    .get(1)
                    .and_then(Value::as_function)
                    .ok_or_else(|| CallError::NotCallable("$watch callback".into()))?;
                Ok(Value::Number(self.watch(path, callback.clone()) as f64))
            }
            "$unwatch" => {
                let id = args.first().map(Value::to_number).unwrap_or(f64::NAN);
                Ok(Value::Bool(id.is_finite() && self.unwatch(id as u64)))
            }
            "$destroy" => {
                self.destroy();
                Ok(Value::Undefined)
            }
            "$update" => {
                self.update();
                Ok(Value::Undefined)
            }
            _ => Err(CallError::NotCallable(name.to_string())),
        }
    }

    /// Route a write from the template context
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if name.starts_with('$') {
            warn!(component = self.name(), name, "reserved members cannot be assigned");
            return false;
        }
        let data = self.data();
        if data.has(name) {
            return data.set(name, value);
        }
        if self.props.has(name) {
            warn!(component = self.name(), prop = name, "props are read-only inside the component; emit an event instead");
            return false;
        }
        if self.definition.computed.contains_key(name) || self.definition.methods.contains_key(name) {
            warn!(component = self.name(), name, "computed properties and methods cannot be assigned");
            return false;
        }
        if self.parent.borrow().locals.contains_key(name) {
            warn!(component = self.name(), name, "cannot assign to an inherited loop variable");
            return false;
        }
        if let Some(rt) = self.rt.upgrade()
            && rt.globals.state().has(name)
        {
            return rt.globals.state().set(name, value);
        }
        data.set(name, value)
    }

    fn context_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data().keys();
        for key in self
            .props
            .keys()
            .into_iter()
            .chain(self.definition.computed.keys().cloned())
            .chain(self.definition.methods.keys().cloned())
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    // ------------------------------------------------------------------
    // Computed properties
    // ------------------------------------------------------------------

    fn computed_value(&self, name: &str) -> Value {
        let fresh = !self.stale.borrow().contains(name);
        if fresh && let Some(value) = self.computed.borrow().get(name) {
            return value.clone();
        }
        let value = self.compute(name);
        self.computed.borrow_mut().insert(name.to_string(), value.clone());
        self.stale.borrow_mut().remove(name);
        value
    }

    fn compute(&self, name: &str) -> Value {
        let Some(getter) = self.definition.computed.get(name).map(|c| c.getter.clone()) else {
            return Value::Undefined;
        };
        if !self.computing.borrow_mut().insert(name.to_string()) {
            warn!(component = self.name(), computed = name, "computed property depends on itself");
            return self.computed.borrow().get(name).cloned().unwrap_or_default();
        }
        let result = getter(&self.context, &[]);
        self.computing.borrow_mut().remove(name);
        result.unwrap_or_else(|err| {
            error!(component = self.name(), computed = name, error = %err, "computed property failed");
            Value::Undefined
        })
    }

    /// Mark computed values depending on `path` stale
    fn invalidate_computed(&self, path: &str) {
        let mut stale = self.stale.borrow_mut();
        for (name, def) in &self.definition.computed {
            let affected = match &def.deps {
                Some(deps) => deps.iter().any(|dep| paths_overlap(dep, path)),
                None => true,
            };
            if affected {
                stale.insert(name.clone());
            }
        }
    }

    /// Recompute stale values that were read before; returns the names
    /// whose value changed
    fn recompute_stale(&self) -> Vec<String> {
        let names: Vec<String> = self.stale.borrow().iter().cloned().collect();
        let mut changed = Vec::new();
        for name in names {
            let old = self.computed.borrow().get(&name).cloned();
            let Some(old) = old else {
                continue;
            };
            let new = self.computed_value(&name);
            if !deep_equal(&old, &new) {
                changed.push(name);
            }
        }
        changed
    }

    fn refresh_computed(&self) {
        self.stale.borrow_mut().extend(self.definition.computed.keys().cloned());
        for name in self.definition.computed.keys() {
            self.computed_value(name);
        }
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Watch a component path or a `$state.` / `$global.` path
    pub fn watch(&self, path: &str, callback: Function) -> u64 {
        let id = self.next_watch.get() + 1;
        self.next_watch.set(id);
        let last = deep_clone(&self.resolve_watch_path(path));
        self.watchers.borrow_mut().push(Watcher { id, path: path.to_string(), callback, last });
        id
    }

    pub fn unwatch(&self, id: u64) -> bool {
        let mut watchers = self.watchers.borrow_mut();
        let before = watchers.len();
        watchers.retain(|w| w.id != id);
        watchers.len() != before
    }

    fn resolve_watch_path(&self, path: &str) -> Value {
        let Some(rt) = self.rt.upgrade() else {
            return Value::Undefined;
        };
        if let Some(rest) = path.strip_prefix("$state.") {
            return get_by_path(rt.globals.state(), rest);
        }
        if let Some(rest) = path.strip_prefix("$global.") {
            return get_by_path(rt.globals.data(), rest);
        }
        let (first, rest) = path.split_once('.').unwrap_or((path, ""));
        let root = self.lookup(first).unwrap_or_default();
        if rest.is_empty() { root } else { get_by_path(&root, rest) }
    }

    /// Run the watchers overlapping `changed` whose value really changed
    fn dispatch_watchers(&self, changed: &str) {
        let candidates: Vec<Watcher> =
            self.watchers.borrow().iter().filter(|w| paths_overlap(&w.path, changed)).cloned().collect();
        for watcher in candidates {
            let new = self.resolve_watch_path(&watcher.path);
            if deep_equal(&new, &watcher.last) {
                continue;
            }
            {
                let mut watchers = self.watchers.borrow_mut();
                match watchers.iter_mut().find(|w| w.id == watcher.id) {
                    Some(entry) => entry.last = deep_clone(&new),
                    // Removed by an earlier callback.
                    None => continue,
                }
            }
            if let Err(err) = watcher.callback.call(&self.context, &[new, watcher.last]) {
                error!(component = self.name(), path = %watcher.path, error = %err, "watcher failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Change propagation
    // ------------------------------------------------------------------

    fn on_local_change(&self, path: &str) {
        if self.is_destroyed() {
            return;
        }
        self.invalidate_computed(path);
        let changed = self.recompute_stale();
        self.dispatch_watchers(path);
        for name in changed {
            self.dispatch_watchers(&name);
        }
        if self.is_mounted() {
            self.update();
        }
    }

    /// Global state or data changed; the re-render comes from the root pass
    pub(crate) fn on_global_change(&self, kind: GlobalKind, path: &str) {
        if self.is_destroyed() {
            return;
        }
        let qualified = format!("{}.{}", kind.prefix(), path);
        self.invalidate_computed(&qualified);
        let changed = self.recompute_stale();
        self.dispatch_watchers(&qualified);
        for name in changed {
            self.dispatch_watchers(&name);
        }
    }

    /// Run `f` with re-renders deferred, then render once if anything asked
    pub(crate) fn batch(&self, f: impl FnOnce()) {
        let was_held = self.held.replace(true);
        f();
        self.held.set(was_held);
        if !was_held && self.pending.replace(false) {
            self.update();
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render (first time) or re-render the whole template into the host
    pub fn update(&self) {
        if self.is_destroyed() {
            return;
        }
        if self.rendering.get() || self.held.get() {
            self.pending.set(true);
            return;
        }
        self.rendering.set(true);
        for round in 1..=MAX_RERENDERS {
            self.pending.set(false);
            self.render_once();
            if !self.pending.get() || self.is_destroyed() {
                break;
            }
            if round == MAX_RERENDERS {
                warn!(component = self.name(), "component keeps changing its own data while rendering");
            }
        }
        self.pending.set(false);
        self.rendering.set(false);
    }

    fn render_once(&self) {
        let (Some(rt), Some(me)) = (self.rt.upgrade(), self.me.upgrade()) else {
            return;
        };
        let first = self.phase.get() == Phase::Created;
        self.fire(if first { HookPoint::BeforeMount } else { HookPoint::BeforeUpdate });
        if self.is_destroyed() {
            return;
        }

        self.refresh_computed();
        let source = vocabulary::normalize(&self.definition.template.source(&self.context));
        rt.clear_children(self.host);
        self.refs.borrow_mut().clear();

        let fragment = {
            let mut doc = rt.document.borrow_mut();
            match tessel_html::parse_fragment(&source, &mut doc.tree) {
                Ok(fragment) => fragment,
                Err(err) => {
                    error!(component = self.name(), error = %err, "component template failed to parse");
                    return;
                }
            }
        };
        let regions = slots::place(&rt, fragment, &self.slots.borrow());
        {
            let mut doc = rt.document.borrow_mut();
            if let Err(err) = doc.tree.append_child(self.host, fragment) {
                error!(component = self.name(), error = %err, "cannot attach component content");
                return;
            }
            doc.tree.set_attr(self.host, "data-component", self.name());
            doc.tree.set_attr(self.host, "data-cid", &self.id.to_string());
        }
        self.regions.replace(regions);

        rt.process_children(self.host, &RenderContext::component(&me));
        let parent = self.parent.borrow().clone();
        self.process_slots(&rt, &parent);

        self.rendered_pass.set(rt.pass());
        self.phase.set(Phase::Mounted);
        debug!(component = self.name(), id = self.id, first, "component rendered");
        self.fire(if first { HookPoint::Mounted } else { HookPoint::Updated });
    }

    /// Process projected slot content in the parent's context
    pub(crate) fn process_slots(&self, rt: &Runtime, parent: &RenderContext) {
        let regions = self.regions.borrow().clone();
        for (start, end) in regions {
            for node in slots::region_nodes(rt, start, end) {
                rt.process_node(node, parent);
            }
        }
    }

    /// Dispatch a bubbling custom event from the host. Several payload
    /// values travel as an array.
    pub fn emit(&self, event: &str, payload: &[Value]) {
        let Some(rt) = self.rt.upgrade() else {
            return;
        };
        let detail = match payload {
            [] => Value::Undefined,
            [single] => single.clone(),
            many => Value::array(many.to_vec()),
        };
        debug!(component = self.name(), event, "emit");
        let mut event = Event::custom(event, Rc::new(detail));
        dispatch_event(&rt.document, self.host, &mut event);
    }

    fn fire(&self, point: HookPoint) {
        let callbacks: Vec<_> = self.definition.callbacks(point).cloned().collect();
        for callback in callbacks {
            if let Err(err) = callback(&self.context, &[]) {
                error!(component = self.name(), hook = %point, error = %err, "lifecycle callback failed");
            }
        }
        if let Some(rt) = self.rt.upgrade() {
            rt.fire_hooks(point, Some(self.name()), &self.context, &[]);
        }
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Tear the instance down. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.fire(HookPoint::BeforeDestroy);
        if self.is_destroyed() {
            return;
        }
        self.phase.set(Phase::Destroyed);

        if let Some(rt) = self.rt.upgrade() {
            let host_listeners: Vec<_> =
                rt.with_state(self.host, |s| s.listeners.drain().map(|(_, (_, id))| id).collect());
            {
                let mut doc = rt.document.borrow_mut();
                for id in host_listeners {
                    doc.tree.listeners_mut().remove(id);
                }
            }
            rt.clear_children(self.host);
            {
                let mut doc = rt.document.borrow_mut();
                doc.tree.remove_attr(self.host, "data-component");
                doc.tree.remove_attr(self.host, "data-cid");
            }
            let mut instances = rt.instances.borrow_mut();
            if instances.get(&self.host).is_some_and(|i| i.id == self.id) {
                instances.shift_remove(&self.host);
            }
        }

        self.watchers.borrow_mut().clear();
        self.computed.borrow_mut().clear();
        self.methods.borrow_mut().clear();
        self.refs.borrow_mut().clear();
        self.regions.borrow_mut().clear();
        self.slots.borrow_mut().clear();
        for container in [self.data(), self.props.clone()] {
            if let Some(handle) = container.as_handle() {
                handle.unobserve();
            }
        }
        debug!(component = self.name(), id = self.id, "component destroyed");
        self.fire(HookPoint::Destroyed);
    }
}

/// Template context object handed to expressions and callbacks
pub(crate) struct ComponentContext {
    instance: Weak<ComponentInstance>,
}

impl ComponentContext {
    pub fn instance(&self) -> Option<Rc<ComponentInstance>> {
        self.instance.upgrade()
    }
}

impl HostObject for ComponentContext {
    fn get(&self, key: &str) -> Value {
        self.instance().and_then(|i| i.lookup(key)).unwrap_or_default()
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.instance().is_some_and(|i| i.assign(key, value))
    }

    fn has(&self, key: &str) -> bool {
        self.instance().is_some_and(|i| i.lookup(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.instance().map(|i| i.context_keys()).unwrap_or_default()
    }

    fn type_name(&self) -> &str {
        "Component"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
