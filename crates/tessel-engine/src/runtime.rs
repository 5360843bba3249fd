//! Shared engine core
//!
//! Everything the compiler, the component runtime and the fetch directive
//! share lives here, behind one `Rc`. Closures handed to the DOM, the store
//! and the executor hold a `Weak` back-reference. Borrows of the tables
//! below are always released before user code runs.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Instant;

use indexmap::IndexMap;
use tessel_dom::{Document, NodeId};
use tessel_expr::{parse_literal_arg, split_filters, ExprError, Expression};
use tessel_net::{HttpClient, Transport};
use tessel_store::{get_by_path, make_reactive, Change, ChangeHandler, Value};
use tracing::{debug, error, warn};

use crate::compiler::NodeState;
use crate::component::ComponentInstance;
use crate::config::Config;
use crate::error::EngineError;
use crate::globals::Globals;
use crate::hooks::{run_hooks, HookContext, HookPoint, HookRegistry};
use crate::registry::{ComponentRegistry, DirectiveRegistry, FilterRegistry};
use crate::scheduler::Scheduler;
use crate::scope::{lookup_path, EvalScope, RenderContext};
use crate::vocabulary;

/// Which global container changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GlobalKind {
    State,
    Data,
}

impl GlobalKind {
    pub fn prefix(self) -> &'static str {
        match self {
            GlobalKind::State => "$state",
            GlobalKind::Data => "$global",
        }
    }
}

pub(crate) struct Runtime {
    pub config: Config,
    pub document: RefCell<Document>,
    pub globals: Globals,
    pub filters: RefCell<FilterRegistry>,
    pub directives: RefCell<DirectiveRegistry>,
    pub components: RefCell<ComponentRegistry>,
    pub hooks: RefCell<HookRegistry>,
    pub http: HttpClient,
    pub scheduler: Scheduler,
    pub nodes: RefCell<HashMap<NodeId, NodeState>>,
    pub instances: RefCell<IndexMap<NodeId, Rc<ComponentInstance>>>,
    pub root_refs: RefCell<IndexMap<String, NodeId>>,
    expressions: RefCell<HashMap<String, Option<Expression>>>,
    root_data: RefCell<Value>,
    pass: Cell<u64>,
    depth: Cell<usize>,
    failure: RefCell<Option<EngineError>>,
    next_component_id: Cell<u64>,
    started: Instant,
    torn_down: Cell<bool>,
    me: Weak<Runtime>,
}

impl Runtime {
    pub fn new(config: Config, transport: Rc<dyn Transport>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Runtime>| {
            let on_state = global_handler(me.clone(), GlobalKind::State);
            let on_data = global_handler(me.clone(), GlobalKind::Data);
            Self {
                document: RefCell::new(Document::new(&config.mount_id)),
                config,
                globals: Globals::new(on_state, on_data),
                filters: RefCell::new(FilterRegistry::new()),
                directives: RefCell::new(DirectiveRegistry::new()),
                components: RefCell::new(ComponentRegistry::new()),
                hooks: RefCell::new(HookRegistry::new()),
                http: HttpClient::new(transport),
                scheduler: Scheduler::new(),
                nodes: RefCell::new(HashMap::new()),
                instances: RefCell::new(IndexMap::new()),
                root_refs: RefCell::new(IndexMap::new()),
                expressions: RefCell::new(HashMap::new()),
                root_data: RefCell::new(Value::object()),
                pass: Cell::new(0),
                depth: Cell::new(0),
                failure: RefCell::new(None),
                next_component_id: Cell::new(0),
                started: Instant::now(),
                torn_down: Cell::new(false),
                me: me.clone(),
            }
        })
    }

    pub fn weak(&self) -> Weak<Runtime> {
        self.me.clone()
    }

    /// Milliseconds since the engine started
    pub fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn next_component_id(&self) -> u64 {
        self.next_component_id.set(self.next_component_id.get() + 1);
        self.next_component_id.get()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    pub fn mount(&self) -> NodeId {
        self.document.borrow().mount()
    }

    // ------------------------------------------------------------------
    // Root data
    // ------------------------------------------------------------------

    pub fn root_data(&self) -> Value {
        self.root_data.borrow().clone()
    }

    /// Make `data` the reactive root. The previous root stops scheduling renders.
    pub fn set_root_data(&self, data: Value) {
        let me = self.weak();
        let handler: ChangeHandler = Rc::new(move |change: &Change| {
            if let Some(rt) = me.upgrade() {
                debug!(path = %change.path, "root data changed");
                rt.schedule_root_render();
            }
        });
        let data = make_reactive(data, "root", handler);
        let old = self.root_data.replace(data.clone());
        if let Some(handle) = old.as_handle()
            && data.as_handle().is_none_or(|h| !h.ptr_eq(handle))
        {
            handle.unobserve();
        }
    }

    /// Replace the mount element's content with `template`
    pub fn install_template(&self, template: &str) -> Result<(), EngineError> {
        let mount = self.mount();
        self.clear_children(mount);
        let html = vocabulary::normalize(template);
        let mut doc = self.document.borrow_mut();
        let fragment = tessel_html::parse_fragment(&html, &mut doc.tree)?;
        doc.tree.append_child(mount, fragment)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub fn schedule_root_render(&self) {
        if self.is_torn_down() {
            return;
        }
        let me = self.weak();
        self.scheduler.schedule_render(move || {
            // Skipped when a synchronous render ran in the meantime.
            if let Some(rt) = me.upgrade()
                && rt.scheduler.is_render_scheduled()
                && let Err(err) = rt.render_root()
            {
                error!(error = %err, "scheduled render failed");
            }
        });
    }

    /// Process the mount element against the root data
    pub fn render_root(&self) -> Result<(), EngineError> {
        if self.is_torn_down() {
            return Err(EngineError::TornDown);
        }
        self.scheduler.begin_render();
        let data = self.root_data();
        self.fire_hooks(HookPoint::BeforeRender, None, &data, &[]);

        let pass = self.begin_pass();
        debug!(pass, "root render");
        let ctx = RenderContext::root(data.clone());
        self.process_children(self.mount(), &ctx);

        if self.scheduler.take_component_refresh() {
            let live: Vec<Rc<ComponentInstance>> = self.instances.borrow().values().cloned().collect();
            for instance in live.iter().filter(|i| i.is_mounted() && i.rendered_pass() != pass) {
                instance.update();
            }
        }

        self.fire_hooks(HookPoint::AfterRender, None, &data, &[]);
        match self.failure.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn begin_pass(&self) -> u64 {
        self.pass.set(self.pass.get() + 1);
        self.pass.get()
    }

    pub fn pass(&self) -> u64 {
        self.pass.get()
    }

    /// Enter one level of tree recursion; false once the guard trips
    pub fn enter(&self, node: NodeId) -> bool {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            error!(node = %node, max_depth = self.config.max_depth, "template nesting too deep; subtree skipped");
            return false;
        }
        self.depth.set(depth);
        true
    }

    pub fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Compile once per source text. Failures are logged once and cached.
    pub fn compile(&self, source: &str) -> Option<Expression> {
        if let Some(cached) = self.expressions.borrow().get(source) {
            return cached.clone();
        }
        let compiled = match Expression::compile(source) {
            Ok(expr) => Some(expr),
            Err(ExprError::Blocked(word)) => {
                warn!(expression = source, blocked = %word, "blocked expression ignored");
                None
            }
            Err(err) => {
                warn!(expression = source, error = %err, "expression failed to compile");
                None
            }
        };
        self.expressions.borrow_mut().insert(source.to_string(), compiled.clone());
        compiled
    }

    pub fn evaluate(&self, source: &str, ctx: &RenderContext) -> Value {
        self.evaluate_with(source, ctx, &[])
    }

    /// Evaluate with extra names bound (`$event`)
    pub fn evaluate_with(&self, source: &str, ctx: &RenderContext, extra: &[(&str, Value)]) -> Value {
        let Some(expr) = self.compile(source) else {
            return Value::Undefined;
        };
        match expr.evaluate(&EvalScope::with_extra(self, ctx, extra)) {
            Ok(value) => value,
            Err(err) => {
                self.expression_failed(source, err);
                Value::Undefined
            }
        }
    }

    /// Evaluate a handler expression to `(receiver, value)`
    pub fn evaluate_receiver(&self, source: &str, ctx: &RenderContext, extra: &[(&str, Value)]) -> (Value, Value) {
        let Some(expr) = self.compile(source) else {
            return (Value::Undefined, Value::Undefined);
        };
        match expr.evaluate_with_receiver(&EvalScope::with_extra(self, ctx, extra)) {
            Ok(pair) => pair,
            Err(err) => {
                self.expression_failed(source, err);
                (Value::Undefined, Value::Undefined)
            }
        }
    }

    /// Write through an assignable expression (`user.name`, `items[0]`)
    pub fn assign(&self, source: &str, ctx: &RenderContext, value: Value) -> bool {
        let Some(expr) = self.compile(source) else {
            return false;
        };
        match expr.assign(&EvalScope::new(self, ctx), value) {
            Ok(()) => true,
            Err(err) => {
                self.expression_failed(source, err);
                false
            }
        }
    }

    /// Runtime error policy: `Undefined` and a debug line, or a recorded
    /// failure in strict mode
    pub fn expression_failed(&self, source: &str, err: ExprError) {
        if self.config.strict_expressions {
            error!(expression = source, error = %err, "expression failed");
            let mut failure = self.failure.borrow_mut();
            if failure.is_none() {
                *failure = Some(EngineError::Expression { expression: source.to_string(), source: err });
            }
        } else {
            debug!(expression = source, error = %err, "expression evaluated to undefined");
        }
    }

    /// A strict-mode failure is pending for the current render
    pub fn failed(&self) -> bool {
        self.failure.borrow().is_some()
    }

    pub fn take_failure(&self) -> Option<EngineError> {
        self.failure.borrow_mut().take()
    }

    /// Evaluate `expr | filter:arg | ...`
    pub fn evaluate_filtered(&self, source: &str, ctx: &RenderContext) -> Value {
        let chain = split_filters(source);
        let mut value = self.evaluate(&chain.expression, ctx);
        for call in &chain.filters {
            let Some(filter) = self.filters.borrow().get(&call.name) else {
                warn!(filter = %call.name, "unknown filter; value passed through");
                continue;
            };
            let args: Vec<Value> = call.args.iter().map(|arg| self.filter_arg(arg, ctx)).collect();
            value = match filter(&value, &args) {
                Ok(v) => v,
                Err(err) => {
                    error!(filter = %call.name, error = %err, "filter failed");
                    value
                }
            };
        }
        value
    }

    fn filter_arg(&self, arg: &str, ctx: &RenderContext) -> Value {
        if let Some(literal) = parse_literal_arg(arg) {
            return literal;
        }
        match arg.strip_prefix("$state.") {
            Some(path) => get_by_path(self.globals.state(), path),
            None => lookup_path(self, ctx, arg),
        }
    }

    /// Text form of an interpolated value
    pub fn stringify(&self, value: &Value) -> String {
        match value {
            v if v.is_nullish() => self.config.empty_placeholder.clone(),
            Value::Array(_) | Value::Object(_) => value.to_json_string(),
            other => other.to_display_string(),
        }
    }

    // ------------------------------------------------------------------
    // Node bookkeeping
    // ------------------------------------------------------------------

    pub fn with_state<R>(&self, node: NodeId, f: impl FnOnce(&mut NodeState) -> R) -> R {
        f(self.nodes.borrow_mut().entry(node).or_default())
    }

    pub fn read_state<R>(&self, node: NodeId, f: impl FnOnce(&NodeState) -> R) -> Option<R> {
        self.nodes.borrow().get(&node).map(f)
    }

    pub fn doc(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn instance_at(&self, host: NodeId) -> Option<Rc<ComponentInstance>> {
        self.instances.borrow().get(&host).cloned()
    }

    /// Tear down everything under `root` (inclusive): component instances,
    /// listeners and bookkeeping. The nodes stay where they are.
    pub fn dispose(&self, root: NodeId) {
        let subtree = self.document.borrow().tree.subtree(root);
        let hosted: Vec<Rc<ComponentInstance>> = {
            let instances = self.instances.borrow();
            subtree.iter().filter_map(|id| instances.get(id).cloned()).collect()
        };
        for instance in hosted {
            instance.destroy();
        }

        self.document.borrow_mut().tree.remove_listeners_in(root);
        {
            let mut nodes = self.nodes.borrow_mut();
            for id in &subtree {
                if let Some(state) = nodes.remove(id)
                    && let Some(placeholder) = state.live_of
                {
                    nodes.remove(&placeholder);
                }
            }
        }
        self.root_refs.borrow_mut().retain(|_, node| !subtree.contains(node));
    }

    /// Dispose and detach every child of `parent`
    pub fn clear_children(&self, parent: NodeId) {
        let children = self.document.borrow().tree.child_ids(parent);
        for child in children {
            self.dispose(child);
        }
        self.document.borrow_mut().tree.remove_children(parent);
    }

    // ------------------------------------------------------------------
    // Hooks and globals
    // ------------------------------------------------------------------

    pub fn fire_hooks(&self, point: HookPoint, component: Option<&str>, target: &Value, args: &[Value]) {
        let callbacks = self.hooks.borrow().callbacks(point);
        if callbacks.is_empty() {
            return;
        }
        let context = HookContext { point, component: component.map(str::to_string), target: target.clone() };
        run_hooks(&callbacks, &context, args);
    }

    fn on_global_change(&self, kind: GlobalKind, change: &Change) {
        debug!(store = kind.prefix(), path = %change.path, "global changed");
        if kind == GlobalKind::State {
            self.globals.dispatch(&change.path);
        }
        let live: Vec<Rc<ComponentInstance>> = self.instances.borrow().values().cloned().collect();
        for instance in live {
            instance.on_global_change(kind, &change.path);
        }
        self.scheduler.request_component_refresh();
        self.schedule_root_render();
    }

    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let mount = self.mount();
        self.clear_children(mount);
        self.scheduler.clear();
        self.expressions.borrow_mut().clear();
        if let Some(handle) = self.root_data().as_handle() {
            handle.unobserve();
        }
        debug!("engine torn down");
    }
}

fn global_handler(me: Weak<Runtime>, kind: GlobalKind) -> ChangeHandler {
    Rc::new(move |change: &Change| {
        if let Some(rt) = me.upgrade() {
            rt.on_global_change(kind, change);
        }
    })
}
