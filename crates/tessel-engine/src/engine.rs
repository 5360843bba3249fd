//! Engine - Main entry point

use std::rc::Rc;

use tessel_dom::{dispatch_event, Document, Event, HtmlSerializer, NodeId};
use tessel_net::{RequestInterceptor, ResponseInterceptor, TcpTransport, Transport};
use tessel_store::{get_by_path, set_by_path, CallError, Value};
use tracing::{debug, info, warn};

use crate::component::{ComponentDefinition, ComponentHandle};
use crate::config::Config;
use crate::error::EngineError;
use crate::globals::WatchId;
use crate::hooks::{HookContext, HookPoint};
use crate::registry::DirectiveArgs;
use crate::runtime::Runtime;
use crate::scope::RenderContext;

/// The Tessel template engine
///
/// Owns the document, the root data and everything registered on it.
/// Nothing happens in the background: data changes queue a render that
/// runs on the next [`Engine::run_until_idle`].
pub struct Engine {
    rt: Rc<Runtime>,
}

impl Engine {
    /// Create an engine that fetches over plain HTTP/1.1
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, Rc::new(TcpTransport::new()))
    }

    /// Create an engine with a custom transport for `data-fetch`
    pub fn with_transport(config: Config, transport: Rc<dyn Transport>) -> Self {
        info!("Tessel {} initialized (mount #{})", crate::VERSION, config.mount_id);
        Self { rt: Runtime::new(config, transport) }
    }

    pub fn config(&self) -> &Config {
        &self.rt.config
    }

    // ------------------------------------------------------------------
    // Data and rendering
    // ------------------------------------------------------------------

    /// Make `data` the reactive root and render. With a template the mount
    /// element's content is replaced first; without one the current content
    /// is the template.
    pub fn apply_data(&self, data: Value, template: Option<&str>) -> Result<(), EngineError> {
        if self.rt.is_torn_down() {
            return Err(EngineError::TornDown);
        }
        if let Some(template) = template {
            self.rt.install_template(template)?;
        }
        self.rt.set_root_data(data);
        self.rt.render_root()
    }

    /// The reactive root data; writes through it schedule a render
    pub fn data(&self) -> Value {
        self.rt.root_data()
    }

    /// Render the mount element synchronously
    pub fn render(&self) -> Result<(), EngineError> {
        self.rt.render_root()
    }

    /// Run queued renders and in-flight fetches until nothing is left to do
    pub fn run_until_idle(&self) {
        self.rt.scheduler.run_until_idle();
    }

    /// Number of root renders so far
    pub fn render_count(&self) -> u64 {
        self.rt.scheduler.render_count()
    }

    /// Evaluate an expression against the root data
    pub fn evaluate(&self, expression: &str) -> Value {
        self.rt.evaluate_filtered(expression, &RenderContext::root(self.data()))
    }

    /// Interpolate `{{ }}` markers against the root data into escaped HTML
    pub fn interpolate_html(&self, template: &str) -> String {
        self.rt.interpolate_html(template, &RenderContext::root(self.data()))
    }

    // ------------------------------------------------------------------
    // Global state and global data
    // ------------------------------------------------------------------

    /// Write global state at a dotted path
    pub fn set_state(&self, path: &str, value: impl Into<Value>) -> bool {
        set_by_path(self.rt.globals.state(), path, value.into())
    }

    /// Read global state at a dotted path (`""` for the whole container)
    pub fn state(&self, path: &str) -> Value {
        get_by_path(self.rt.globals.state(), path)
    }

    /// Call `callback(new, old)` when the state at `path` really changes
    pub fn watch_state(&self, path: &str, callback: impl Fn(&Value, &Value) + 'static) -> WatchId {
        self.rt.globals.watch(path, Rc::new(callback))
    }

    pub fn unwatch_state(&self, id: WatchId) -> bool {
        self.rt.globals.unwatch(id)
    }

    pub fn set_global_data(&self, path: &str, value: impl Into<Value>) -> bool {
        set_by_path(self.rt.globals.data(), path, value.into())
    }

    pub fn global_data(&self, path: &str) -> Value {
        get_by_path(self.rt.globals.data(), path)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a component under its (case-insensitive) tag name. Hosts
    /// already in the document are picked up by the next render.
    pub fn register_component(&self, definition: ComponentDefinition) {
        debug!(component = definition.name(), "component registered");
        self.rt.components.borrow_mut().register(definition);
    }

    pub fn register_filter(
        &self,
        name: &str,
        filter: impl Fn(&Value, &[Value]) -> Result<Value, CallError> + 'static,
    ) {
        self.rt.filters.borrow_mut().register(name, Rc::new(filter));
    }

    /// Register `data-<name>`; it runs on every pass of a node carrying it
    pub fn register_directive(
        &self,
        name: &str,
        directive: impl Fn(&DirectiveArgs<'_>) -> Result<(), CallError> + 'static,
    ) {
        self.rt.directives.borrow_mut().register(name, Rc::new(directive));
    }

    pub fn on_hook(
        &self,
        point: HookPoint,
        hook: impl Fn(&HookContext, &[Value]) -> Result<(), CallError> + 'static,
    ) {
        self.rt.hooks.borrow_mut().add(point, Rc::new(hook));
    }

    pub fn add_request_interceptor(&self, interceptor: RequestInterceptor) {
        self.rt.http.add_request_interceptor(interceptor);
    }

    pub fn add_response_interceptor(&self, interceptor: ResponseInterceptor) {
        self.rt.http.add_response_interceptor(interceptor);
    }

    /// Forget the cached success of the fetch state at `path` (root data)
    /// so the next render fetches again
    pub fn invalidate_fetch(&self, path: &str) -> bool {
        self.rt.invalidate_fetch(path)
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// The instance hosted by `host`
    pub fn component(&self, host: NodeId) -> Option<ComponentHandle> {
        self.rt.instance_at(host).map(ComponentHandle::new)
    }

    /// First live instance of the named component, in creation order
    pub fn find_component(&self, name: &str) -> Option<ComponentHandle> {
        let found = self.rt.instances.borrow().values().find(|i| i.name().eq_ignore_ascii_case(name)).cloned();
        found.map(ComponentHandle::new)
    }

    /// Live instances of the named component, in creation order
    pub fn components_named(&self, name: &str) -> Vec<ComponentHandle> {
        let found: Vec<_> =
            self.rt.instances.borrow().values().filter(|i| i.name().eq_ignore_ascii_case(name)).cloned().collect();
        found.into_iter().map(ComponentHandle::new).collect()
    }

    /// Append a host for `name` to the mount element and render it with
    /// `props` taking precedence over anything on the host
    pub fn mount_component(&self, name: &str, props: Value) -> Result<ComponentHandle, EngineError> {
        if self.rt.is_torn_down() {
            return Err(EngineError::TornDown);
        }
        let definition = self.rt.components.borrow().get(name);
        let Some(definition) = definition else {
            warn!(component = name, "mount of unregistered component");
            return Err(EngineError::UnknownComponent(name.to_string()));
        };
        let host = {
            let mut doc = self.rt.document.borrow_mut();
            let host = doc.tree.create_element(definition.name());
            let mount = doc.mount();
            doc.tree.append_child(mount, host)?;
            host
        };
        let ctx = RenderContext::root(self.data());
        self.rt.with_state(host, |s| s.context = Some(ctx.clone()));
        let instance = self.rt.mount_instance(host, definition, &ctx, Default::default(), Some(props));
        match self.rt.take_failure() {
            Some(err) => Err(err),
            None => Ok(ComponentHandle::new(instance)),
        }
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    /// Dispatch `event` at `target`; false if a listener prevented the default
    pub fn dispatch(&self, target: NodeId, event: &mut Event) -> bool {
        dispatch_event(&self.rt.document, target, event)
    }

    /// Click `target`, then let the engine settle
    pub fn click(&self, target: NodeId) -> bool {
        let allowed = self.dispatch(target, &mut Event::bubbling("click"));
        self.run_until_idle();
        allowed
    }

    /// Type `value` into a text control or pick it in a select: the value
    /// changes, then `input` and `change` fire
    pub fn input(&self, target: NodeId, value: &str) {
        if let Some(element) = self.rt.document.borrow_mut().tree.element_mut(target) {
            element.value = Some(value.to_string());
        }
        self.dispatch(target, &mut Event::bubbling("input"));
        self.dispatch(target, &mut Event::bubbling("change"));
        self.run_until_idle();
    }

    /// Check or uncheck a checkbox or radio, then fire `change`. Checking a
    /// radio unchecks the others of its group.
    pub fn set_checked(&self, target: NodeId, checked: bool) {
        {
            let mut doc = self.rt.document.borrow_mut();
            let group = doc
                .tree
                .element(target)
                .filter(|e| checked && e.input_type() == "radio")
                .and_then(|e| e.get_attr("name").map(str::to_string));
            if let Some(group) = group {
                let root = doc.tree.root();
                let peers = doc.tree.find_all(root, |id, n| {
                    id != target
                        && n.as_element().is_some_and(|e| e.input_type() == "radio" && e.get_attr("name") == Some(group.as_str()))
                });
                for peer in peers {
                    if let Some(element) = doc.tree.element_mut(peer) {
                        element.checked = false;
                    }
                }
            }
            if let Some(element) = doc.tree.element_mut(target) {
                element.checked = checked;
            }
        }
        self.dispatch(target, &mut Event::bubbling("change"));
        self.run_until_idle();
    }

    // ------------------------------------------------------------------
    // Output and queries
    // ------------------------------------------------------------------

    pub fn document(&self) -> std::cell::Ref<'_, Document> {
        self.rt.doc()
    }

    pub fn mount(&self) -> NodeId {
        self.rt.mount()
    }

    /// Serialized children of `node`, without anchor and placeholder comments
    pub fn inner_html(&self, node: NodeId) -> String {
        HtmlSerializer::without_comments().serialize_inner(&self.rt.doc().tree, node)
    }

    /// Serialized content of the mount element
    pub fn html(&self) -> String {
        self.inner_html(self.mount())
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.rt.doc().tree.text_content(node)
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.rt.doc().get_element_by_id(id)
    }

    pub fn find_all_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.rt.doc().get_elements_by_tag_name(tag)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_all_by_tag(tag).into_iter().next()
    }

    /// First attached element with attribute `name` (and `value`, if given)
    pub fn find_by_attr(&self, name: &str, value: Option<&str>) -> Option<NodeId> {
        let doc = self.rt.doc();
        doc.tree.find_first(doc.tree.root(), |_, n| {
            n.as_element()
                .and_then(|e| e.get_attr(name))
                .is_some_and(|v| value.is_none_or(|wanted| v == wanted))
        })
    }

    /// Attached elements carrying class `class`
    pub fn find_all_by_class(&self, class: &str) -> Vec<NodeId> {
        let doc = self.rt.doc();
        doc.tree.find_all(doc.tree.root(), |_, n| {
            n.as_element()
                .and_then(|e| e.get_attr("class"))
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
        })
    }

    /// Node registered with `data-ref` outside any component
    pub fn root_ref(&self, name: &str) -> Option<NodeId> {
        self.rt.root_refs.borrow().get(name).copied()
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Destroy every component, drop listeners and stop rendering.
    /// Calling it again does nothing.
    pub fn teardown(&self) {
        self.rt.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.rt.is_torn_down()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
