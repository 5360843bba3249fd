//! Lifecycle hooks
//!
//! Ordered callback lists per hook point. Callback failures are logged and
//! never reach the code that fired the hook.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tessel_store::{CallError, Value};
use tracing::error;

/// Named hook points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
    BeforeRender,
    AfterRender,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeCreate => "beforeCreate",
            HookPoint::Created => "created",
            HookPoint::BeforeMount => "beforeMount",
            HookPoint::Mounted => "mounted",
            HookPoint::BeforeUpdate => "beforeUpdate",
            HookPoint::Updated => "updated",
            HookPoint::BeforeDestroy => "beforeDestroy",
            HookPoint::Destroyed => "destroyed",
            HookPoint::BeforeRender => "beforeRender",
            HookPoint::AfterRender => "afterRender",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook callback is told about the firing site
#[derive(Debug, Clone)]
pub struct HookContext {
    pub point: HookPoint,
    /// Component name, `None` for root render hooks
    pub component: Option<String>,
    /// Component template context (`Value::Host`), or the root data
    pub target: Value,
}

/// Hook callback
pub type HookFn = Rc<dyn Fn(&HookContext, &[Value]) -> Result<(), CallError>>;

/// Hook registry
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<HookPoint, Vec<HookFn>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, point: HookPoint, hook: HookFn) {
        self.hooks.entry(point).or_default().push(hook);
    }

    /// Callbacks for `point`, cloned so the registry is not borrowed while they run
    pub fn callbacks(&self, point: HookPoint) -> Vec<HookFn> {
        self.hooks.get(&point).cloned().unwrap_or_default()
    }

    pub fn count(&self, point: HookPoint) -> usize {
        self.hooks.get(&point).map_or(0, Vec::len)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self.hooks.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

/// Run callbacks in order, logging failures
pub(crate) fn run_hooks(callbacks: &[HookFn], context: &HookContext, args: &[Value]) {
    for callback in callbacks {
        if let Err(err) = callback(context, args) {
            error!(hook = %context.point, component = ?context.component, error = %err, "hook failed");
        }
    }
}
