//! Extension registries: filters, custom directives, components

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tessel_dom::{Document, NodeId};
use tessel_store::{CallError, Value};

use crate::component::ComponentDefinition;
use crate::filters::{builtin_filters, FilterFn};

/// Filter registry, pre-populated with the built-in filters
#[derive(Clone)]
pub struct FilterRegistry {
    filters: IndexMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        let filters = builtin_filters().into_iter().map(|(name, f)| (name.to_string(), f)).collect();
        Self { filters }
    }

    /// Register or replace a filter
    pub fn register(&mut self, name: &str, filter: FilterFn) {
        self.filters.insert(name.to_string(), filter);
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.keys().cloned().collect()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.filters.keys()).finish()
    }
}

/// Arguments of a custom directive call
pub struct DirectiveArgs<'a> {
    /// The document; not borrowed while the directive runs
    pub document: &'a RefCell<Document>,
    pub element: NodeId,
    /// Attribute value as written
    pub expression: &'a str,
    /// Attribute value evaluated in the element's context
    pub value: Value,
    /// Base data of the element's context
    pub data: Value,
    /// Component template context, if inside a component
    pub component: Option<Value>,
}

/// Custom directive `data-<name>`, run by the attribute sweep on every pass
pub type DirectiveFn = Rc<dyn Fn(&DirectiveArgs<'_>) -> Result<(), CallError>>;

/// Custom directive registry
#[derive(Default, Clone)]
pub struct DirectiveRegistry {
    directives: IndexMap<String, DirectiveFn>,
    unknown: HashSet<String>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `name` (the attribute is `data-{name}`)
    pub fn register(&mut self, name: &str, directive: DirectiveFn) {
        let name = name.strip_prefix("data-").unwrap_or(name);
        self.directives.insert(name.to_ascii_lowercase(), directive);
    }

    pub fn get(&self, name: &str) -> Option<DirectiveFn> {
        self.directives.get(name).cloned()
    }

    /// Record a lookup miss for `name`; true only the first time
    pub fn note_unknown(&mut self, name: &str) -> bool {
        self.unknown.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.directives.keys()).finish()
    }
}

/// Component definitions by lower-case tag name
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    definitions: IndexMap<String, Rc<ComponentDefinition>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ComponentDefinition) {
        let name = definition.name().to_ascii_lowercase();
        self.definitions.insert(name, Rc::new(definition));
    }

    /// Look up by tag name (tags are lower-case after parsing)
    pub fn get(&self, tag: &str) -> Option<Rc<ComponentDefinition>> {
        self.definitions.get(&tag.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.definitions.contains_key(&tag.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_filters_present() {
        let registry = FilterRegistry::new();
        for name in ["uppercase", "lowercase", "capitalize", "truncate", "json", "default", "currency", "join"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_filter_override() {
        let mut registry = FilterRegistry::new();
        registry.register("uppercase", crate::filters::filter(|_, _| Ok(Value::from("X"))));
        let f = registry.get("uppercase").unwrap();
        assert_eq!(f(&"a".into(), &[]).unwrap().as_str(), Some("X"));
    }

    #[test]
    fn test_component_names_case_insensitive() {
        let mut registry = ComponentRegistry::new();
        registry.register(ComponentDefinition::new("User-Card"));
        assert!(registry.contains("user-card"));
        assert!(registry.get("USER-CARD").is_some());
    }

    #[test]
    fn test_directive_prefix_stripped() {
        let mut registry = DirectiveRegistry::new();
        registry.register("data-focus", Rc::new(|_| Ok(())));
        assert!(registry.get("focus").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_directive_noted_once() {
        let mut registry = DirectiveRegistry::new();
        assert!(registry.note_unknown("tooltip"));
        assert!(!registry.note_unknown("tooltip"));
        assert!(registry.note_unknown("badge"));
    }
}
