//! `data-repeat="item in items"`
//!
//! The element is replaced by an anchor comment and kept as the loop
//! template. Every pass removes the clones of the previous pass and renders
//! one clone per entry right after the anchor.

use std::rc::Rc;

use tessel_dom::NodeId;
use tessel_expr::is_valid_identifier;
use tessel_store::Value;
use tracing::{trace, warn};

use crate::runtime::Runtime;
use crate::scope::RenderContext;

pub(crate) struct RepeatBinding {
    pub spec: Option<LoopSpec>,
    /// Detached original, without `data-repeat`
    pub template: NodeId,
    pub clones: Vec<NodeId>,
}

/// Parsed `a[, b[, c]] in collection`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoopSpec {
    pub vars: Vec<String>,
    pub collection: Rc<str>,
}

/// Parse a loop expression. Accepts `in` or `of` and optional parentheses
/// around the variables.
pub(crate) fn parse_loop(src: &str) -> Option<LoopSpec> {
    let src = src.trim();
    let split = [" in ", " of "].iter().filter_map(|sep| src.find(sep)).min()?;
    let (left, right) = (src[..split].trim(), src[split + 4..].trim());
    let left = left.strip_prefix('(').and_then(|l| l.strip_suffix(')')).unwrap_or(left);

    let vars: Vec<String> = left.split(',').map(|v| v.trim().to_string()).collect();
    if vars.is_empty() || vars.len() > 3 || !vars.iter().all(|v| is_valid_identifier(v)) || right.is_empty() {
        return None;
    }
    Some(LoopSpec { vars, collection: Rc::from(right) })
}

impl Runtime {
    pub(super) fn init_repeat(&self, node: NodeId) -> NodeId {
        let (anchor, source) = {
            let mut doc = self.document.borrow_mut();
            let tree = &mut doc.tree;
            let source = tree.attr(node, "data-repeat").unwrap_or_default().to_string();
            tree.remove_attr(node, "data-repeat");
            let anchor = tree.create_comment(&format!(" repeat: {source} "));
            // A detached node keeps rendering nothing; the anchor stays detached too.
            let _ = tree.replace(node, anchor);
            (anchor, source)
        };

        let spec = parse_loop(&source);
        if spec.is_none() {
            warn!(expression = %source, "malformed data-repeat; expected `item in items`");
        }
        self.nodes.borrow_mut().remove(&node);
        self.with_state(anchor, |s| s.repeat = Some(RepeatBinding { spec, template: node, clones: Vec::new() }));
        anchor
    }

    pub(super) fn process_repeat(&self, anchor: NodeId, ctx: &RenderContext) {
        let Some((spec, template, old)) = self.with_state(anchor, |s| {
            s.repeat
                .as_mut()
                .map(|b| (b.spec.clone(), b.template, std::mem::take(&mut b.clones)))
        }) else {
            return;
        };

        for clone in &old {
            self.dispose(*clone);
            let _ = self.document.borrow_mut().tree.detach(*clone);
        }

        let Some(spec) = spec else {
            return;
        };
        let collection = self.evaluate_filtered(&spec.collection, ctx);
        let entries = loop_entries(&collection, &spec.vars, self.config.max_repeat_count);

        let fragment = self.document.borrow_mut().tree.create_fragment();
        for overlay in entries {
            let clone = {
                let mut doc = self.document.borrow_mut();
                let Ok(clone) = doc.tree.clone_node(template, true) else {
                    continue;
                };
                if doc.tree.append_child(fragment, clone).is_err() {
                    continue;
                }
                clone
            };
            let scope = ctx.with_locals(overlay);
            self.process_node(clone, &scope);
        }

        let clones = {
            let mut doc = self.document.borrow_mut();
            let clones = doc.tree.child_ids(fragment);
            if doc.tree.parent(anchor).is_some() {
                let next = doc.tree.next_sibling(anchor);
                if let Some(parent) = doc.tree.parent(anchor) {
                    let _ = doc.tree.insert_before(parent, fragment, next);
                }
            }
            clones
        };
        trace!(collection = %spec.collection, count = clones.len(), "loop rendered");
        self.with_state(anchor, |s| {
            if let Some(binding) = s.repeat.as_mut() {
                binding.clones = clones;
            }
        });
    }
}

/// Scope overlays, one per entry: `(item, index, index)` for arrays,
/// `(value, key, index)` for objects, `(n, index)` for a count of at most
/// `max_count`
fn loop_entries(collection: &Value, vars: &[String], max_count: usize) -> Vec<Vec<(String, Value)>> {
    let pairs: Vec<(Value, Value)> = match collection {
        Value::Array(h) => h.items().into_iter().enumerate().map(|(i, v)| (v, Value::from(i))).collect(),
        Value::Object(_) | Value::Host(_) => collection
            .keys()
            .into_iter()
            .map(|k| (collection.get(&k), Value::from(k)))
            .collect(),
        Value::Number(n) if n.is_finite() && *n >= 1.0 => {
            let count = if *n > max_count as f64 {
                warn!(count = *n, max_count, "data-repeat count too large; clamped");
                max_count
            } else {
                *n as usize
            };
            (1..=count).enumerate().map(|(i, k)| (Value::from(k), Value::from(i))).collect()
        }
        _ => Vec::new(),
    };

    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (item, key))| {
            let values = [item, key, Value::from(index)];
            vars.iter().cloned().zip(values).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loop_forms() {
        let spec = parse_loop("item in items").unwrap();
        assert_eq!(spec.vars, vec!["item"]);
        assert_eq!(&*spec.collection, "items");

        let spec = parse_loop("(value, key, i) of user.fields | json").unwrap();
        assert_eq!(spec.vars, vec!["value", "key", "i"]);
        assert_eq!(&*spec.collection, "user.fields | json");

        assert!(parse_loop("items").is_none());
        assert!(parse_loop("a-b in items").is_none());
        assert!(parse_loop("a, b, c, d in items").is_none());
        assert!(parse_loop("item in ").is_none());
    }

    #[test]
    fn test_entries_for_arrays_and_objects() {
        let vars = vec!["v".to_string(), "k".to_string(), "i".to_string()];
        let arr = Value::array(vec!["a".into(), "b".into()]);
        let entries = loop_entries(&arr, &vars, 100);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1][0].1.as_str(), Some("b"));
        assert_eq!(entries[1][1].1.as_number(), Some(1.0));

        let obj = Value::object_from([("x".to_string(), 10.into()), ("y".to_string(), 20.into())]);
        let entries = loop_entries(&obj, &vars, 100);
        assert_eq!(entries[1][0].1.as_number(), Some(20.0));
        assert_eq!(entries[1][1].1.as_str(), Some("y"));
        assert_eq!(entries[1][2].1.as_number(), Some(1.0));

        assert!(loop_entries(&Value::Null, &vars, 100).is_empty());
        assert_eq!(loop_entries(&Value::Number(3.0), &vars[..1], 100).len(), 3);
        assert_eq!(loop_entries(&Value::Number(2.7), &vars[..1], 100).len(), 2);
        assert_eq!(loop_entries(&Value::Number(1e18), &vars[..1], 100).len(), 100);
        assert!(loop_entries(&Value::Number(f64::INFINITY), &vars[..1], 100).is_empty());
    }
}
