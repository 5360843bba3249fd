//! Slot projection
//!
//! Light-DOM children of a host are captured once, before the first render,
//! into named buckets: `slot="name"` elements, the children of
//! `<template data-slot="name">`, and everything else under `default`.
//! Every render replaces each `<slot>` of the template with a region
//! delimited by two comments holding fresh clones of the bucket, or with the
//! slot's own fallback children when the bucket is empty.
//!
//! Region content belongs to the parent: it is processed in the context the
//! host was rendered in, and the component's own pass skips it.

use indexmap::IndexMap;
use tessel_dom::{NodeData, NodeId};
use tracing::{trace, warn};

use crate::runtime::Runtime;

pub(crate) const DEFAULT_SLOT: &str = "default";

pub(crate) type SlotBuckets = IndexMap<String, Vec<NodeId>>;

/// Detach the host's children into slot buckets
pub(crate) fn capture(rt: &Runtime, host: NodeId) -> SlotBuckets {
    let mut doc = rt.document.borrow_mut();
    let tree = &mut doc.tree;
    let mut buckets = SlotBuckets::new();
    for child in tree.child_ids(host) {
        if tree.detach(child).is_err() {
            continue;
        }
        let Some(node) = tree.get(child) else {
            continue;
        };
        let (name, nodes) = match &node.data {
            NodeData::Text(text) if text.content.trim().is_empty() => continue,
            NodeData::Text(_) => (DEFAULT_SLOT.to_string(), vec![child]),
            NodeData::Element(element) if element.tag == "template" && element.has_attr("data-slot") => {
                let name = element.get_attr("data-slot").filter(|n| !n.is_empty()).unwrap_or(DEFAULT_SLOT);
                (name.to_string(), tree.child_ids(child))
            }
            NodeData::Element(element) => {
                let name = element.get_attr("slot").filter(|n| !n.is_empty()).unwrap_or(DEFAULT_SLOT);
                (name.to_string(), vec![child])
            }
            _ => continue,
        };
        buckets.entry(name).or_default().extend(nodes);
    }
    trace!(host = %host, slots = buckets.len(), "slot content captured");
    buckets
}

/// Replace the `<slot>` elements under `fragment`; returns the regions
/// created as `(start, end)` comment pairs
pub(crate) fn place(rt: &Runtime, fragment: NodeId, buckets: &SlotBuckets) -> Vec<(NodeId, NodeId)> {
    let mut regions = Vec::new();
    {
        let mut doc = rt.document.borrow_mut();
        let tree = &mut doc.tree;
        let slot_elements = tree.find_all(fragment, |_, n| n.as_element().is_some_and(|e| e.tag == "slot"));
        for slot in slot_elements {
            let Some(parent) = tree.parent(slot) else {
                continue;
            };
            let name = tree.attr(slot, "name").filter(|n| !n.is_empty()).unwrap_or(DEFAULT_SLOT).to_string();
            let content = buckets.get(&name).filter(|nodes| !nodes.is_empty());

            let placed = match content {
                Some(nodes) => {
                    let start = tree.create_comment(&format!(" slot: {name} "));
                    let end = tree.create_comment(" /slot ");
                    let mut placed = tree.insert_before(parent, start, Some(slot)).is_ok()
                        && tree.insert_before(parent, end, Some(slot)).is_ok();
                    for node in nodes {
                        placed &= tree
                            .clone_node(*node, true)
                            .and_then(|copy| tree.insert_before(parent, copy, Some(end)))
                            .is_ok();
                    }
                    regions.push((start, end));
                    placed
                }
                // Fallback content takes the slot's place.
                None => tree
                    .child_ids(slot)
                    .into_iter()
                    .all(|child| tree.insert_before(parent, child, Some(slot)).is_ok()),
            };
            if !placed {
                warn!(slot = %name, "slot content could not be placed");
            }
            let _ = tree.detach(slot);
        }
    }
    for (start, end) in &regions {
        rt.with_state(*start, |s| s.slot_end = Some(*end));
    }
    regions
}

/// Nodes strictly between the region comments
pub(crate) fn region_nodes(rt: &Runtime, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let doc = rt.doc();
    let mut nodes = Vec::new();
    let mut current = doc.tree.next_sibling(start);
    while let Some(node) = current {
        if node == end {
            break;
        }
        nodes.push(node);
        current = doc.tree.next_sibling(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::rc::Rc;
    use tessel_net::StaticTransport;

    fn runtime() -> Rc<Runtime> {
        Runtime::new(Config::default(), Rc::new(StaticTransport::new()))
    }

    #[test]
    fn test_capture_and_place() {
        let rt = runtime();
        let host = {
            let mut doc = rt.document.borrow_mut();
            let host = doc.tree.create_element("x-card");
            let fragment = tessel_html::parse_fragment(
                "<h2 slot=\"title\">Hi</h2><p>body</p><template data-slot=\"footer\"><em>f</em></template>",
                &mut doc.tree,
            )
            .unwrap();
            doc.tree.append_child(host, fragment).unwrap();
            host
        };
        let buckets = capture(&rt, host);
        assert_eq!(buckets.get("title").map(Vec::len), Some(1));
        assert_eq!(buckets.get("default").map(Vec::len), Some(1));
        assert_eq!(buckets.get("footer").map(Vec::len), Some(1));
        assert!(rt.doc().tree.child_ids(host).is_empty());

        let fragment = {
            let mut doc = rt.document.borrow_mut();
            tessel_html::parse_fragment(
                "<header><slot name=\"title\">Untitled</slot></header><slot></slot><slot name=\"aside\"><i>none</i></slot>",
                &mut doc.tree,
            )
            .unwrap()
        };
        let regions = place(&rt, fragment, &buckets);
        assert_eq!(regions.len(), 2);
        let (start, end) = regions[0];
        assert_eq!(rt.read_state(start, |s| s.slot_end).flatten(), Some(end));
        assert_eq!(region_nodes(&rt, start, end).len(), 1);

        let html = tessel_dom::HtmlSerializer::without_comments().serialize_inner(&rt.doc().tree, fragment);
        assert_eq!(html, "<header><h2 slot=\"title\">Hi</h2></header><p>body</p><i>none</i>");
    }
}
