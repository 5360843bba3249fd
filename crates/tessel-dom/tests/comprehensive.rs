//! Comprehensive tests for tessel-dom
//!
//! Tree mutation sequences the template engine relies on: placeholder
//! swaps, anchor-relative inserts, subtree listener cleanup.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessel_dom::{dispatch_event, Document, DomTree, Event, HtmlSerializer, ListenerOptions, NodeId};

fn list_with_items(tree: &mut DomTree, n: usize) -> (NodeId, Vec<NodeId>) {
    let ul = tree.create_element("ul");
    tree.append_child(tree.root(), ul).unwrap();
    let items = (0..n)
        .map(|i| {
            let li = tree.create_element("li");
            tree.set_text_content(li, &format!("item {i}")).unwrap();
            tree.append_child(ul, li).unwrap();
            li
        })
        .collect();
    (ul, items)
}

#[test]
fn test_placeholder_toggle_keeps_single_occupant() {
    let mut tree = DomTree::new();
    let (ul, items) = list_with_items(&mut tree, 3);
    let placeholder = tree.create_comment("if");

    for _ in 0..4 {
        tree.replace(items[1], placeholder).unwrap();
        assert_eq!(tree.child_ids(ul), vec![items[0], placeholder, items[2]]);
        tree.replace(placeholder, items[1]).unwrap();
        assert_eq!(tree.child_ids(ul), vec![items[0], items[1], items[2]]);
    }
}

#[test]
fn test_insert_clones_after_anchor_in_order() {
    let mut tree = DomTree::new();
    let ul = tree.create_element("ul");
    tree.append_child(tree.root(), ul).unwrap();
    let anchor = tree.create_comment("repeat");
    let tail = tree.create_element("li");
    tree.append_child(ul, anchor).unwrap();
    tree.append_child(ul, tail).unwrap();

    let template = tree.create_element("li");
    let batch = tree.create_fragment();
    for label in ["a", "b"] {
        let clone = tree.clone_node(template, true).unwrap();
        tree.set_text_content(clone, label).unwrap();
        tree.append_child(batch, clone).unwrap();
    }
    tree.insert_after(anchor, batch).unwrap();

    let html = HtmlSerializer::new().serialize_inner(&tree, ul);
    assert_eq!(html, "<!--repeat--><li>a</li><li>b</li><li></li>");
}

#[test]
fn test_remove_listeners_in_subtree() {
    let mut tree = DomTree::new();
    let (ul, items) = list_with_items(&mut tree, 2);
    let outside = tree.create_element("p");
    for node in [ul, items[0], items[1], outside] {
        tree.listeners_mut().add(node, "click", Rc::new(|_| {}), ListenerOptions::default());
    }
    assert_eq!(tree.remove_listeners_in(ul), 3);
    assert_eq!(tree.listeners().count(), 1);
    assert_eq!(tree.listeners().count_for(outside), 1);
}

#[test]
fn test_descendants_preorder() {
    let mut tree = DomTree::new();
    let (ul, items) = list_with_items(&mut tree, 2);
    let texts: Vec<NodeId> = items.iter().filter_map(|li| tree.first_child(*li)).collect();
    assert_eq!(tree.descendants(ul), vec![items[0], texts[0], items[1], texts[1]]);
    assert_eq!(tree.text_content(ul), "item 0item 1");
}

#[test]
fn test_dispatch_reaches_document_root() {
    let doc = RefCell::new(Document::new("app"));
    let (mount, root) = {
        let d = doc.borrow();
        (d.mount(), d.tree.root())
    };
    let button = doc.borrow_mut().tree.create_element("button");
    doc.borrow_mut().tree.append_child(mount, button).unwrap();

    let seen = Rc::new(Cell::new(NodeId::NONE));
    let s = seen.clone();
    doc.borrow_mut().tree.listeners_mut().add(
        root,
        "selected",
        Rc::new(move |e: &mut Event| s.set(e.target)),
        ListenerOptions::default(),
    );
    let mut event = Event::custom("selected", Rc::new("payload".to_string()));
    assert!(dispatch_event(&doc, button, &mut event));
    assert_eq!(seen.get(), button);
}

#[test]
fn test_prevent_default_reported() {
    let doc = RefCell::new(Document::new("app"));
    let mount = doc.borrow().mount();
    doc.borrow_mut().tree.listeners_mut().add(
        mount,
        "submit",
        Rc::new(|e: &mut Event| e.prevent_default()),
        ListenerOptions::default(),
    );
    assert!(!dispatch_event(&doc, mount, &mut Event::bubbling("submit")));
}

#[test]
fn test_document_lookup_ignores_detached_nodes() {
    let mut doc = Document::new("app");
    let detached = doc.tree.create_element("div");
    doc.tree.set_attr(detached, "id", "ghost");
    assert_eq!(doc.get_element_by_id("ghost"), None);
    let mount = doc.mount();
    doc.tree.append_child(mount, detached).unwrap();
    assert_eq!(doc.get_element_by_id("ghost"), Some(detached));
    assert_eq!(doc.inner_html(mount), "<div id=\"ghost\"></div>");
}
