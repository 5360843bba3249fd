//! DOM Tree (arena-based allocation)
//!
//! All nodes, attached or not, live in one `Vec`. Detaching a node only
//! unlinks it; ids stay valid for the lifetime of the tree, which lets the
//! engine keep templates and placeholder comments around between renders.

use crate::{DomError, DomResult, ElementData, ListenerRegistry, Node, NodeData, NodeId};

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
    listeners: ListenerRegistry,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::document()],
            listeners: ListenerRegistry::new(),
        }
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes in the arena (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(Node::comment(content))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(Node::fragment())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent.option()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child.option()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child.option()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling.option()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling.option()
    }

    /// Iterate children as `(id, node)` pairs
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE),
        }
    }

    /// Snapshot of child ids, safe to hold across mutations
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).map(|(child, _)| child).collect()
    }

    /// Is `node` equal to or inside `ancestor`
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node.option();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Is the node reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(NodeId::ROOT, id)
    }

    /// Pre-order list of descendants, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.child_ids(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.child_ids(node).into_iter().rev());
        }
        out
    }

    /// Pre-order list of the subtree, including `id`
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        out.extend(self.descendants(id));
        out
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let parent_node = self.get(parent).ok_or(DomError::NotFound(parent))?;
        if !parent_node.is_container() {
            return Err(DomError::HierarchyRequest(child, parent));
        }
        self.get(child).ok_or(DomError::NotFound(child))?;
        if child == NodeId::ROOT || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest(child, parent));
        }
        Ok(())
    }

    fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.get(id).map(|n| &n.data), Some(NodeData::Fragment))
    }

    /// Unlink a node from its parent. No-op for detached nodes.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        let node = self.get(id).ok_or(DomError::NotFound(id))?;
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return Ok(());
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let node = &mut self.nodes[id.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
        Ok(())
    }

    /// Link a detached node before `reference` (or at the end if NONE)
    fn link_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        let prev = if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling
        } else {
            self.nodes[parent.index()].last_child
        };

        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling = child;
        } else {
            self.nodes[parent.index()].last_child = child;
        }
    }

    /// Append a child. Appending a fragment moves the fragment's children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `new_child` before `reference` (append when `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.check_insert(parent, new_child)?;
        let reference = match reference {
            Some(r) => {
                if self.parent(r) != Some(parent) {
                    return Err(DomError::NotAChild(r, parent));
                }
                if r == new_child {
                    return Ok(());
                }
                r
            }
            None => NodeId::NONE,
        };

        if self.is_fragment(new_child) {
            for child in self.child_ids(new_child) {
                self.detach(child)?;
                self.link_before(parent, child, reference);
            }
            return Ok(());
        }

        self.detach(new_child)?;
        self.link_before(parent, new_child, reference);
        Ok(())
    }

    /// Insert `new_child` right after `reference` in reference's parent
    pub fn insert_after(&mut self, reference: NodeId, new_child: NodeId) -> DomResult<()> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        if reference == new_child {
            return Ok(());
        }
        let next = self.next_sibling(reference);
        if next == Some(new_child) {
            return Ok(());
        }
        self.insert_before(parent, new_child, next)
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        if old == new {
            return Ok(());
        }
        let parent = self.parent(old).ok_or(DomError::Detached(old))?;
        self.insert_before(parent, new, Some(old))?;
        self.detach(old)
    }

    /// Detach every child, returning them in order
    pub fn remove_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = self.child_ids(id);
        for child in &children {
            // Children of `id` always have a parent; detach cannot fail here.
            let _ = self.detach(*child);
        }
        children
    }

    /// Clone a node into a detached copy. Documents clone as fragments.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let mut copy = self.get(id).ok_or(DomError::NotFound(id))?.shallow_copy();
        if matches!(copy.data, NodeData::Document) {
            copy.data = NodeData::Fragment;
        }
        let new_id = self.push(copy);
        if deep {
            for child in self.child_ids(id) {
                let cloned = self.clone_node(child, true)?;
                self.link_before(new_id, cloned, NodeId::NONE);
            }
        }
        Ok(new_id)
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Concatenated text of the subtree
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.subtree(id) {
            if let Some(text) = self.get(node).and_then(|n| n.as_text()) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        let node = self.get_mut(id).ok_or(DomError::NotFound(id))?;
        match &mut node.data {
            NodeData::Text(t) => {
                t.content = text.to_string();
                return Ok(());
            }
            NodeData::Comment(c) => {
                *c = text.to_string();
                return Ok(());
            }
            _ => {}
        }
        self.remove_children(id);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node)?;
        }
        Ok(())
    }

    /// Set the data of a text node, returns true if it changed
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(t)) if t.content != text => {
                t.content = text.to_string();
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Elements and attributes
    // ------------------------------------------------------------------

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id)?.as_element()
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id)?.as_element_mut()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.get_attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_attr(name))
    }

    /// Set an attribute, returns true if the value changed
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        self.element_mut(id).is_some_and(|e| e.set_attr(name, value))
    }

    /// Remove an attribute, returns true if it was present
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        self.element_mut(id).and_then(|e| e.remove_attr(name)).is_some()
    }

    /// Snapshot of an element's attributes
    pub fn attrs(&self, id: NodeId) -> Vec<(String, String)> {
        self.element(id)
            .map(|e| e.attrs.iter().map(|a| (a.name.clone(), a.value.clone())).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// All nodes in the subtree of `root` (exclusive) matching `pred`
    pub fn find_all(&self, root: NodeId, pred: impl Fn(NodeId, &Node) -> bool) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|n| pred(*id, n)))
            .collect()
    }

    pub fn find_first(&self, root: NodeId, pred: impl Fn(NodeId, &Node) -> bool) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|n| pred(*id, n)))
    }

    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.find_all(root, |_, n| n.as_element().is_some_and(|e| e.tag == tag))
    }

    pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.find_first(root, |_, n| n.as_element().and_then(|e| e.get_attr("id")) == Some(id))
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    /// Remove every listener registered on `root` or its descendants
    pub fn remove_listeners_in(&mut self, root: NodeId) -> usize {
        let nodes = self.subtree(root);
        nodes.into_iter().map(|id| self.listeners.remove_all(id)).sum()
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node>()
    }
}

/// Child iterator following sibling links
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.option()?;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}
