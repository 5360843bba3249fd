//! Document - High-level document API

use crate::{DomTree, HtmlSerializer, NodeId};

/// HTML Document with a mount element inside `<body>`
#[derive(Debug)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    html_element: NodeId,
    head_element: NodeId,
    body_element: NodeId,
    mount_element: NodeId,
}

impl Document {
    /// Create `<html><head></head><body><div id="{mount_id}"></div></body></html>`
    pub fn new(mount_id: &str) -> Self {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");
        let mount = tree.create_element("div");
        tree.set_attr(mount, "id", mount_id);

        // Freshly created element nodes; linking them cannot fail.
        let _ = tree.append_child(tree.root(), html);
        let _ = tree.append_child(html, head);
        let _ = tree.append_child(html, body);
        let _ = tree.append_child(body, mount);

        Self {
            tree,
            html_element: html,
            head_element: head,
            body_element: body,
            mount_element: mount,
        }
    }

    pub fn html(&self) -> NodeId {
        self.html_element
    }

    pub fn head(&self) -> NodeId {
        self.head_element
    }

    pub fn body(&self) -> NodeId {
        self.body_element
    }

    /// Element the application renders into
    pub fn mount(&self) -> NodeId {
        self.mount_element
    }

    /// Find an attached element by its id attribute
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.get_element_by_id(self.tree.root(), id)
    }

    /// Attached elements with the given tag
    pub fn get_elements_by_tag_name(&self, tag: &str) -> Vec<NodeId> {
        self.tree.elements_by_tag(self.tree.root(), tag)
    }

    /// Serialized children of a node
    pub fn inner_html(&self, id: NodeId) -> String {
        HtmlSerializer::new().serialize_inner(&self.tree, id)
    }

    /// Serialized node including itself
    pub fn outer_html(&self, id: NodeId) -> String {
        HtmlSerializer::new().serialize_outer(&self.tree, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_structure() {
        let doc = Document::new("app");
        assert_eq!(doc.tree.parent(doc.mount()), Some(doc.body()));
        assert_eq!(doc.get_element_by_id("app"), Some(doc.mount()));
        assert_eq!(doc.outer_html(doc.mount()), "<div id=\"app\"></div>");
    }
}
