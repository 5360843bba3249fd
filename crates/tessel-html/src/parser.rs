//! Template parser
//!
//! Uses html5ever's RcDom and converts the result into our arena. Templates
//! are fragments, so the parsed `<head>` and `<body>` children are collected
//! into a detached fragment node instead of building a document.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use tessel_dom::{DomTree, NodeId};

use crate::ParseError;

/// HTML5 template parser
#[derive(Debug, Clone, Default)]
pub struct TemplateParser {
    /// Keep whitespace-only text nodes
    pub keep_whitespace: bool,
}

impl TemplateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `html` into a new detached fragment of `tree`
    pub fn parse_fragment(&self, html: &str, tree: &mut DomTree) -> Result<NodeId, ParseError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let fragment = tree.create_fragment();
        for section in Self::sections(&dom.document) {
            for child in section.children.borrow().iter() {
                self.convert_node(child, tree, fragment)?;
            }
        }

        tracing::trace!(bytes = html.len(), nodes = tree.child_ids(fragment).len(), "parsed template");
        Ok(fragment)
    }

    /// Parse `html` and append the result to `parent`, returning the new top-level nodes
    pub fn parse_into(&self, html: &str, tree: &mut DomTree, parent: NodeId) -> Result<Vec<NodeId>, ParseError> {
        let fragment = self.parse_fragment(html, tree)?;
        let nodes = tree.child_ids(fragment);
        tree.append_child(parent, fragment)?;
        Ok(nodes)
    }

    /// `<head>` and `<body>` of the implied document
    fn sections(document: &Handle) -> Vec<Handle> {
        let mut sections = Vec::new();
        for child in document.children.borrow().iter() {
            if let RcNodeData::Element { name, .. } = &child.data
                && &*name.local == "html"
            {
                for section in child.children.borrow().iter() {
                    if let RcNodeData::Element { name, .. } = &section.data
                        && matches!(&*name.local, "head" | "body")
                    {
                        sections.push(section.clone());
                    }
                }
            }
        }
        sections
    }

    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) -> Result<(), ParseError> {
        match &handle.data {
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if self.keep_whitespace || !text.trim().is_empty() {
                    let id = tree.create_text(&text);
                    tree.append_child(parent, id)?;
                }
            }
            RcNodeData::Comment { contents } => {
                let id = tree.create_comment(contents);
                tree.append_child(parent, id)?;
            }
            RcNodeData::Element { name, attrs, template_contents, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.element_mut(id) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, &attr.value);
                    }
                }
                tree.append_child(parent, id)?;

                // <template> keeps its content in a separate document fragment.
                let contents = template_contents.borrow();
                let children = match contents.as_ref() {
                    Some(content) => content.children.borrow().clone(),
                    None => handle.children.borrow().clone(),
                };
                for child in children.iter() {
                    self.convert_node(child, tree, id)?;
                }
            }
            RcNodeData::Document | RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_dom::HtmlSerializer;

    #[test]
    fn test_parse_simple_fragment() {
        let mut tree = DomTree::new();
        let frag = TemplateParser::new()
            .parse_fragment("<div class=\"a\"><span>Text</span></div>", &mut tree)
            .unwrap();
        let html = HtmlSerializer::new().serialize_inner(&tree, frag);
        assert_eq!(html, "<div class=\"a\"><span>Text</span></div>");
        assert_eq!(tree.parent(frag), None);
    }

    #[test]
    fn test_template_contents_become_children() {
        let mut tree = DomTree::new();
        let frag = TemplateParser::new()
            .parse_fragment("<template data-slot=\"header\"><h1>Hi</h1></template>", &mut tree)
            .unwrap();
        let template = tree.first_child(frag).unwrap();
        assert_eq!(tree.tag_name(template), Some("template"));
        assert_eq!(tree.text_content(template), "Hi");
    }

    #[test]
    fn test_whitespace_text_dropped() {
        let mut tree = DomTree::new();
        let frag = TemplateParser::new().parse_fragment("<ul>\n  <li>a</li>\n</ul>", &mut tree).unwrap();
        let ul = tree.first_child(frag).unwrap();
        assert_eq!(tree.child_ids(ul).len(), 1);
    }
}
