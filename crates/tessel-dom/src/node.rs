//! DOM Node - Compact representation
//!
//! Uses NodeId (4 bytes) links instead of pointers. Element "properties"
//! that diverge from attributes once a user interacts with a control
//! (`checked`, `value`) are stored next to the attribute list.

use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if detached or root)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    fn with_data(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Create a new element node
    pub fn element(tag: &str) -> Self {
        Self::with_data(NodeData::Element(ElementData::new(tag)))
    }

    /// Create a new text node
    pub fn text(content: &str) -> Self {
        Self::with_data(NodeData::Text(TextData { content: content.to_string() }))
    }

    /// Create a comment node
    pub fn comment(content: &str) -> Self {
        Self::with_data(NodeData::Comment(content.to_string()))
    }

    /// Create a document node
    pub fn document() -> Self {
        Self::with_data(NodeData::Document)
    }

    /// Create a document fragment node
    pub fn fragment() -> Self {
        Self::with_data(NodeData::Fragment)
    }

    /// Copy of this node's payload without any tree links
    pub fn shallow_copy(&self) -> Self {
        Self::with_data(self.data.clone())
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self.data, NodeData::Comment(_))
    }

    /// Can this node hold children
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self.data, NodeData::Element(_) | NodeData::Fragment | NodeData::Document)
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(&t.content),
            _ => None,
        }
    }

    #[inline]
    pub fn as_comment(&self) -> Option<&str> {
        match &self.data {
            NodeData::Comment(c) => Some(c),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Detached container used for templates and batch inserts
    Fragment,
    /// Element
    Element(ElementData),
    /// Text content
    Text(TextData),
    /// Comment (placeholders and anchors)
    Comment(String),
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lower-case tag name
    pub tag: String,
    /// Attributes in source order
    pub attrs: Vec<Attribute>,
    /// `checked` property of checkbox/radio controls
    pub checked: bool,
    /// `value` property of form controls, once set
    pub value: Option<String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            checked: false,
            value: None,
        }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, returns true if the stored value changed
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        if name == "checked" {
            self.checked = true;
        }
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                if attr.value == value {
                    return false;
                }
                attr.value = value.to_string();
                return true;
            }
        }
        self.attrs.push(Attribute { name: name.to_string(), value: value.to_string() });
        true
    }

    /// Remove an attribute, returning its old value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        if name == "checked" {
            self.checked = false;
        }
        let pos = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(pos).value)
    }

    /// Current control value: the property if set, else the attribute
    pub fn current_value(&self) -> String {
        match &self.value {
            Some(v) => v.clone(),
            None => self.get_attr("value").unwrap_or_default().to_string(),
        }
    }

    /// `type` attribute of an input, lower-cased
    pub fn input_type(&self) -> String {
        self.get_attr("type").unwrap_or("text").to_ascii_lowercase()
    }

    /// Is this a form control that carries a value
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "select" | "textarea")
    }
}

/// Text node data
#[derive(Debug, Clone)]
pub struct TextData {
    pub content: String,
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attr_reports_change() {
        let mut elem = ElementData::new("DIV");
        assert_eq!(elem.tag, "div");
        assert!(elem.set_attr("id", "main"));
        assert!(!elem.set_attr("id", "main"));
        assert!(elem.set_attr("id", "other"));
        assert_eq!(elem.get_attr("id"), Some("other"));
    }

    #[test]
    fn test_checked_attribute_mirrors_property() {
        let mut elem = ElementData::new("input");
        elem.set_attr("checked", "");
        assert!(elem.checked);
        elem.remove_attr("checked");
        assert!(!elem.checked);
    }

    #[test]
    fn test_current_value_prefers_property() {
        let mut elem = ElementData::new("input");
        elem.set_attr("value", "attr");
        assert_eq!(elem.current_value(), "attr");
        elem.value = Some("prop".into());
        assert_eq!(elem.current_value(), "prop");
    }
}
