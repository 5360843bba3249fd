//! Inline style declarations (`style` attribute)

use crate::{DomTree, NodeId};

/// Ordered list of `property: value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    decls: Vec<(String, String)>,
}

impl StyleDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `color: red; display: none`
    pub fn parse(css: &str) -> Self {
        let mut style = Self::new();
        for decl in css.split(';') {
            if let Some((prop, value)) = decl.split_once(':') {
                let (prop, value) = (prop.trim(), value.trim());
                if !prop.is_empty() {
                    style.set_property(prop, value);
                }
            }
        }
        style
    }

    pub fn get_property(&self, prop: &str) -> Option<&str> {
        self.decls.iter().find(|(p, _)| p == prop).map(|(_, v)| v.as_str())
    }

    /// Set a property; an empty value removes it
    pub fn set_property(&mut self, prop: &str, value: &str) {
        if value.is_empty() {
            self.remove_property(prop);
            return;
        }
        match self.decls.iter_mut().find(|(p, _)| p == prop) {
            Some(decl) => decl.1 = value.to_string(),
            None => self.decls.push((prop.to_string(), value.to_string())),
        }
    }

    pub fn remove_property(&mut self, prop: &str) -> Option<String> {
        let pos = self.decls.iter().position(|(p, _)| p == prop)?;
        Some(self.decls.remove(pos).1)
    }

    /// Append every declaration of `other`, overriding existing ones
    pub fn merge(&mut self, other: &StyleDeclarations) {
        for (prop, value) in &other.decls {
            self.set_property(prop, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Serialized form used for the `style` attribute
    pub fn css_text(&self) -> String {
        self.decls
            .iter()
            .map(|(p, v)| format!("{p}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Convert camelCase to kebab-case (`fontSize` -> `font-size`)
pub fn camel_to_kebab(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            result.push('-');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

impl DomTree {
    /// Parsed `style` attribute
    pub fn style(&self, id: NodeId) -> StyleDeclarations {
        StyleDeclarations::parse(self.attr(id, "style").unwrap_or_default())
    }

    /// Write declarations back; empty declarations remove the attribute
    pub fn set_style(&mut self, id: NodeId, style: &StyleDeclarations) -> bool {
        if style.is_empty() {
            self.remove_attr(id, "style")
        } else {
            self.set_attr(id, "style", &style.css_text())
        }
    }

    /// Set or clear (`None`) a single inline property
    pub fn set_style_property(&mut self, id: NodeId, prop: &str, value: Option<&str>) -> bool {
        let mut style = self.style(id);
        match value {
            Some(v) => style.set_property(prop, v),
            None => {
                style.remove_property(prop);
            }
        }
        self.set_style(id, &style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let style = StyleDeclarations::parse("color: red;  font-size:12px ;bad");
        assert_eq!(style.len(), 2);
        assert_eq!(style.get_property("font-size"), Some("12px"));
        assert_eq!(style.css_text(), "color: red; font-size: 12px;");
    }

    #[test]
    fn test_camel_to_kebab() {
        assert_eq!(camel_to_kebab("backgroundColor"), "background-color");
        assert_eq!(camel_to_kebab("color"), "color");
    }

    #[test]
    fn test_display_toggle_preserves_other_properties() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        tree.set_attr(div, "style", "color: red");
        tree.set_style_property(div, "display", Some("none"));
        assert_eq!(tree.attr(div, "style"), Some("color: red; display: none;"));
        tree.set_style_property(div, "display", None);
        assert_eq!(tree.attr(div, "style"), Some("color: red;"));
    }
}
