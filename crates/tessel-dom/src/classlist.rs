//! DOMTokenList (classList)
//!
//! Space-separated token lists and the `class` attribute helpers the
//! engine uses for class bindings and fetch loading/error classes.

use crate::{DomTree, NodeId};

/// DOMTokenList for managing space-separated tokens (e.g., classList)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DOMTokenList {
    tokens: Vec<String>,
}

impl DOMTokenList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from space-separated string, dropping duplicates
    pub fn from_string(s: &str) -> Self {
        let mut list = Self::new();
        for token in s.split_whitespace() {
            list.add(&[token]);
        }
        list
    }

    pub fn length(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Add token(s)
    pub fn add(&mut self, tokens: &[&str]) {
        for token in tokens {
            if !token.is_empty() && !self.contains(token) {
                self.tokens.push(token.to_string());
            }
        }
    }

    /// Remove token(s)
    pub fn remove(&mut self, tokens: &[&str]) {
        self.tokens.retain(|t| !tokens.contains(&t.as_str()));
    }

    /// Toggle token, returns new state
    pub fn toggle(&mut self, token: &str, force: Option<bool>) -> bool {
        let on = force.unwrap_or(!self.contains(token));
        if on {
            self.add(&[token]);
        } else {
            self.remove(&[token]);
        }
        on
    }

    /// Tokens joined by single spaces
    pub fn value(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|s| s.as_str())
    }
}

impl std::fmt::Display for DOMTokenList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl DomTree {
    /// Parsed `class` attribute of an element
    pub fn class_list(&self, id: NodeId) -> DOMTokenList {
        DOMTokenList::from_string(self.attr(id, "class").unwrap_or_default())
    }

    /// Write a token list back; an empty list removes the attribute
    pub fn set_class_list(&mut self, id: NodeId, list: &DOMTokenList) -> bool {
        if list.is_empty() {
            self.remove_attr(id, "class")
        } else {
            self.set_attr(id, "class", &list.value())
        }
    }

    /// Add or remove a single class, returns true if the attribute changed
    pub fn toggle_class(&mut self, id: NodeId, token: &str, on: bool) -> bool {
        let mut list = self.class_list(id);
        if list.contains(token) == on {
            return false;
        }
        list.toggle(token, Some(on));
        self.set_class_list(id, &list)
    }

    pub fn has_class(&self, id: NodeId, token: &str) -> bool {
        self.class_list(id).contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        let list = DOMTokenList::from_string("btn btn-primary  active btn");
        assert_eq!(list.length(), 3);
        assert_eq!(list.value(), "btn btn-primary active");
    }

    #[test]
    fn test_toggle() {
        let mut list = DOMTokenList::new();
        assert!(list.toggle("active", None));
        assert!(!list.toggle("active", None));
        assert!(list.toggle("active", Some(true)));
        assert!(list.toggle("active", Some(true)));
        assert_eq!(list.length(), 1);
    }

    #[test]
    fn test_tree_helpers() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        tree.set_attr(div, "class", "card");
        assert!(tree.toggle_class(div, "loading", true));
        assert!(!tree.toggle_class(div, "loading", true));
        assert_eq!(tree.attr(div, "class"), Some("card loading"));
        tree.toggle_class(div, "card", false);
        tree.toggle_class(div, "loading", false);
        assert_eq!(tree.attr(div, "class"), None);
    }
}
