//! HTML sanitizer for `data-safe-html`
//!
//! Works on the parsed tree: blocked elements are removed with their
//! content, unknown elements are unwrapped, attributes are filtered by an
//! allowlist and URL attributes are checked for script schemes.

use std::collections::{HashMap, HashSet};

use tessel_dom::{DomTree, NodeId};

/// Sanitizer configuration
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    pub allowed_tags: HashSet<String>,
    /// Removed together with everything inside them
    pub blocked_tags: HashSet<String>,
    /// Allowed attributes per tag, `*` for every tag
    pub allowed_attributes: HashMap<String, HashSet<String>>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<HashSet<_>>();

        let allowed_tags = set(&[
            "a", "abbr", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4", "h5",
            "h6", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span", "strong", "sub", "sup",
            "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
        ]);
        let blocked_tags = set(&[
            "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "form",
            "input", "button", "select", "textarea", "base", "meta", "link", "template",
        ]);

        let mut allowed_attributes = HashMap::new();
        allowed_attributes.insert("*".into(), set(&["class", "id", "title", "lang", "dir", "hidden"]));
        allowed_attributes.insert("a".into(), set(&["href", "target", "rel"]));
        allowed_attributes.insert("img".into(), set(&["src", "alt", "width", "height"]));

        Self { allowed_tags, blocked_tags, allowed_attributes }
    }
}

/// Tree sanitizer
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
}

impl Sanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Self { config }
    }

    pub fn default_safe() -> Self {
        Self::new(SanitizerConfig::default())
    }

    /// Sanitize the children of `root` in place. Returns the number of
    /// elements removed or unwrapped.
    pub fn sanitize(&self, tree: &mut DomTree, root: NodeId) -> usize {
        let mut changed = 0;
        for child in tree.child_ids(root) {
            changed += self.sanitize_node(tree, child);
        }
        changed
    }

    fn sanitize_node(&self, tree: &mut DomTree, id: NodeId) -> usize {
        let Some(node) = tree.get(id) else {
            return 0;
        };
        if node.is_comment() {
            let _ = tree.detach(id);
            return 0;
        }
        let Some(tag) = node.as_element().map(|e| e.tag.clone()) else {
            return 0;
        };

        if self.config.blocked_tags.contains(&tag) {
            tracing::debug!(tag = %tag, "sanitizer dropped element");
            let _ = tree.detach(id);
            return 1;
        }

        let mut changed = 0;
        for child in tree.child_ids(id) {
            changed += self.sanitize_node(tree, child);
        }

        if !self.config.allowed_tags.contains(&tag) {
            // Unwrap: keep the (already sanitized) children in place.
            if let Some(parent) = tree.parent(id) {
                for child in tree.child_ids(id) {
                    let _ = tree.insert_before(parent, child, Some(id));
                }
            }
            let _ = tree.detach(id);
            return changed + 1;
        }

        for (name, value) in tree.attrs(id) {
            if !self.is_attribute_allowed(&name, &tag) || !is_safe_value(&name, &value) {
                tree.remove_attr(id, &name);
            }
        }
        changed
    }

    fn is_attribute_allowed(&self, attr: &str, tag: &str) -> bool {
        if attr.starts_with("on") {
            return false;
        }
        let allowed = |key: &str| self.config.allowed_attributes.get(key).is_some_and(|set| set.contains(attr));
        allowed("*") || allowed(tag)
    }
}

fn is_safe_value(attr: &str, value: &str) -> bool {
    if attr != "href" && attr != "src" {
        return true;
    }
    let lower: String = value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    !(lower.starts_with("javascript:") || lower.starts_with("vbscript:") || lower.starts_with("data:text/html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateParser;
    use tessel_dom::HtmlSerializer;

    fn clean(html: &str) -> String {
        let mut tree = DomTree::new();
        let frag = TemplateParser::new().parse_fragment(html, &mut tree).unwrap();
        Sanitizer::default_safe().sanitize(&mut tree, frag);
        HtmlSerializer::new().serialize_inner(&tree, frag)
    }

    #[test]
    fn test_sanitize_script() {
        assert_eq!(clean("<div><script>alert('xss')</script>ok</div>"), "<div>ok</div>");
    }

    #[test]
    fn test_sanitize_event_handler() {
        assert_eq!(clean("<b onclick=\"alert(1)\" class=\"x\">t</b>"), "<b class=\"x\">t</b>");
    }

    #[test]
    fn test_javascript_url_removed() {
        assert_eq!(clean("<a href=\" javascript:alert(1)\">x</a>"), "<a>x</a>");
        assert_eq!(clean("<a href=\"/home\">x</a>"), "<a href=\"/home\">x</a>");
    }

    #[test]
    fn test_unknown_tag_unwrapped() {
        assert_eq!(clean("<p><blink>hi</blink></p>"), "<p>hi</p>");
    }
}
