//! Comprehensive tests for tessel-html
//!
//! Template shapes the engine feeds through the parser.

use tessel_dom::{DomTree, HtmlSerializer};
use tessel_html::{parse_fragment, parse_sanitized, TemplateParser};

fn roundtrip(html: &str) -> String {
    let mut tree = DomTree::new();
    let frag = parse_fragment(html, &mut tree).unwrap();
    HtmlSerializer::new().serialize_inner(&tree, frag)
}

#[test]
fn test_directive_attributes_survive() {
    let html = r#"<li data-repeat="item in items" data-on:click="pick(item)">{{ item.name }}</li>"#;
    assert_eq!(
        roundtrip(&format!("<ul>{html}</ul>")),
        r#"<ul><li data-repeat="item in items" data-on:click="pick(item)">{{ item.name }}</li></ul>"#
    );
}

#[test]
fn test_custom_elements_parse_as_elements() {
    let mut tree = DomTree::new();
    let frag = parse_fragment(r#"<user-card data-bind:user="u"><span slot="title">T</span></user-card>"#, &mut tree).unwrap();
    let card = tree.first_child(frag).unwrap();
    assert_eq!(tree.tag_name(card), Some("user-card"));
    assert_eq!(tree.attr(card, "data-bind:user"), Some("u"));
    let span = tree.first_child(card).unwrap();
    assert_eq!(tree.attr(span, "slot"), Some("title"));
}

#[test]
fn test_multiple_top_level_nodes() {
    assert_eq!(roundtrip("<h1>A</h1><p>B</p>text"), "<h1>A</h1><p>B</p>text");
}

#[test]
fn test_comments_kept() {
    assert_eq!(roundtrip("<div><!-- note --></div>"), "<div><!-- note --></div>");
}

#[test]
fn test_text_is_unescaped_in_tree() {
    let mut tree = DomTree::new();
    let frag = parse_fragment("<p>a &amp; b</p>", &mut tree).unwrap();
    let p = tree.first_child(frag).unwrap();
    assert_eq!(tree.text_content(p), "a & b");
    assert_eq!(HtmlSerializer::new().serialize_inner(&tree, p), "a &amp; b");
}

#[test]
fn test_parse_into_parent() {
    let mut tree = DomTree::new();
    let div = tree.create_element("div");
    tree.append_child(tree.root(), div).unwrap();
    let nodes = TemplateParser::new().parse_into("<b>x</b><i>y</i>", &mut tree, div).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(tree.child_ids(div), nodes);
}

#[test]
fn test_keep_whitespace_option() {
    let mut tree = DomTree::new();
    let parser = TemplateParser { keep_whitespace: true };
    let frag = parser.parse_fragment("<p><b>a</b> <i>b</i></p>", &mut tree).unwrap();
    let p = tree.first_child(frag).unwrap();
    assert_eq!(tree.child_ids(p).len(), 3);
}

#[test]
fn test_sanitized_parse() {
    let mut tree = DomTree::new();
    let frag = parse_sanitized(
        r#"<p onmouseover="x()">Hi <img src="javascript:alert(1)" alt="a"><iframe src="/x"></iframe></p>"#,
        &mut tree,
    )
    .unwrap();
    assert_eq!(HtmlSerializer::new().serialize_inner(&tree, frag), r#"<p>Hi <img alt="a"></p>"#);
}

#[test]
fn test_empty_template() {
    let mut tree = DomTree::new();
    let frag = parse_fragment("", &mut tree).unwrap();
    assert!(tree.child_ids(frag).is_empty());
}
