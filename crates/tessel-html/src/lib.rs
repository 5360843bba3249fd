//! Tessel HTML
//!
//! Template parsing built on html5ever, converted into the arena tree of
//! `tessel-dom`, plus a tree-based sanitizer for untrusted markup.

mod parser;
mod sanitize;

pub use parser::TemplateParser;
pub use sanitize::{Sanitizer, SanitizerConfig};

use tessel_dom::{DomError, DomTree, NodeId};

/// Parse a template into a detached fragment of `tree`
pub fn parse_fragment(html: &str, tree: &mut DomTree) -> Result<NodeId, ParseError> {
    TemplateParser::new().parse_fragment(html, tree)
}

/// Parse untrusted markup and strip everything unsafe from it
pub fn parse_sanitized(html: &str, tree: &mut DomTree) -> Result<NodeId, ParseError> {
    let fragment = parse_fragment(html, tree)?;
    Sanitizer::default_safe().sanitize(tree, fragment);
    Ok(fragment)
}

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read template input: {0}")]
    Io(#[from] std::io::Error),

    #[error("tree construction failed: {0}")]
    Tree(#[from] DomError),
}
