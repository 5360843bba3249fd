//! Tessel DOM - Document Object Model
//!
//! Arena-allocated DOM tree used as the render target of the template engine.
//! Nodes are addressed by [`NodeId`] and linked through parent/sibling ids
//! instead of pointers, so detached subtrees (templates, placeholders, slot
//! buckets) can live in the same arena as the rendered document.

mod classlist;
mod document;
mod events;
mod node;
mod serializer;
mod style;
mod tree;

pub use classlist::DOMTokenList;
pub use document::Document;
pub use events::{dispatch_event, Event, Listener, ListenerId, ListenerOptions, ListenerRegistry};
pub use node::{Attribute, ElementData, Node, NodeData, TextData};
pub use serializer::{escape_attribute, escape_text, HtmlSerializer};
pub use style::{camel_to_kebab, StyleDeclarations};
pub use tree::DomTree;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this is not the sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn option(self) -> Option<NodeId> {
        self.is_valid().then_some(self)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0} not found")]
    NotFound(NodeId),

    #[error("hierarchy request error: {0} cannot be inserted into {1}")]
    HierarchyRequest(NodeId, NodeId),

    #[error("node {0} is not a child of {1}")]
    NotAChild(NodeId, NodeId),

    #[error("node {0} has no parent")]
    Detached(NodeId),

    #[error("invalid node type for {0}")]
    InvalidNodeType(NodeId),
}
