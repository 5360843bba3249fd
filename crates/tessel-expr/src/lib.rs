//! Tessel Expressions
//!
//! The restricted expression language used inside templates:
//!
//! - literals, identifiers, array and object literals
//! - member access (`.`, `?.`, `[]`) and calls
//! - unary `!` `-` `+` `typeof`, arithmetic, comparison, equality
//! - `&&` `||` `??`, conditional `?:`, assignment to names and members
//!
//! There are no function literals, no `new` and no statements. Sources that
//! mention a denylisted name are rejected before parsing.

mod ast;
mod filters;
mod interpreter;
mod lexer;
mod parser;
mod safety;
mod token;

use std::fmt;
use std::rc::Rc;

use tessel_store::{CallError, Value};
use tracing::trace;

pub use ast::{Ast, AstNode, AstNodeKind, BinaryOp, LiteralValue, LogicalOp, MemberProperty, NodeId, UnaryOp};
pub use filters::{parse_literal_arg, split_filters, FilterCall, FilterChain};
pub use interpreter::Scope;
pub use lexer::Lexer;
pub use parser::{ParseError, Parser};
pub use safety::{find_blocked, is_blocked_property};
pub use token::{Span, Token, TokenKind};

use interpreter::Interpreter;

/// Expression error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: u32 },

    #[error("blocked expression: `{0}` is not allowed")]
    Blocked(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl From<ParseError> for ExprError {
    fn from(err: ParseError) -> Self {
        ExprError::Syntax { message: err.message, offset: err.span.start }
    }
}

/// A compiled expression. Cheap to clone.
#[derive(Clone)]
pub struct Expression {
    source: Rc<str>,
    ast: Rc<Ast>,
}

impl Expression {
    /// Check the denylist, then parse
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        if let Some(word) = find_blocked(source) {
            return Err(ExprError::Blocked(word.to_string()));
        }
        let ast = Parser::new(source).parse()?;
        trace!(source, nodes = ast.len(), "compiled expression");
        Ok(Self { source: Rc::from(source), ast: Rc::new(ast) })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Value, ExprError> {
        Interpreter::new(&self.ast, scope).run()
    }

    /// Evaluate, also returning the receiver a function result should be
    /// called with (`user` for `user.greet`)
    pub fn evaluate_with_receiver(&self, scope: &dyn Scope) -> Result<(Value, Value), ExprError> {
        Interpreter::new(&self.ast, scope).run_with_receiver()
    }

    /// Write `value` to the place this expression names (`a`, `a.b[0]`)
    pub fn assign(&self, scope: &dyn Scope, value: Value) -> Result<(), ExprError> {
        let root = self.ast.root().ok_or_else(|| ExprError::Type("empty expression".into()))?;
        if !self.is_assignable() {
            return Err(ExprError::Type(format!("cannot assign to `{}`", self.source)));
        }
        Interpreter::new(&self.ast, scope).assign_to(root, value)
    }

    /// Identifier or non-optional member chain
    pub fn is_assignable(&self) -> bool {
        match self.root_kind() {
            Some(AstNodeKind::Identifier { .. }) => true,
            Some(AstNodeKind::MemberExpression { optional, .. }) => !optional,
            _ => false,
        }
    }

    /// Dotted path for plain chains (`user.tags.0`), `None` otherwise
    pub fn as_path(&self) -> Option<String> {
        let mut segments = Vec::new();
        let mut id = self.ast.root()?;
        loop {
            match &self.ast.get(id)?.kind {
                AstNodeKind::Identifier { name } => {
                    segments.push(name.to_string());
                    break;
                }
                AstNodeKind::MemberExpression { object, property, .. } => {
                    match property {
                        MemberProperty::Named(name) => segments.push(name.to_string()),
                        MemberProperty::Computed(key) => match &self.ast.get(*key)?.kind {
                            AstNodeKind::Literal { value: LiteralValue::String(s) } if !s.contains('.') => {
                                segments.push(s.to_string())
                            }
                            AstNodeKind::Literal { value: LiteralValue::Number(n) } => {
                                segments.push(Value::Number(*n).to_display_string())
                            }
                            _ => return None,
                        },
                    }
                    id = *object;
                }
                _ => return None,
            }
        }
        segments.reverse();
        Some(segments.join("."))
    }

    /// First identifier of a plain chain (`user` in `user.name`)
    pub fn root_identifier(&self) -> Option<&str> {
        let mut id = self.ast.root()?;
        loop {
            match &self.ast.get(id)?.kind {
                AstNodeKind::Identifier { name } => return Some(&**name),
                AstNodeKind::MemberExpression { object, .. } => id = *object,
                _ => return None,
            }
        }
    }

    fn root_kind(&self) -> Option<&AstNodeKind> {
        self.ast.get(self.ast.root()?).map(|n| &n.kind)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

/// Compile and evaluate in one step
pub fn evaluate(source: &str, scope: &dyn Scope) -> Result<Value, ExprError> {
    Expression::compile(source)?.evaluate(scope)
}

/// True for `[A-Za-z_$][A-Za-z0-9_$]*` that is not a keyword
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(lexer::is_ident_start)
        && chars.all(lexer::is_ident_part)
        && token::keyword_from_str(name).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_path() {
        let path = |s: &str| Expression::compile(s).unwrap().as_path();
        assert_eq!(path("user.name").as_deref(), Some("user.name"));
        assert_eq!(path("items[0].title").as_deref(), Some("items.0.title"));
        assert_eq!(path("a['b']").as_deref(), Some("a.b"));
        assert_eq!(path("a[i]"), None);
        assert_eq!(path("a + b"), None);
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("$event"));
        assert!(is_valid_identifier("_private1"));
        assert!(!is_valid_identifier("data-id"));
        assert!(!is_valid_identifier("1st"));
        assert!(!is_valid_identifier("new"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_blocked_before_parse() {
        assert!(matches!(Expression::compile("eval(x)"), Err(ExprError::Blocked(_))));
    }

    #[test]
    fn test_syntax_error_offset() {
        let Err(ExprError::Syntax { offset, .. }) = Expression::compile("a +") else {
            panic!("expected syntax error");
        };
        assert_eq!(offset, 3);
    }
}
