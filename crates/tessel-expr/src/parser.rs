//! Expression Parser
//!
//! Recursive descent over the token stream, one function per precedence
//! level:
//!
//! assignment > conditional > `||` `??` > `&&` > equality > comparison >
//! additive > multiplicative > unary > call/member > primary

use crate::ast::{
    Ast, AstNode, AstNodeKind, BinaryOp, LiteralValue, LogicalOp, MemberProperty, NodeId, UnaryOp,
};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

/// Nesting limit for parenthesized/bracketed input
const MAX_NESTING: usize = 64;

/// Parser error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Expression Parser
pub struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    ast: Ast,
    depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            source,
            lexer,
            current: current.clone(),
            previous: current,
            ast: Ast::new(),
            depth: 0,
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        let message = match &self.current.kind {
            TokenKind::Eof => format!("{message}, found end of input"),
            TokenKind::Error(err) => format!("{message}: {err}"),
            _ => format!("{message}, found '{}'", self.token_text(&self.current)),
        };
        ParseError { message, span: self.current.span }
    }

    fn token_text(&self, token: &Token) -> &'src str {
        self.source
            .get(token.span.start as usize..token.span.end as usize)
            .unwrap_or_default()
    }

    fn span_of(&self, id: NodeId) -> Span {
        self.ast.get(id).map(|n| n.span).unwrap_or(self.previous.span)
    }

    fn add(&mut self, kind: AstNodeKind, span: Span) -> NodeId {
        self.ast.add_node(AstNode::new(kind, span))
    }

    /// Parse a complete expression
    pub fn parse(mut self) -> Result<Ast, ParseError> {
        if self.check(&TokenKind::Eof) {
            return Err(self.error("expected an expression"));
        }
        let root = self.parse_expression()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.error("unexpected token"));
        }
        self.ast.set_root(root);
        Ok(self.ast)
    }

    fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        let result = self.parse_assignment();
        self.depth -= 1;
        result
    }

    fn parse_assignment(&mut self) -> Result<NodeId, ParseError> {
        let target = self.parse_conditional()?;

        if self.check(&TokenKind::Eq) {
            let assignable = match self.ast.get(target).map(|n| &n.kind) {
                Some(AstNodeKind::Identifier { .. }) => true,
                Some(AstNodeKind::MemberExpression { optional, .. }) => !optional,
                _ => false,
            };
            if !assignable {
                return Err(self.error("invalid assignment target"));
            }
            self.advance();
            let value = self.parse_assignment()?;
            let span = self.span_of(target).merge(self.span_of(value));
            return Ok(self.add(AstNodeKind::AssignmentExpression { target, value }, span));
        }

        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<NodeId, ParseError> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance();
            let consequent = self.parse_assignment()?;
            self.consume(TokenKind::Colon, "':' in conditional expression")?;
            let alternate = self.parse_assignment()?;
            let span = self.span_of(test).merge(self.span_of(alternate));
            return Ok(self.add(
                AstNodeKind::ConditionalExpression { test, consequent, alternate },
                span,
            ));
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_logical_and()?;

        while matches!(self.current.kind, TokenKind::PipePipe | TokenKind::QuestionQuestion) {
            let operator = match self.current.kind {
                TokenKind::PipePipe => LogicalOp::Or,
                _ => LogicalOp::NullishCoalescing,
            };
            self.advance();
            let right = self.parse_logical_and()?;
            let span = self.span_of(left).merge(self.span_of(right));
            left = self.add(AstNodeKind::LogicalExpression { operator, left, right }, span);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            let span = self.span_of(left).merge(self.span_of(right));
            left = self.add(
                AstNodeKind::LogicalExpression { operator: LogicalOp::And, left, right },
                span,
            );
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_comparison()?;

        while matches!(
            self.current.kind,
            TokenKind::EqEq | TokenKind::NotEq | TokenKind::EqEqEq | TokenKind::NotEqEq
        ) {
            let operator = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                TokenKind::EqEqEq => BinaryOp::StrictEqual,
                _ => BinaryOp::StrictNotEqual,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_additive()?;

        while matches!(
            self.current.kind,
            TokenKind::LessThan | TokenKind::LessThanEq | TokenKind::GreaterThan | TokenKind::GreaterThanEq
        ) {
            let operator = match self.current.kind {
                TokenKind::LessThan => BinaryOp::LessThan,
                TokenKind::LessThanEq => BinaryOp::LessThanEq,
                TokenKind::GreaterThan => BinaryOp::GreaterThan,
                _ => BinaryOp::GreaterThanEq,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_multiplicative()?;

        while matches!(self.current.kind, TokenKind::Plus | TokenKind::Minus) {
            let operator = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                _ => BinaryOp::Sub,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_unary()?;

        while matches!(self.current.kind, TokenKind::Star | TokenKind::Slash | TokenKind::Percent) {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(operator, left, right);
        }
        Ok(left)
    }

    fn binary(&mut self, operator: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        let span = self.span_of(left).merge(self.span_of(right));
        self.add(AstNodeKind::BinaryExpression { operator, left, right }, span)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            _ => return self.parse_call(),
        };
        self.advance();

        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        let argument = self.parse_unary();
        self.depth -= 1;
        let argument = argument?;

        let span = start.merge(self.span_of(argument));
        Ok(self.add(AstNodeKind::UnaryExpression { operator, argument }, span))
    }

    /// Member access and calls, including optional chaining
    fn parse_call(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.parse_property_name()?;
                    expr = self.member(expr, MemberProperty::Named(name), false);
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    if self.check(&TokenKind::LParen) {
                        expr = self.parse_call_arguments(expr, true)?;
                    } else if self.check(&TokenKind::LBracket) {
                        expr = self.parse_computed_member(expr, true)?;
                    } else {
                        let name = self.parse_property_name()?;
                        expr = self.member(expr, MemberProperty::Named(name), true);
                    }
                }
                TokenKind::LBracket => expr = self.parse_computed_member(expr, false)?,
                TokenKind::LParen => expr = self.parse_call_arguments(expr, false)?,
                _ => break,
            }
        }

        Ok(expr)
    }

    fn member(&mut self, object: NodeId, property: MemberProperty, optional: bool) -> NodeId {
        let span = self.span_of(object).merge(self.previous.span);
        self.add(AstNodeKind::MemberExpression { object, property, optional }, span)
    }

    fn parse_computed_member(&mut self, object: NodeId, optional: bool) -> Result<NodeId, ParseError> {
        self.consume(TokenKind::LBracket, "'['")?;
        let property = self.parse_expression()?;
        self.consume(TokenKind::RBracket, "']'")?;
        Ok(self.member(object, MemberProperty::Computed(property), optional))
    }

    fn parse_call_arguments(&mut self, callee: NodeId, optional: bool) -> Result<NodeId, ParseError> {
        self.consume(TokenKind::LParen, "'('")?;
        let mut arguments = Vec::new();
        while !self.check(&TokenKind::RParen) {
            arguments.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.consume(TokenKind::RParen, "')' after arguments")?;
        let span = self.span_of(callee).merge(self.previous.span);
        Ok(self.add(AstNodeKind::CallExpression { callee, arguments, optional }, span))
    }

    /// Name after `.`; keywords are valid property names
    fn parse_property_name(&mut self) -> Result<Box<str>, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Boolean(_)
            | TokenKind::Null
            | TokenKind::Undefined
            | TokenKind::This
            | TokenKind::Typeof
            | TokenKind::Reserved(_) => {
                let name: Box<str> = self.token_text(&self.current).into();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected property name")),
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let span = self.current.span;
        let literal = match &self.current.kind {
            TokenKind::Number(n) => Some(LiteralValue::Number(*n)),
            TokenKind::String(s) => Some(LiteralValue::String(s.clone())),
            TokenKind::Boolean(b) => Some(LiteralValue::Bool(*b)),
            TokenKind::Null => Some(LiteralValue::Null),
            TokenKind::Undefined => Some(LiteralValue::Undefined),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(self.add(AstNodeKind::Literal { value }, span));
        }

        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(self.add(AstNodeKind::Identifier { name }, span))
            }
            TokenKind::This => {
                self.advance();
                Ok(self.add(AstNodeKind::ThisExpression, span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Reserved(word) => {
                let word = word.clone();
                Err(ParseError {
                    message: format!("'{word}' is not allowed in template expressions"),
                    span,
                })
            }
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current.span;
        self.advance(); // [
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.consume(TokenKind::RBracket, "']' after array elements")?;
        Ok(self.add(AstNodeKind::ArrayExpression { elements }, start.merge(self.previous.span)))
    }

    fn parse_object_literal(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current.span;
        self.advance(); // {
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key_span = self.current.span;
            let (key, shorthand_ok): (Box<str>, bool) = match &self.current.kind {
                TokenKind::Identifier(name) => (name.clone(), true),
                TokenKind::String(s) => (s.clone(), false),
                TokenKind::Number(n) => (tessel_store::Value::Number(*n).to_display_string().into(), false),
                TokenKind::Boolean(_)
                | TokenKind::Null
                | TokenKind::Undefined
                | TokenKind::This
                | TokenKind::Typeof
                | TokenKind::Reserved(_) => (self.token_text(&self.current).into(), false),
                _ => return Err(self.error("expected property key")),
            };
            self.advance();

            let value = if self.check(&TokenKind::Colon) {
                self.advance();
                self.parse_expression()?
            } else if shorthand_ok {
                self.add(AstNodeKind::Identifier { name: key.clone() }, key_span)
            } else {
                return Err(self.error("expected ':' after property key"));
            };
            properties.push((key, value));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.consume(TokenKind::RBrace, "'}' after object properties")?;
        Ok(self.add(AstNodeKind::ObjectExpression { properties }, start.merge(self.previous.span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_kind(src: &str) -> AstNodeKind {
        let ast = Parser::new(src).parse().unwrap();
        ast.get(ast.root().unwrap()).unwrap().kind.clone()
    }

    #[test]
    fn test_precedence() {
        let ast = Parser::new("1 + 2 * 3").parse().unwrap();
        let AstNodeKind::BinaryExpression { operator, right, .. } = &ast.get(ast.root().unwrap()).unwrap().kind
        else {
            panic!("expected binary expression");
        };
        assert_eq!(*operator, BinaryOp::Add);
        assert!(matches!(
            ast.get(*right).unwrap().kind,
            AstNodeKind::BinaryExpression { operator: BinaryOp::Mul, .. }
        ));
    }

    #[test]
    fn test_conditional_and_assignment() {
        assert!(matches!(root_kind("a ? b : c"), AstNodeKind::ConditionalExpression { .. }));
        assert!(matches!(root_kind("a.b = 1"), AstNodeKind::AssignmentExpression { .. }));
    }

    #[test]
    fn test_optional_call() {
        assert!(matches!(
            root_kind("user?.greet()"),
            AstNodeKind::CallExpression { optional: false, .. }
        ));
        assert!(matches!(
            root_kind("maybe?.()"),
            AstNodeKind::CallExpression { optional: true, .. }
        ));
    }

    #[test]
    fn test_object_literal_shorthand() {
        let AstNodeKind::ObjectExpression { properties } = root_kind("{ a, 'b': 2, c: 3, }") else {
            panic!("expected object");
        };
        let keys: Vec<&str> = properties.iter().map(|(k, _)| &**k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rejections() {
        assert!(Parser::new("new Date()").parse().is_err());
        assert!(Parser::new("1 = 2").parse().is_err());
        assert!(Parser::new("a?.b = 2").parse().is_err());
        assert!(Parser::new("(a").parse().is_err());
        assert!(Parser::new("a b").parse().is_err());
        assert!(Parser::new("").parse().is_err());
        assert!(Parser::new("x => x").parse().is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(Parser::new(&deep).parse().is_err());
    }
}
