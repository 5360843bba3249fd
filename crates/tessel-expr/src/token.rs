//! Token Types
//!
//! Tokens of the template expression language.

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Token with kind and span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(Box<str>),
    Boolean(bool),
    Null,
    Undefined,

    Identifier(Box<str>),
    This,
    Typeof,
    /// Keyword with no meaning in expressions (`new`, `function`, ...)
    Reserved(Box<str>),

    // Punctuators
    LBrace,           // {
    RBrace,           // }
    LParen,           // (
    RParen,           // )
    LBracket,         // [
    RBracket,         // ]
    Dot,              // .
    Comma,            // ,
    Colon,            // :
    Question,         // ?
    QuestionDot,      // ?.
    QuestionQuestion, // ??

    // Operators
    Plus,               // +
    Minus,              // -
    Star,               // *
    Slash,              // /
    Percent,            // %
    LessThan,           // <
    LessThanEq,         // <=
    GreaterThan,        // >
    GreaterThanEq,      // >=
    EqEq,               // ==
    NotEq,              // !=
    EqEqEq,             // ===
    NotEqEq,            // !==
    AmpersandAmpersand, // &&
    PipePipe,           // ||
    Bang,               // !
    Eq,                 // =

    Eof,
    Error(Box<str>),
}

/// Keywords lookup table
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "true" => Some(TokenKind::Boolean(true)),
        "false" => Some(TokenKind::Boolean(false)),
        "null" => Some(TokenKind::Null),
        "undefined" => Some(TokenKind::Undefined),
        "this" => Some(TokenKind::This),
        "typeof" => Some(TokenKind::Typeof),
        "new" | "function" | "class" | "delete" | "void" | "var" | "let" | "const" | "return"
        | "import" | "await" | "yield" | "async" | "with" | "in" | "instanceof" => {
            Some(TokenKind::Reserved(s.into()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let merged = Span::new(0, 5).merge(Span::new(3, 10));
        assert_eq!((merged.start, merged.end), (0, 10));
    }

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword_from_str("true"), Some(TokenKind::Boolean(true)));
        assert_eq!(keyword_from_str("new"), Some(TokenKind::Reserved("new".into())));
        assert_eq!(keyword_from_str("items"), None);
    }
}
