//! Expression Lexer

use std::iter::Peekable;
use std::str::Chars;

use crate::token::{keyword_from_str, Span, Token, TokenKind};

/// Tokenizer for template expressions
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<Chars<'src>>,
    pos: u32,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Character after the next one
    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.pos as usize..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;

        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match c {
            c if is_ident_start(c) => self.scan_identifier(start),
            '0'..='9' => self.scan_number(start),
            '"' | '\'' | '`' => self.scan_string(c),

            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,

            '.' => {
                if matches!(self.peek(), Some('0'..='9')) {
                    self.scan_number(start)
                } else {
                    TokenKind::Dot
                }
            }

            '?' => match self.peek() {
                Some('?') => {
                    self.advance();
                    TokenKind::QuestionQuestion
                }
                // `a?.5:1` is a conditional, not optional chaining
                Some('.') if !matches!(self.peek_next(), Some('0'..='9')) => {
                    self.advance();
                    TokenKind::QuestionDot
                }
                _ => TokenKind::Question,
            },

            '<' => self.with_eq(TokenKind::LessThan, TokenKind::LessThanEq),
            '>' => self.with_eq(TokenKind::GreaterThan, TokenKind::GreaterThanEq),

            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.with_eq(TokenKind::EqEq, TokenKind::EqEqEq)
                } else if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Error("arrow functions are not supported".into())
                } else {
                    TokenKind::Eq
                }
            }

            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.with_eq(TokenKind::NotEq, TokenKind::NotEqEq)
                } else {
                    TokenKind::Bang
                }
            }

            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AmpersandAmpersand
                } else {
                    TokenKind::Error("bitwise operators are not supported".into())
                }
            }

            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::PipePipe
                } else {
                    TokenKind::Error("unexpected '|' (filters are not expressions)".into())
                }
            }

            _ => TokenKind::Error(format!("unexpected character: {c}").into()),
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    /// `plain` or, if followed by `=`, `with_eq`
    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            with_eq
        } else {
            plain
        }
    }

    fn scan_identifier(&mut self, start: u32) -> TokenKind {
        while self.peek().is_some_and(is_ident_part) {
            self.advance();
        }
        let text = &self.source[start as usize..self.pos as usize];
        keyword_from_str(text).unwrap_or_else(|| TokenKind::Identifier(text.into()))
    }

    fn scan_number(&mut self, start: u32) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9' | '_')) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9' | '_')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        let text = &self.source[start as usize..self.pos as usize];
        match text.replace('_', "").parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number: {text}").into()),
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();
        while let Some(c) = self.advance() {
            if c == quote {
                return TokenKind::String(value.into());
            }
            if c == '\\' {
                match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('0') => value.push('\0'),
                    Some(other) => value.push(other),
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        TokenKind::Error("unterminated string".into())
    }
}
