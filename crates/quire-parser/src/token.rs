/// Expression tokens produced by the expression lexer

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    /// String literal with escapes decoded
    String(String),
    /// Number literal as written
    Number(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Question,
    /// `?.`
    QuestionDot,
    /// `??`
    Nullish,
    Dot,
    Bang,
    /// `==`
    EqEq,
    /// `===`
    EqEqEq,
    /// `!=`
    NotEq,
    /// `!==`
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    AndAnd,
    OrOr,

    Eof,
}

impl Token {
    /// Human-readable token description for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::String(_) => "string literal".to_string(),
            Token::Number(n) => format!("number '{}'", n),
            Token::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.punct()),
        }
    }

    fn punct(&self) -> &'static str {
        match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Question => "?",
            Token::QuestionDot => "?.",
            Token::Nullish => "??",
            Token::Dot => ".",
            Token::Bang => "!",
            Token::EqEq => "==",
            Token::EqEqEq => "===",
            Token::NotEq => "!=",
            Token::NotEqEq => "!==",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Identifier(_) | Token::String(_) | Token::Number(_) | Token::Eof => "",
        }
    }
}

/// A token together with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}
