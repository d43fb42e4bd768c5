/// Expression lexer
///
/// Scans tokens lazily from a byte offset into the full source so that the
/// markup parser can hand over at `{` and resume after the closing `}`.
/// `LexerAdapter` turns this stream into input for the generated parser.

use crate::error::{ParseError, Result};
use crate::span::Span;
use crate::token::{Spanned, Token};

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str, start: usize) -> Self {
        Self { input, pos: start }
    }

    /// Current byte offset (just past the last token produced)
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    let start = self.pos;
                    match self.input[self.pos + 2..].find("*/") {
                        Some(end) => self.pos = self.pos + 2 + end + 2,
                        None => {
                            return Err(ParseError::unterminated(
                                "comment",
                                Span::new(start, self.input.len()),
                            ));
                        }
                    }
                }
                Some('/') if self.peek_char_at(1) == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(ch) = self.bump() else {
            return Ok(Spanned {
                token: Token::Eof,
                span: Span::new(start, start),
            });
        };

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '.' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                return self.lex_number(start);
            }
            '.' => Token::Dot,
            '?' => match self.peek_char() {
                Some('.') if !self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    Token::QuestionDot
                }
                Some('?') => {
                    self.bump();
                    Token::Nullish
                }
                _ => Token::Question,
            },
            '!' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    if self.peek_char() == Some('=') {
                        self.bump();
                        Token::NotEqEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    if self.peek_char() == Some('=') {
                        self.bump();
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                } else {
                    return Err(ParseError::unexpected(
                        "'='",
                        "expression (assignment is not supported)",
                        Span::new(start, self.pos),
                    ));
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.peek_char() == Some('&') => {
                self.bump();
                Token::AndAnd
            }
            '|' if self.peek_char() == Some('|') => {
                self.bump();
                Token::OrOr
            }
            '"' | '\'' => return self.lex_string(start, ch),
            c if c.is_ascii_digit() => return self.lex_number(start),
            c if is_ident_start(c) => {
                while self.peek_char().is_some_and(is_ident_continue) {
                    self.bump();
                }
                Token::Identifier(self.input[start..self.pos].to_string())
            }
            other => {
                return Err(ParseError::unexpected(
                    format!("character {:?}", other),
                    "expression",
                    Span::new(start, self.pos),
                ));
            }
        };

        Ok(Spanned {
            token,
            span: Span::new(start, self.pos),
        })
    }

    fn lex_number(&mut self, start: usize) -> Result<Spanned> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_digit() || c == '_' => {
                    self.bump();
                }
                Some('.') if self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                }
                _ => break,
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.bump();
            }
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = self.input[start..self.pos].replace('_', "");
        let span = Span::new(start, self.pos);
        if text.parse::<f64>().is_err() {
            return Err(ParseError::InvalidNumber { text, span });
        }
        Ok(Spanned {
            token: Token::Number(text),
            span,
        })
    }

    fn lex_string(&mut self, start: usize, quote: char) -> Result<Spanned> {
        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(ParseError::unterminated(
                    "string literal",
                    Span::new(start, self.pos),
                ));
            };
            match ch {
                c if c == quote => break,
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(ParseError::unterminated(
                            "string literal",
                            Span::new(start, self.pos),
                        ));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        other => value.push(other),
                    }
                }
                '\n' => {
                    return Err(ParseError::unterminated(
                        "string literal",
                        Span::new(start, self.pos),
                    ));
                }
                c => value.push(c),
            }
        }
        Ok(Spanned {
            token: Token::String(value),
            span: Span::new(start, self.pos),
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src, 0);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            if tok.token == Token::Eof {
                break;
            }
            out.push(tok.token);
        }
        out
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("a === 'x' != b"),
            vec![
                Token::Identifier("a".into()),
                Token::EqEqEq,
                Token::String("x".into()),
                Token::NotEq,
                Token::Identifier("b".into()),
            ]
        );
    }

    #[test]
    fn test_optional_chaining_vs_ternary() {
        assert_eq!(
            tokens("a?.b ? .5 : c"),
            vec![
                Token::Identifier("a".into()),
                Token::QuestionDot,
                Token::Identifier("b".into()),
                Token::Question,
                Token::Number(".5".into()),
                Token::Colon,
                Token::Identifier("c".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(tokens(r#""a\"b\n""#), vec![Token::String("a\"b\n".into())]);
    }

    #[test]
    fn test_block_comment_skipped() {
        assert_eq!(tokens("/* note */ x"), vec![Token::Identifier("x".into())]);
    }

    #[test]
    fn test_assignment_rejected() {
        let mut lexer = Lexer::new("a = b", 0);
        lexer.next_token().unwrap();
        assert!(lexer.next_token().is_err());
    }
}
