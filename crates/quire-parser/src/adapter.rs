/// Adapter feeding expression tokens to the generated parser
///
/// Produces `(start, token, end)` triples. In braced mode the stream ends at
/// the `}` that closes the embedded expression; that brace is consumed but
/// not yielded, and its end offset is recorded.

use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::Token;

pub type Triple = (usize, Token, usize);

pub struct LexerAdapter<'input> {
    lexer: Lexer<'input>,
    braced: bool,
    depth: usize,
    closed_at: Option<usize>,
    done: bool,
}

impl<'input> LexerAdapter<'input> {
    /// Tokens up to the end of `input`
    pub fn standalone(input: &'input str) -> Self {
        Self::new(Lexer::new(input, 0), false)
    }

    /// Tokens from `start` up to the matching closing brace
    pub fn braced(input: &'input str, start: usize) -> Self {
        Self::new(Lexer::new(input, start), true)
    }

    fn new(lexer: Lexer<'input>, braced: bool) -> Self {
        Self {
            lexer,
            braced,
            depth: 0,
            closed_at: None,
            done: false,
        }
    }

    /// Offset just past the closing brace, once it has been reached
    pub fn closed_at(&self) -> Option<usize> {
        self.closed_at
    }

    /// Offset just past the last token scanned
    pub fn position(&self) -> usize {
        self.lexer.position()
    }
}

impl Iterator for LexerAdapter<'_> {
    type Item = Result<Triple, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let spanned = match self.lexer.next_token() {
            Ok(spanned) => spanned,
            Err(error) => {
                self.done = true;
                return Some(Err(error));
            }
        };
        match spanned.token {
            Token::Eof => {
                self.done = true;
                return None;
            }
            Token::LBrace if self.braced => self.depth += 1,
            Token::RBrace if self.braced => {
                if self.depth == 0 {
                    self.done = true;
                    self.closed_at = Some(spanned.span.end);
                    return None;
                }
                self.depth -= 1;
            }
            _ => {}
        }
        Some(Ok((spanned.span.start, spanned.token, spanned.span.end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braced_stops_at_matching_brace() {
        let src = "{ {a: 1} } tail";
        let mut adapter = LexerAdapter::braced(src, 1);
        let tokens: Vec<Token> = adapter.by_ref().map(|t| t.unwrap().1).collect();
        assert_eq!(tokens.len(), 5);
        assert_eq!(adapter.closed_at(), Some(10));
    }

    #[test]
    fn test_standalone_yields_closing_braces() {
        let tokens: Vec<Token> = LexerAdapter::standalone("{}").map(|t| t.unwrap().1).collect();
        assert_eq!(tokens, vec![Token::LBrace, Token::RBrace]);
    }
}
