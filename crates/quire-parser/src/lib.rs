/// Quire parser
///
/// Parses `.quire` sources (a JSX-like element tree with JavaScript-like
/// attribute expressions) into an owned AST with byte spans.

pub mod adapter;
pub mod ast;
pub mod ast_dump;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod markup;
pub mod span;
pub mod token;

pub use ast::*;
pub use error::ParseError;
pub use expr::parse_expr;
pub use span::{LineIndex, Span};

/// Parse a Quire source file into its element tree
pub fn parse(input: &str) -> Result<SourceTree, ParseError> {
    markup::MarkupParser::new(input).parse_tree()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_self_closing_root() {
        let tree = parse(r#"<Agent name="a" description="d" />"#).unwrap();
        assert_eq!(tree.root.name, "Agent");
        assert_eq!(tree.root.attributes.len(), 2);
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(parse("   "), Err(ParseError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_parse_trailing_content_rejected() {
        assert!(parse("<a></a><b></b>").is_err());
    }

    #[test]
    fn test_leading_comment_allowed() {
        let tree = parse("<!-- header -->\n<Command name=\"c\"></Command>\n").unwrap();
        assert_eq!(tree.root.name, "Command");
    }
}
