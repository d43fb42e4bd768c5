/// Expression parser
///
/// The grammar lives in `expr.lalrpop` and covers the JavaScript-like
/// expressions that appear in attribute values and `{...}` children.
/// Function calls, assignment and arrow functions are outside the grammar.

use crate::adapter::LexerAdapter;
use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::span::Span;
use crate::token::Token;

// Include generated parser code from lalrpop
#[allow(clippy::all)]
mod grammar {
    include!(concat!(env!("OUT_DIR"), "/expr.rs"));
}

type GeneratedError = lalrpop_util::ParseError<usize, Token, ParseError>;

pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

pub(crate) fn unary(op: UnaryOp, start: usize, operand: Expr) -> Expr {
    let span = Span::new(start, operand.span.end);
    Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    )
}

pub(crate) fn member(object: Expr, property: String, optional: bool, end: usize) -> Expr {
    let span = Span::new(object.span.start, end);
    Expr::new(
        ExprKind::Member {
            object: Box::new(object),
            property,
            optional,
        },
        span,
    )
}

pub(crate) fn identifier(name: String, span: Span) -> Expr {
    let kind = match name.as_str() {
        "true" => ExprKind::Bool(true),
        "false" => ExprKind::Bool(false),
        "null" | "undefined" => ExprKind::Null,
        _ => ExprKind::Identifier(name),
    };
    Expr::new(kind, span)
}

fn describe_expected(expected: &[String], fallback: &str) -> String {
    if expected.is_empty() {
        return fallback.to_string();
    }
    let names: Vec<String> = expected
        .iter()
        .map(|name| match name.trim_matches('"') {
            "ident" => "identifier".to_string(),
            "string" => "string literal".to_string(),
            "number" => "number".to_string(),
            punct => format!("'{}'", punct),
        })
        .collect();
    names.join(", ")
}

fn convert_error(error: GeneratedError, end_expected: &str) -> ParseError {
    match error {
        lalrpop_util::ParseError::User { error } => error,
        lalrpop_util::ParseError::InvalidToken { location } => {
            ParseError::unexpected("invalid token", "expression", Span::new(location, location))
        }
        lalrpop_util::ParseError::UnrecognizedEof { location, expected } => {
            ParseError::eof(describe_expected(&expected, end_expected), location)
        }
        lalrpop_util::ParseError::UnrecognizedToken {
            token: (start, token, end),
            expected,
        } => {
            let expected = if token == Token::LParen {
                "operator (function calls are not supported in expressions)".to_string()
            } else {
                describe_expected(&expected, "expression")
            };
            ParseError::unexpected(token.describe(), expected, Span::new(start, end))
        }
        lalrpop_util::ParseError::ExtraToken {
            token: (start, token, end),
        } => ParseError::unexpected(token.describe(), end_expected, Span::new(start, end)),
    }
}

/// Parse a complete standalone expression
pub fn parse_expr(input: &str) -> Result<Expr> {
    grammar::ExpressionParser::new()
        .parse(LexerAdapter::standalone(input))
        .map_err(|e| convert_error(e, "end of expression"))
}

/// Parse an expression that starts at `start` and is closed by `}`.
///
/// Returns the expression and the byte offset just past the closing brace.
pub fn parse_braced(input: &str, start: usize) -> Result<(Expr, usize)> {
    let mut tokens = LexerAdapter::braced(input, start);
    let expr = grammar::ExpressionParser::new()
        .parse(&mut tokens)
        .map_err(|e| convert_error(e, "'}' closing the expression"))?;
    match tokens.closed_at() {
        Some(end) => Ok((expr, end)),
        None => Err(ParseError::eof("'}' closing the expression", tokens.position())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_chain() {
        let expr = parse_expr("ctx.result.status").unwrap();
        match expr.kind {
            ExprKind::Member { object, property, .. } => {
                assert_eq!(property, "status");
                assert!(matches!(object.kind, ExprKind::Member { .. }));
            }
            other => panic!("Expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_and_over_or() {
        let expr = parse_expr("a || b && c").unwrap();
        match expr.kind {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Or);
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_is_left_associative() {
        let expr = parse_expr("a - b - c").unwrap();
        let ExprKind::Binary { left, .. } = expr.kind else {
            panic!("Expected binary");
        };
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn test_ternary_with_comparison() {
        let expr = parse_expr("ctx.ok === true ? 'yes' : 'no'").unwrap();
        match expr.kind {
            ExprKind::Conditional { test, consequent, alternate } => {
                assert!(matches!(test.kind, ExprKind::Binary { op: BinaryOp::StrictEq, .. }));
                assert_eq!(consequent.kind, ExprKind::String("yes".into()));
                assert_eq!(alternate.kind, ExprKind::String("no".into()));
            }
            other => panic!("Expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_object_literal_with_shorthand() {
        let expr = parse_expr("{ path: ctx.path, mode: 'fast', ctx }").unwrap();
        let ExprKind::Object(props) = expr.kind else {
            panic!("Expected object");
        };
        assert_eq!(props.len(), 3);
        assert_eq!(props[2].key, "ctx");
        assert_eq!(props[2].value.kind, ExprKind::Identifier("ctx".into()));
    }

    #[test]
    fn test_index_after_number() {
        let expr = parse_expr("items[0].name").unwrap();
        assert!(matches!(expr.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn test_unary_not_span() {
        let expr = parse_expr("!ctx.ok").unwrap();
        assert!(matches!(expr.kind, ExprKind::Unary { op: UnaryOp::Not, .. }));
        assert_eq!(expr.span, Span::new(0, 7));
    }

    #[test]
    fn test_call_is_rejected() {
        let err = parse_expr("run(x)").unwrap_err();
        assert!(err.to_string().contains("function calls are not supported"));
    }

    #[test]
    fn test_braced_returns_offset() {
        let src = "{a.b} rest";
        let (expr, end) = parse_braced(src, 1).unwrap();
        assert!(matches!(expr.kind, ExprKind::Member { .. }));
        assert_eq!(&src[end..], " rest");
    }

    #[test]
    fn test_braced_object_literal() {
        let src = "{{ a: 1 }}!";
        let (expr, end) = parse_braced(src, 1).unwrap();
        assert!(matches!(expr.kind, ExprKind::Object(_)));
        assert_eq!(&src[end..], "!");
    }

    #[test]
    fn test_braced_unclosed() {
        assert!(matches!(
            parse_braced("{a.b", 1),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_spans_cover_source() {
        let src = "x == 'y'";
        let expr = parse_expr(src).unwrap();
        assert_eq!(expr.span, Span::new(0, src.len()));
    }
}
