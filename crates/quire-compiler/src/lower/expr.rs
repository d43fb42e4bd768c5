/// Runtime expression lowering
///
/// Classifies parser expressions into the five runtime forms (literal,
/// variable path, comparison, ternary, logical). Anything else is an
/// Expression error pointing at the offending span; runtime documents never
/// fall back to raw text.

use super::{Lowerer, attrs::literal_value};
use crate::error::{CompileError, Result};
use crate::ir::{Arg, CompareOp, LogicalOp, PathSegment, RuntimeExpr, Shape, VarPath};
use quire_parser::{BinaryOp, Expr, ExprKind, Span, UnaryOp};

impl Lowerer<'_> {
    pub(super) fn runtime_expr(&mut self, expr: &Expr) -> Result<RuntimeExpr> {
        if let Some(value) = literal_value(expr) {
            return Ok(RuntimeExpr::Literal(value));
        }
        match &expr.kind {
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. } => {
                self.var_path(expr).map(RuntimeExpr::Var)
            }
            ExprKind::Binary { op, left, right } => {
                let compare = match op {
                    BinaryOp::Eq | BinaryOp::StrictEq => Some(CompareOp::Eq),
                    BinaryOp::NotEq | BinaryOp::StrictNotEq => Some(CompareOp::NotEq),
                    _ => None,
                };
                if let Some(op) = compare {
                    return Ok(RuntimeExpr::Compare {
                        op,
                        left: Box::new(self.runtime_expr(left)?),
                        right: Box::new(self.runtime_expr(right)?),
                    });
                }
                let logical = match op {
                    BinaryOp::And => LogicalOp::And,
                    BinaryOp::Or => LogicalOp::Or,
                    other => {
                        return Err(self.unsupported(
                            expr.span,
                            format!(
                                "operator '{}'; use ==, !=, &&, || or a ternary",
                                other.as_str()
                            ),
                        ));
                    }
                };
                Ok(RuntimeExpr::Logical {
                    op: logical,
                    left: Box::new(self.runtime_expr(left)?),
                    right: Box::new(self.runtime_expr(right)?),
                })
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => Ok(RuntimeExpr::Ternary {
                condition: Box::new(self.runtime_expr(test)?),
                then: Box::new(self.runtime_expr(consequent)?),
                otherwise: Box::new(self.runtime_expr(alternate)?),
            }),
            ExprKind::Unary { op: UnaryOp::Not, .. } => Err(self.unsupported(
                expr.span,
                "negation '!'; compare explicitly, e.g. `x == false`",
            )),
            ExprKind::Unary { op: UnaryOp::Neg, .. } => {
                Err(self.unsupported(expr.span, "negation of a non-literal value"))
            }
            ExprKind::Array(_) | ExprKind::Object(_) => Err(self.unsupported(
                expr.span,
                "array or object containing variable references",
            )),
            ExprKind::String(_) | ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Null => {
                Err(self.unsupported(expr.span, "invalid literal"))
            }
        }
    }

    /// Argument value: literal when possible, runtime expression otherwise
    pub(super) fn runtime_arg(&mut self, expr: &Expr) -> Result<Arg> {
        match literal_value(expr) {
            Some(value) => Ok(Arg::Literal(value)),
            None => self.runtime_expr(expr).map(Arg::Expr),
        }
    }

    fn unsupported(&self, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::expression(self.locate(span), message)
    }

    /// `ctx.items[0].name` -> variable `ctx` with path `.items[0].name`
    fn var_path(&mut self, expr: &Expr) -> Result<VarPath> {
        let mut segments = Vec::new();
        let mut current = expr;
        let root = loop {
            match &current.kind {
                ExprKind::Identifier(name) => break name,
                ExprKind::Member {
                    object, property, ..
                } => {
                    segments.push(PathSegment::Field(property.clone()));
                    current = object;
                }
                ExprKind::Index { object, index } => {
                    let segment = match literal_value(index) {
                        Some(serde_json::Value::String(key)) => PathSegment::Field(key),
                        Some(serde_json::Value::Number(n)) if n.is_i64() => {
                            PathSegment::Index(n.as_i64().unwrap_or_default())
                        }
                        _ => {
                            return Err(self.unsupported(
                                index.span,
                                "index must be a string or integer literal",
                            ));
                        }
                    };
                    segments.push(segment);
                    current = object;
                }
                _ => {
                    return Err(self.unsupported(
                        current.span,
                        "property access on something other than a runtime variable",
                    ));
                }
            }
        };
        segments.reverse();

        let Some(info) = self.variable(root) else {
            return Err(self.unsupported(
                current.span,
                format!("unknown variable '{}'; declare it with <Variable name=\"{}\" />", root, root),
            ));
        };
        let var = info.var.clone();
        let shape = info.shape.clone();
        self.check_path(expr.span, &var.name, &shape, &segments);
        Ok(VarPath {
            var,
            path: segments,
        })
    }

    /// Warn about paths the declared shape does not have. Output is unaffected.
    fn check_path(&mut self, span: Span, var: &str, shape: &Shape, segments: &[PathSegment]) {
        let mut current = shape.clone();
        let mut walked = var.to_string();
        for segment in segments {
            let next = match segment {
                PathSegment::Field(name) => {
                    let next = current.field(name);
                    if next.is_none() {
                        self.warn(
                            span,
                            format!("'{}' has no field '{}' (declared as {})", walked, name, current),
                        );
                    }
                    walked.push('.');
                    walked.push_str(name);
                    next
                }
                PathSegment::Index(i) => {
                    let next = current.element();
                    if next.is_none() {
                        self.warn(
                            span,
                            format!("'{}' is not an array (declared as {})", walked, current),
                        );
                    }
                    walked.push_str(&format!("[{}]", i));
                    next
                }
            };
            match next {
                Some(shape) => current = shape,
                None => return,
            }
        }
    }
}
