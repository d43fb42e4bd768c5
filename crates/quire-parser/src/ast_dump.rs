/// AST dumping utilities for testing and debugging
///
/// Provides human-readable tree representations of parsed sources.

use crate::ast::*;
use std::fmt::Write as FmtWrite;

/// Dump a source tree as a pretty-printed tree
pub fn dump_tree(tree: &SourceTree) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_element(&mut out, &tree.root, 0);
    out
}

fn write_element(out: &mut String, element: &Element, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    writeln!(out, "{}Element <{}>", prefix, element.name)?;
    for attr in &element.attributes {
        match &attr.value {
            AttrValue::String(s) => writeln!(out, "{}  @{} = {:?}", prefix, attr.name, s)?,
            AttrValue::Expr(e) => writeln!(out, "{}  @{} = {{{}}}", prefix, attr.name, dump_expr(&e.expr))?,
            AttrValue::Flag => writeln!(out, "{}  @{}", prefix, attr.name)?,
        }
    }
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e, indent + 1)?,
            Node::Text(t) => {
                if !t.value.trim().is_empty() {
                    writeln!(out, "{}  Text {:?}", prefix, t.value)?;
                }
            }
            Node::Expr(e) => writeln!(out, "{}  Expr {{{}}}", prefix, dump_expr(&e.expr))?,
        }
    }
    Ok(())
}

/// Render an expression back into compact source-like form
pub fn dump_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::String(s) => format!("{:?}", s),
        ExprKind::Number(n) => n.clone(),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Null => "null".to_string(),
        ExprKind::Array(items) => {
            let items: Vec<String> = items.iter().map(dump_expr).collect();
            format!("[{}]", items.join(", "))
        }
        ExprKind::Object(props) => {
            let props: Vec<String> = props
                .iter()
                .map(|p| format!("{}: {}", p.key, dump_expr(&p.value)))
                .collect();
            format!("{{ {} }}", props.join(", "))
        }
        ExprKind::Member { object, property, optional } => {
            let dot = if *optional { "?." } else { "." };
            format!("{}{}{}", dump_expr(object), dot, property)
        }
        ExprKind::Index { object, index } => format!("{}[{}]", dump_expr(object), dump_expr(index)),
        ExprKind::Unary { op, operand } => {
            let op = match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            };
            format!("{}{}", op, dump_expr(operand))
        }
        ExprKind::Binary { op, left, right } => {
            format!("({} {} {})", dump_expr(left), op.as_str(), dump_expr(right))
        }
        ExprKind::Conditional { test, consequent, alternate } => format!(
            "({} ? {} : {})",
            dump_expr(test),
            dump_expr(consequent),
            dump_expr(alternate)
        ),
    }
}
