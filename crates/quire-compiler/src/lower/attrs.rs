/// Attribute access with structural errors that name the element

use super::Lowerer;
use crate::error::Result;
use crate::ir::Shape;
use quire_parser::{AttrValue, Attribute, Element, EmbeddedExpr, Expr, ExprKind, UnaryOp};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Compile-time value of a literal expression, `None` if it references anything
pub fn literal_value(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::String(s) => Some(Value::String(s.clone())),
        ExprKind::Number(raw) => number_value(raw, false),
        ExprKind::Bool(b) => Some(Value::Bool(*b)),
        ExprKind::Null => Some(Value::Null),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match &operand.kind {
            ExprKind::Number(raw) => number_value(raw, true),
            _ => None,
        },
        ExprKind::Array(items) => items
            .iter()
            .map(literal_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        ExprKind::Object(props) => {
            let mut map = serde_json::Map::new();
            for prop in props {
                map.insert(prop.key.clone(), literal_value(&prop.value)?);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn number_value(raw: &str, negative: bool) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::Number(Number::from(if negative { -i } else { i })));
    }
    let f = raw.parse::<f64>().ok()?;
    Number::from_f64(if negative { -f } else { f }).map(Value::Number)
}

/// Display form of a scalar literal for use as an attribute string
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Lowerer<'_> {
    fn attr_error(&self, element: &Element, attr: &Attribute, expected: &str) -> crate::error::CompileError {
        self.structural(
            attr.span,
            format!(
                "attribute '{}' on <{}> must be {}",
                attr.name, element.name, expected
            ),
        )
    }

    pub(super) fn string_attr(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let Some(attr) = element.attr(name) else {
            return Ok(None);
        };
        match &attr.value {
            AttrValue::String(s) => Ok(Some(s.clone())),
            AttrValue::Expr(e) => literal_value(&e.expr)
                .as_ref()
                .and_then(scalar_string)
                .map(Some)
                .ok_or_else(|| self.attr_error(element, attr, "a string")),
            AttrValue::Flag => Err(self.attr_error(element, attr, "given a value")),
        }
    }

    pub(super) fn required_string(&self, element: &Element, name: &str) -> Result<String> {
        match self.string_attr(element, name)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(self.structural(
                element.attr(name).map(|a| a.span).unwrap_or(element.span),
                format!("attribute '{}' on <{}> must not be empty", name, element.name),
            )),
            None => Err(self.structural(
                element.name_span,
                format!("missing required attribute '{}' on <{}>", name, element.name),
            )),
        }
    }

    pub(super) fn bool_attr(&self, element: &Element, name: &str) -> Result<bool> {
        let Some(attr) = element.attr(name) else {
            return Ok(false);
        };
        match &attr.value {
            AttrValue::Flag => Ok(true),
            AttrValue::String(s) if s == "true" => Ok(true),
            AttrValue::String(s) if s == "false" => Ok(false),
            AttrValue::Expr(EmbeddedExpr {
                expr:
                    Expr {
                        kind: ExprKind::Bool(b),
                        ..
                    },
                ..
            }) => Ok(*b),
            _ => Err(self.attr_error(element, attr, "true or false")),
        }
    }

    pub(super) fn u32_attr(&self, element: &Element, name: &str) -> Result<Option<u32>> {
        let Some(attr) = element.attr(name) else {
            return Ok(None);
        };
        let text = match &attr.value {
            AttrValue::String(s) => s.trim().to_string(),
            AttrValue::Expr(EmbeddedExpr {
                expr:
                    Expr {
                        kind: ExprKind::Number(raw),
                        ..
                    },
                ..
            }) => raw.clone(),
            _ => return Err(self.attr_error(element, attr, "a non-negative integer")),
        };
        text.parse::<u32>()
            .map(Some)
            .map_err(|_| self.attr_error(element, attr, "a non-negative integer"))
    }

    /// Any literal value; quoted strings and flags count as literals too
    pub(super) fn literal_attr(&self, element: &Element, name: &str) -> Result<Option<Value>> {
        let Some(attr) = element.attr(name) else {
            return Ok(None);
        };
        match &attr.value {
            AttrValue::String(s) => Ok(Some(Value::String(s.clone()))),
            AttrValue::Flag => Ok(Some(Value::Bool(true))),
            AttrValue::Expr(e) => literal_value(&e.expr)
                .map(Some)
                .ok_or_else(|| self.attr_error(element, attr, "a literal value")),
        }
    }

    /// `{...}` attribute; quoted strings are rejected
    pub(super) fn expr_attr<'e>(&self, element: &'e Element, name: &str) -> Result<Option<&'e EmbeddedExpr>> {
        let Some(attr) = element.attr(name) else {
            return Ok(None);
        };
        match &attr.value {
            AttrValue::Expr(e) => Ok(Some(e)),
            _ => Err(self.attr_error(element, attr, "an {expression}")),
        }
    }

    pub(super) fn required_expr<'e>(&self, element: &'e Element, name: &str) -> Result<&'e EmbeddedExpr> {
        self.expr_attr(element, name)?.ok_or_else(|| {
            self.structural(
                element.name_span,
                format!("missing required attribute '{}' on <{}>", name, element.name),
            )
        })
    }

    /// List of strings: `{["Read", "Grep"]}`, or a quoted string split on
    /// whitespace and commas
    pub(super) fn string_list_attr(&self, element: &Element, name: &str) -> Result<Vec<String>> {
        let Some(attr) = element.attr(name) else {
            return Ok(Vec::new());
        };
        match &attr.value {
            AttrValue::String(s) => Ok(s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()),
            AttrValue::Expr(e) => match literal_value(&e.expr) {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.attr_error(element, attr, "a list of strings")),
                Some(Value::String(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
                _ => Err(self.attr_error(element, attr, "a list of strings")),
            },
            AttrValue::Flag => Err(self.attr_error(element, attr, "a list of strings")),
        }
    }

    /// Object of string values: `{{ API_KEY: "x" }}`
    pub(super) fn string_map_attr(&self, element: &Element, name: &str) -> Result<BTreeMap<String, String>> {
        let Some(attr) = element.attr(name) else {
            return Ok(BTreeMap::new());
        };
        let AttrValue::Expr(e) = &attr.value else {
            return Err(self.attr_error(element, attr, "an object of strings"));
        };
        match literal_value(&e.expr) {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| scalar_string(&v).map(|v| (k, v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .ok_or_else(|| self.attr_error(element, attr, "an object of strings")),
            _ => Err(self.attr_error(element, attr, "an object of strings")),
        }
    }

    /// Declared shape; absent means `any`
    pub(super) fn shape_attr(&self, element: &Element, name: &str) -> Result<Shape> {
        let Some(attr) = element.attr(name) else {
            return Ok(Shape::Any);
        };
        let shape = match &attr.value {
            AttrValue::String(s) => Shape::parse(s),
            AttrValue::Expr(e) => Shape::from_expr(&e.expr),
            AttrValue::Flag => Err("a type is required".to_string()),
        };
        shape.map_err(|message| {
            self.structural(
                attr.span,
                format!("invalid type for '{}' on <{}>: {}", name, element.name, message),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_parser::parse_expr;
    use serde_json::json;

    #[test]
    fn test_literal_values() {
        let expr = parse_expr(r#"{ a: [1, -2.5, "x"], b: null, c: true }"#).unwrap();
        assert_eq!(
            literal_value(&expr),
            Some(json!({ "a": [1, -2.5, "x"], "b": null, "c": true }))
        );
    }

    #[test]
    fn test_reference_is_not_literal() {
        let expr = parse_expr("[1, ctx.count]").unwrap();
        assert_eq!(literal_value(&expr), None);
    }
}
