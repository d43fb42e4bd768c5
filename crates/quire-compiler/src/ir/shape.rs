/// Declared value shapes
///
/// Shapes describe runtime variables, function parameters and agent inputs.
/// They are written as expressions: type-name strings (`"string"`,
/// `"number[]"`, `"'a' | 'b'"`), one-element arrays (`["string"]`) and object
/// literals (`{ status: "string" }`). Shapes only feed diagnostics and
/// documentation; they never change emitted behavior.

use quire_parser::{Expr, ExprKind};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Shape {
    #[default]
    Any,
    String,
    Number,
    Bool,
    Null,
    Array(Box<Shape>),
    Object(BTreeMap<String, Shape>),
    Union(Vec<Shape>),
    /// String literal type: `'PASSED'`
    Literal(String),
}

impl Shape {
    /// Build a shape from its expression form
    pub fn from_expr(expr: &Expr) -> Result<Shape, String> {
        match &expr.kind {
            ExprKind::String(s) => Shape::parse(s),
            ExprKind::Identifier(name) => Shape::parse(name),
            ExprKind::Null => Ok(Shape::Null),
            ExprKind::Array(items) => match items.as_slice() {
                [] => Ok(Shape::Array(Box::new(Shape::Any))),
                [item] => Ok(Shape::Array(Box::new(Shape::from_expr(item)?))),
                _ => Err("array shapes take exactly one element shape".to_string()),
            },
            ExprKind::Object(props) => {
                let mut fields = BTreeMap::new();
                for prop in props {
                    fields.insert(prop.key.clone(), Shape::from_expr(&prop.value)?);
                }
                Ok(Shape::Object(fields))
            }
            _ => Err("expected a type name, [shape] or { field: shape }".to_string()),
        }
    }

    /// Parse a type-name string: `string`, `number[]`, `'a' | 'b'`
    pub fn parse(text: &str) -> Result<Shape, String> {
        let variants: Vec<&str> = text.split('|').map(str::trim).collect();
        if variants.len() > 1 {
            let shapes = variants
                .into_iter()
                .map(Shape::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Shape::Union(shapes));
        }
        let text = text.trim();
        if let Some(elem) = text.strip_suffix("[]") {
            return Ok(Shape::Array(Box::new(Shape::parse(elem)?)));
        }
        if text.len() >= 2
            && ((text.starts_with('\'') && text.ends_with('\''))
                || (text.starts_with('"') && text.ends_with('"')))
        {
            return Ok(Shape::Literal(text[1..text.len() - 1].to_string()));
        }
        match text {
            "string" => Ok(Shape::String),
            "number" | "int" | "float" => Ok(Shape::Number),
            "bool" | "boolean" => Ok(Shape::Bool),
            "null" => Ok(Shape::Null),
            "any" | "unknown" | "object" | "" => Ok(Shape::Any),
            other => Err(format!("unknown type '{}'", other)),
        }
    }

    /// Shape of a named field, `None` when the field is known not to exist.
    /// `Any` and unions are permissive.
    pub fn field(&self, name: &str) -> Option<Shape> {
        match self {
            Shape::Any => Some(Shape::Any),
            Shape::Object(fields) => fields.get(name).cloned(),
            Shape::Union(variants) => {
                let found: Vec<Shape> = variants.iter().filter_map(|v| v.field(name)).collect();
                match found.len() {
                    0 => None,
                    1 => found.into_iter().next(),
                    _ => Some(Shape::Union(found)),
                }
            }
            Shape::Array(_) if name == "length" => Some(Shape::Number),
            _ => None,
        }
    }

    /// Element shape for an index access
    pub fn element(&self) -> Option<Shape> {
        match self {
            Shape::Any => Some(Shape::Any),
            Shape::Array(elem) => Some((**elem).clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => write!(f, "any"),
            Shape::String => write!(f, "string"),
            Shape::Number => write!(f, "number"),
            Shape::Bool => write!(f, "boolean"),
            Shape::Null => write!(f, "null"),
            Shape::Array(elem) => match **elem {
                Shape::Union(_) => write!(f, "({})[]", elem),
                _ => write!(f, "{}[]", elem),
            },
            Shape::Object(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, shape)?;
                }
                write!(f, " }}")
            }
            Shape::Union(variants) => {
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Shape::Literal(s) => write!(f, "'{}'", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_parser::parse_expr;

    #[test]
    fn test_object_shape_from_expr() {
        let expr = parse_expr(r#"{ status: "'PASSED' | 'FAILED'", files: ["string"], count: "number" }"#).unwrap();
        let shape = Shape::from_expr(&expr).unwrap();
        assert_eq!(
            shape.to_string(),
            "{ count: number, files: string[], status: 'PASSED' | 'FAILED' }"
        );
        assert_eq!(shape.field("files"), Some(Shape::Array(Box::new(Shape::String))));
        assert_eq!(shape.field("missing"), None);
    }

    #[test]
    fn test_any_is_permissive() {
        assert_eq!(Shape::Any.field("x"), Some(Shape::Any));
        assert_eq!(Shape::Any.element(), Some(Shape::Any));
    }

    #[test]
    fn test_unknown_type_name() {
        assert!(Shape::parse("strnig").is_err());
    }
}
