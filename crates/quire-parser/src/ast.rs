/// Abstract Syntax Tree types for Quire sources
///
/// A source file is a single element tree. Elements carry attributes and
/// children; attribute values and `{...}` children may hold expressions.
/// Every node records the byte span it was parsed from.

use crate::span::Span;

/// A parsed source file: exactly one root element
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTree {
    pub root: Element,
}

/// An element: `<Name attr="v">children</Name>` or `<Name />`
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Span of the whole element, open tag through close tag
    pub span: Span,
    /// Span of the tag name in the opening tag
    pub name_span: Span,
}

impl Element {
    /// Look up an attribute by name
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Child elements only, skipping text and expressions
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }
}

/// A child node of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    /// `{expr}` child
    Expr(EmbeddedExpr),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Element(e) => e.span,
            Node::Text(t) => t.span,
            Node::Expr(e) => e.span,
        }
    }

    /// True for text consisting only of whitespace
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.value.trim().is_empty())
    }
}

/// Text content with entities already decoded (raw for raw-text elements)
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub value: String,
    pub span: Span,
}

/// An expression embedded in markup, with its original source text
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedExpr {
    pub expr: Expr,
    pub source: String,
    /// Span including the surrounding braces
    pub span: Span,
}

/// `name=value` on an element
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
}

/// Attribute value forms
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `name="text"` or `name='text'`
    String(String),
    /// `name={expr}`
    Expr(EmbeddedExpr),
    /// Bare `name` (boolean true)
    Flag,
}

/// Expression with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression forms accepted inside `{...}`
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Identifier reference: `ctx`
    Identifier(String),
    /// String literal (escapes decoded)
    String(String),
    /// Number literal, kept as written: `42`, `3.5`
    Number(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// `[a, b]`
    Array(Vec<Expr>),
    /// `{ key: value }`
    Object(Vec<Property>),
    /// `a.b` or `a?.b`
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    /// `a[b]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// `!a`, `-a`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `a op b`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

/// Object literal entry
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub key_span: Span,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `===`
    StrictEq,
    /// `!=`
    NotEq,
    /// `!==`
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    /// `??`
    Nullish,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::StrictEq => "===",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
        }
    }
}
