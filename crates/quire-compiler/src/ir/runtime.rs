/// Runtime blocks and expressions
///
/// Runtime expressions are a closed recursive enum. Both renderings (the
/// human-readable description and the jq filter) match it exhaustively, so a
/// new expression form cannot be added without updating each consumer.

use crate::ir::block::Block;
use crate::ir::shape::Shape;
use serde_json::Value;

/// Reference to a declared runtime variable and its shell name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarRef {
    pub name: String,
    pub shell: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(i64),
}

/// `ctx.items[0].name`: a variable plus a dot-path into it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
    pub var: VarRef,
    pub path: Vec<PathSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeExpr {
    Literal(Value),
    Var(VarPath),
    Compare {
        op: CompareOp,
        left: Box<RuntimeExpr>,
        right: Box<RuntimeExpr>,
    },
    Ternary {
        condition: Box<RuntimeExpr>,
        then: Box<RuntimeExpr>,
        otherwise: Box<RuntimeExpr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<RuntimeExpr>,
        right: Box<RuntimeExpr>,
    },
}

impl RuntimeExpr {
    /// Human-readable rendering: `ctx.status equals 'PASSED'`
    pub fn describe(&self) -> String {
        match self {
            RuntimeExpr::Literal(value) => describe_literal(value),
            RuntimeExpr::Var(path) => describe_path(path),
            RuntimeExpr::Compare { op, left, right } => {
                let verb = match op {
                    CompareOp::Eq => "equals",
                    CompareOp::NotEq => "does not equal",
                };
                format!("{} {} {}", left.describe_operand(), verb, right.describe_operand())
            }
            RuntimeExpr::Ternary {
                condition,
                then,
                otherwise,
            } => format!(
                "{} if {}, otherwise {}",
                then.describe_operand(),
                condition.describe_operand(),
                otherwise.describe_operand()
            ),
            RuntimeExpr::Logical { op, left, right } => {
                let word = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                format!("{} {} {}", left.describe_operand(), word, right.describe_operand())
            }
        }
    }

    pub(crate) fn describe_operand(&self) -> String {
        match self {
            RuntimeExpr::Ternary { .. } | RuntimeExpr::Logical { .. } => {
                format!("({})", self.describe())
            }
            _ => self.describe(),
        }
    }

    /// jq filter rendering: `$CTX.status == "PASSED"`
    pub fn to_filter(&self) -> String {
        match self {
            RuntimeExpr::Literal(value) => value.to_string(),
            RuntimeExpr::Var(path) => filter_path(path),
            RuntimeExpr::Compare { op, left, right } => {
                let sym = match op {
                    CompareOp::Eq => "==",
                    CompareOp::NotEq => "!=",
                };
                format!("{} {} {}", left.filter_operand(), sym, right.filter_operand())
            }
            RuntimeExpr::Ternary {
                condition,
                then,
                otherwise,
            } => format!(
                "if {} then {} else {} end",
                condition.to_filter(),
                then.to_filter(),
                otherwise.to_filter()
            ),
            RuntimeExpr::Logical { op, left, right } => {
                let word = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                format!("({}) {} ({})", left.to_filter(), word, right.to_filter())
            }
        }
    }

    fn filter_operand(&self) -> String {
        match self {
            RuntimeExpr::Compare { .. } => format!("({})", self.to_filter()),
            _ => self.to_filter(),
        }
    }

    /// Variables referenced anywhere in the expression, sorted and unique
    pub fn variables(&self) -> Vec<VarRef> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, out: &mut Vec<VarRef>) {
        match self {
            RuntimeExpr::Literal(_) => {}
            RuntimeExpr::Var(path) => out.push(path.var.clone()),
            RuntimeExpr::Compare { left, right, .. } | RuntimeExpr::Logical { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            RuntimeExpr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_variables(out);
                then.collect_variables(out);
                otherwise.collect_variables(out);
            }
        }
    }
}

fn describe_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

fn describe_path(path: &VarPath) -> String {
    let mut out = path.var.name.clone();
    for segment in &path.path {
        match segment {
            PathSegment::Field(name) => {
                out.push('.');
                out.push_str(name);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

fn filter_path(path: &VarPath) -> String {
    let mut out = format!("${}", path.var.shell);
    for segment in &path.path {
        match segment {
            PathSegment::Field(name) if is_plain_key(name) => {
                out.push('.');
                out.push_str(name);
            }
            PathSegment::Field(name) => {
                out.push('.');
                out.push_str(&Value::String(name.clone()).to_string());
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

fn is_plain_key(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Argument value passed to a runtime function or agent input
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Literal(Value),
    Expr(RuntimeExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub var: VarRef,
    pub shape: Shape,
    pub initial: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub function: String,
    pub args: Vec<(String, Arg)>,
    pub output: Option<VarRef>,
}

/// An enclosing `If` condition on the way from a loop to its `Break`
#[derive(Debug, Clone, PartialEq)]
pub struct BranchCondition {
    pub condition: RuntimeExpr,
    /// The `Break` sits in the `Else` branch
    pub negated: bool,
}

/// How a loop terminates besides hitting its iteration cap
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// No `Break`: runs until the cap
    Never,
    /// Unconditional `Break` at the end of the body
    Always,
    /// `Break` nested in branches; every condition must hold, outermost first
    When(Vec<BranchCondition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopNode {
    pub max: u32,
    pub counter: Option<VarRef>,
    pub body: Vec<Block>,
    pub exit: LoopExit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskOption {
    pub label: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskUserNode {
    pub question: String,
    pub header: Option<String>,
    pub options: Vec<AskOption>,
    pub multi_select: bool,
    pub output: Option<VarRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpawnPrompt {
    Literal(String),
    /// Typed input map, rendered as one labelled block per field
    Inputs(Vec<(String, Arg)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnNode {
    pub agent: String,
    pub model: Option<String>,
    pub description: String,
    pub prompt: SpawnPrompt,
    pub output: Option<VarRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeBlock {
    Declare(VarDecl),
    Call(CallNode),
    Conditional {
        condition: RuntimeExpr,
        then_body: Vec<Block>,
        else_body: Option<Vec<Block>>,
    },
    Loop(LoopNode),
    Break { message: Option<String> },
    Return { status: String, message: Option<String> },
    AskUser(AskUserNode),
    SpawnAgent(SpawnNode),
}

/// An extracted runtime function, as discovered in one document
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub id: String,
    pub params: Shape,
    pub returns: Shape,
    pub body: String,
    /// Helper names the body depends on
    pub uses: Vec<String>,
    pub origin: crate::diagnostic::Location,
    /// Build group of the declaring document
    pub group: String,
}

impl FunctionDescriptor {
    /// Structural identity: everything except where it was found
    pub fn same_definition(&self, other: &FunctionDescriptor) -> bool {
        self.id == other.id
            && self.params == other.params
            && self.returns == other.returns
            && self.body.trim() == other.body.trim()
            && self.uses == other.uses
    }
}

/// Shared helper code, deduplicated by name and body
#[derive(Debug, Clone, PartialEq)]
pub struct HelperDescriptor {
    pub name: String,
    pub body: String,
    pub origin: crate::diagnostic::Location,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(path: &[&str]) -> RuntimeExpr {
        RuntimeExpr::Var(VarPath {
            var: VarRef {
                name: "ctx".into(),
                shell: "CTX".into(),
            },
            path: path.iter().map(|p| PathSegment::Field(p.to_string())).collect(),
        })
    }

    #[test]
    fn test_compare_description_and_filter() {
        let expr = RuntimeExpr::Compare {
            op: CompareOp::Eq,
            left: Box::new(ctx(&["status"])),
            right: Box::new(RuntimeExpr::Literal(json!("PASSED"))),
        };
        assert_eq!(expr.describe(), "ctx.status equals 'PASSED'");
        assert_eq!(expr.to_filter(), r#"$CTX.status == "PASSED""#);
    }

    #[test]
    fn test_logical_wraps_operands() {
        let expr = RuntimeExpr::Logical {
            op: LogicalOp::Or,
            left: Box::new(ctx(&["a"])),
            right: Box::new(RuntimeExpr::Compare {
                op: CompareOp::NotEq,
                left: Box::new(ctx(&["b"])),
                right: Box::new(RuntimeExpr::Literal(json!(3))),
            }),
        };
        assert_eq!(expr.describe(), "ctx.a OR ctx.b does not equal 3");
        assert_eq!(expr.to_filter(), "($CTX.a) or ($CTX.b != 3)");
        assert_eq!(expr.variables().len(), 1);
    }

    #[test]
    fn test_ternary_filter() {
        let expr = RuntimeExpr::Ternary {
            condition: Box::new(ctx(&["ok"])),
            then: Box::new(RuntimeExpr::Literal(json!("x"))),
            otherwise: Box::new(RuntimeExpr::Literal(json!("y"))),
        };
        assert_eq!(expr.to_filter(), r#"if $CTX.ok then "x" else "y" end"#);
        assert_eq!(expr.describe(), "'x' if ctx.ok, otherwise 'y'");
    }

    #[test]
    fn test_quoted_field_in_filter() {
        assert_eq!(ctx(&["build-id"]).to_filter(), r#"$CTX."build-id""#);
    }
}
