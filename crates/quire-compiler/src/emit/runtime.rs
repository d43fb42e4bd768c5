/// Runtime block serialization
///
/// Conditions are checked with `jq -e` against the JSON held in each
/// variable's shell name. Calls invoke the bundled runtime as
/// `<runtime-entry> <function-id> '<json-args>'`.

use super::markdown::{MarkdownRenderer, code_span, escape_cell, fenced, join_nonempty};
use crate::error::Result;
use crate::ir::{
    Arg, AskUserNode, CallNode, LoopExit, LoopNode, RuntimeBlock, RuntimeExpr, Shape, SpawnNode,
    SpawnPrompt, VarDecl, VarRef,
};
use serde_json::Value;

/// Quote a string for a POSIX shell
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// `--argjson CTX "$CTX"` for every variable a filter reads
fn jq_bindings(vars: &[VarRef]) -> String {
    vars.iter()
        .map(|v| format!(" --argjson {} \"${}\"", v.shell, v.shell))
        .collect()
}

fn arg_filter(arg: &Arg) -> String {
    match arg {
        Arg::Literal(value) => value.to_string(),
        Arg::Expr(expr) => expr.to_filter(),
    }
}

fn store_line(output: &Option<VarRef>, what: &str) -> String {
    match output {
        Some(var) => format!("Store the {} in `${}`.", what, var.shell),
        None => String::new(),
    }
}

impl MarkdownRenderer<'_> {
    pub(super) fn render_runtime(&self, block: &RuntimeBlock) -> Result<String> {
        let text = match block {
            RuntimeBlock::Declare(decl) => render_declare(decl),
            RuntimeBlock::Call(call) => self.render_call(call),
            RuntimeBlock::Conditional {
                condition,
                then_body,
                else_body,
            } => {
                let mut parts = vec![
                    format!("**If {}:**", condition.describe()),
                    condition_check(condition),
                    self.render_blocks(then_body)?,
                ];
                if let Some(else_body) = else_body {
                    parts.push("**Otherwise:**".to_string());
                    parts.push(self.render_blocks(else_body)?);
                }
                join_nonempty(&parts)
            }
            RuntimeBlock::Loop(node) => self.render_loop(node)?,
            RuntimeBlock::Break { message } => match message {
                Some(message) => format!("**Break out of the loop:** {}", message),
                None => "**Break out of the loop.**".to_string(),
            },
            RuntimeBlock::Return { status, message } => match message {
                Some(message) => format!("**Return {}:** {}", code_span(status), message),
                None => format!("**Return {}.**", code_span(status)),
            },
            RuntimeBlock::AskUser(node) => render_ask_user(node),
            RuntimeBlock::SpawnAgent(node) => render_spawn(node),
        };
        Ok(text)
    }

    fn render_call(&self, call: &CallNode) -> String {
        let mut parts = vec![format!("**Call {}:**", code_span(&call.function))];
        if !call.args.is_empty() {
            let mut table = String::from("| Argument | Value |\n| --- | --- |");
            for (name, arg) in &call.args {
                table.push_str(&format!(
                    "\n| {} | {} |",
                    escape_cell(name),
                    escape_cell(&code_span(&arg_filter(arg)))
                ));
            }
            parts.push(table);
        }

        let args = call_arguments(call);
        let invocation = format!("{} {} {}", self.runtime_entry, call.function, args);
        let line = match &call.output {
            Some(var) => format!("{}=$({})", var.shell, invocation),
            None => invocation,
        };
        parts.push(fenced("bash", &line));
        parts.push(store_line(&call.output, "result"));
        join_nonempty(&parts)
    }

    fn render_loop(&self, node: &LoopNode) -> Result<String> {
        let header = match &node.counter {
            Some(counter) => format!(
                "**Loop (max {} iterations, counter {}):**",
                node.max,
                code_span(&counter.name)
            ),
            None => format!("**Loop (max {} iterations):**", node.max),
        };
        let exit = match &node.exit {
            LoopExit::Never => format!("**Exit the loop** after {} iterations.", node.max),
            LoopExit::Always => "**Exit the loop** after the body completes.".to_string(),
            LoopExit::When(conditions) => match conditions.as_slice() {
                [single] if single.negated => {
                    format!("**Exit the loop unless** {}.", single.condition.describe())
                }
                [single] => format!("**Exit the loop when** {}.", single.condition.describe()),
                all => {
                    let terms: Vec<String> = all
                        .iter()
                        .map(|c| {
                            if c.negated {
                                format!("NOT ({})", c.condition.describe())
                            } else {
                                c.condition.describe_operand()
                            }
                        })
                        .collect();
                    format!("**Exit the loop when** {}.", terms.join(" AND "))
                }
            },
        };
        Ok(join_nonempty(&[header, self.render_blocks(&node.body)?, exit]))
    }
}

/// JSON argument for a call: quoted literal JSON, or a jq object built from
/// the variables it reads
fn call_arguments(call: &CallNode) -> String {
    let all_literal = call.args.iter().all(|(_, arg)| matches!(arg, Arg::Literal(_)));
    if all_literal {
        let mut map = serde_json::Map::new();
        for (name, arg) in &call.args {
            if let Arg::Literal(value) = arg {
                map.insert(name.clone(), value.clone());
            }
        }
        return shell_quote(&Value::Object(map).to_string());
    }

    let mut vars: Vec<VarRef> = call
        .args
        .iter()
        .filter_map(|(_, arg)| match arg {
            Arg::Expr(expr) => Some(expr.variables()),
            Arg::Literal(_) => None,
        })
        .flatten()
        .collect();
    vars.sort();
    vars.dedup();
    let fields: Vec<String> = call
        .args
        .iter()
        .map(|(name, arg)| format!("{}: ({})", Value::String(name.clone()), arg_filter(arg)))
        .collect();
    let object = format!("{{{}}}", fields.join(", "));
    format!("\"$(jq -nc{} {})\"", jq_bindings(&vars), shell_quote(&object))
}

fn condition_check(condition: &RuntimeExpr) -> String {
    let line = format!(
        "jq -ne{} {} >/dev/null",
        jq_bindings(&condition.variables()),
        shell_quote(&condition.to_filter())
    );
    fenced("bash", &line)
}

fn render_declare(decl: &VarDecl) -> String {
    let shape = match decl.shape {
        Shape::Any => String::new(),
        ref shape => format!(" ({})", code_span(&shape.to_string())),
    };
    let intro = format!(
        "**Variable {}**{} is stored in `${}`",
        code_span(&decl.var.name),
        shape,
        decl.var.shell
    );
    match &decl.initial {
        Some(value) => {
            let line = format!("{}={}", decl.var.shell, shell_quote(&value.to_string()));
            join_nonempty(&[format!("{}:", intro), fenced("bash", &line)])
        }
        None => format!("{}.", intro),
    }
}

fn render_ask_user(node: &AskUserNode) -> String {
    let question = match &node.header {
        Some(header) => format!("**Ask the user** ({}): {}", header, node.question),
        None => format!("**Ask the user:** {}", node.question),
    };
    let options: Vec<String> = node
        .options
        .iter()
        .map(|o| match &o.description {
            Some(description) => format!("- **{}**: {}", o.label, description),
            None => format!("- **{}**", o.label),
        })
        .collect();
    let multi = if node.multi_select {
        "Multiple selections are allowed.".to_string()
    } else {
        String::new()
    };
    join_nonempty(&[
        question,
        options.join("\n"),
        multi,
        store_line(&node.output, "answer"),
    ])
}

fn quote_task_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn render_spawn(node: &SpawnNode) -> String {
    let prompt = match &node.prompt {
        SpawnPrompt::Literal(text) => text.clone(),
        SpawnPrompt::Inputs(fields) => fields
            .iter()
            .map(|(name, arg)| {
                let value = match arg {
                    Arg::Literal(Value::String(s)) => s.clone(),
                    Arg::Literal(other) => other.to_string(),
                    Arg::Expr(expr) => code_span(&expr.to_filter()),
                };
                format!("<{}>\n{}\n</{}>", name, value, name)
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let mut lines = vec![
        "Task(".to_string(),
        format!("  subagent_type={},", quote_task_string(&node.agent)),
    ];
    if let Some(model) = &node.model {
        lines.push(format!("  model={},", quote_task_string(model)));
    }
    lines.push(format!("  description={},", quote_task_string(&node.description)));
    lines.push(format!("  prompt={}", quote_task_string(&prompt)));
    lines.push(")".to_string());

    join_nonempty(&[fenced("", &lines.join("\n")), store_line(&node.output, "result")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompareOp, PathSegment, VarPath};
    use serde_json::json;

    fn ctx() -> VarRef {
        VarRef {
            name: "ctx".into(),
            shell: "CTX".into(),
        }
    }

    fn status_path() -> RuntimeExpr {
        RuntimeExpr::Var(VarPath {
            var: ctx(),
            path: vec![PathSegment::Field("status".into())],
        })
    }

    fn render(block: RuntimeBlock) -> String {
        MarkdownRenderer::new("node .claude/runtime/runtime.js")
            .render_runtime(&block)
            .unwrap()
    }

    #[test]
    fn test_literal_call_invocation() {
        let out = render(RuntimeBlock::Call(CallNode {
            function: "checkStatus".into(),
            args: vec![("retries".into(), Arg::Literal(json!(3)))],
            output: Some(VarRef {
                name: "result".into(),
                shell: "RESULT".into(),
            }),
        }));
        assert!(out.contains("| retries | `3` |"));
        assert!(out.contains(
            "RESULT=$(node .claude/runtime/runtime.js checkStatus '{\"retries\":3}')"
        ));
    }

    #[test]
    fn test_expression_call_uses_jq() {
        let out = render(RuntimeBlock::Call(CallNode {
            function: "notify".into(),
            args: vec![
                ("status".into(), Arg::Expr(status_path())),
                ("note".into(), Arg::Literal(json!("it's done"))),
            ],
            output: None,
        }));
        assert!(out.contains(
            r#"node .claude/runtime/runtime.js notify "$(jq -nc --argjson CTX "$CTX" '{"status": ($CTX.status), "note": ("it'\''s done")}')""#
        ));
    }

    #[test]
    fn test_conditional_labels() {
        let condition = RuntimeExpr::Compare {
            op: CompareOp::Eq,
            left: Box::new(status_path()),
            right: Box::new(RuntimeExpr::Literal(json!("PASSED"))),
        };
        let out = render(RuntimeBlock::Conditional {
            condition,
            then_body: vec![],
            else_body: Some(vec![]),
        });
        assert!(out.starts_with("**If ctx.status equals 'PASSED':**"));
        assert!(out.contains(r#"jq -ne --argjson CTX "$CTX" '$CTX.status == "PASSED"' >/dev/null"#));
        assert!(out.ends_with("**Otherwise:**"));
    }

    #[test]
    fn test_loop_always_has_exit_line() {
        let out = render(RuntimeBlock::Loop(LoopNode {
            max: 3,
            counter: None,
            body: vec![],
            exit: LoopExit::Never,
        }));
        assert_eq!(out, "**Loop (max 3 iterations):**\n\n**Exit the loop** after 3 iterations.");
    }

    #[test]
    fn test_spawn_with_inputs() {
        let out = render(RuntimeBlock::SpawnAgent(SpawnNode {
            agent: "researcher".into(),
            model: Some("haiku".into()),
            description: "Research".into(),
            prompt: SpawnPrompt::Inputs(vec![("topic".into(), Arg::Literal(json!("rust")))]),
            output: None,
        }));
        assert!(out.starts_with("```\nTask(\n  subagent_type=\"researcher\",\n  model=\"haiku\","));
        assert!(out.contains("  prompt=\"<topic>\nrust\n</topic>\"\n)"));
    }
}
