/// Runtime component lowering: variables, functions, calls and control flow

use super::blocks::BlockHandler;
use super::{BreakSite, CallSite, LoopFrame, Lowerer, SpawnSite};
use crate::bundle::is_reserved_id;
use crate::error::Result;
use crate::ir::{
    Arg, AskOption, AskUserNode, Block, BranchCondition, CallNode, FunctionDescriptor, HelperDescriptor, Inline,
    LoopExit, LoopNode, RuntimeBlock, SpawnNode, SpawnPrompt, VarDecl,
};
use quire_parser::{Element, ExprKind, Node};
use serde_json::Value;

pub(super) const RUNTIME_HANDLERS: &[(&str, BlockHandler)] = &[
    ("Variable", variable),
    ("Function", function),
    ("Helper", helper),
    ("Call", call),
    ("Loop", loop_block),
    ("Break", break_block),
    ("Return", return_block),
    ("AskUser", ask_user),
    ("SpawnAgent", spawn_agent),
];

impl Lowerer<'_> {
    /// `If` plus its optional `Else` sibling as one conditional
    pub(super) fn lower_if(&mut self, element: &Element, else_branch: Option<&Element>) -> Result<Block> {
        let condition = self.required_expr(element, "condition")?;
        let condition = self.runtime_expr(&condition.expr)?;

        self.conditions.push(BranchCondition {
            condition: condition.clone(),
            negated: false,
        });
        let then_body = self.lower_children(element);
        self.conditions.pop();
        let then_body = then_body?;

        let else_body = match else_branch {
            Some(else_element) => {
                self.conditions.push(BranchCondition {
                    condition: condition.clone(),
                    negated: true,
                });
                let body = self.lower_children(else_element);
                self.conditions.pop();
                Some(body?)
            }
            None => None,
        };

        Ok(Block::Runtime(RuntimeBlock::Conditional {
            condition,
            then_body,
            else_body,
        }))
    }
}

fn variable(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let name = lw.required_string(element, "name")?;
    let Some(info) = lw.variable(&name).cloned() else {
        return Err(lw.structural(element.span, format!("runtime variable '{}' was not declared", name)));
    };
    let initial = match lw.literal_attr(element, "initial")? {
        Some(value) => Some(value),
        None => lw.literal_attr(element, "value")?,
    };
    Ok(vec![Block::Runtime(RuntimeBlock::Declare(VarDecl {
        var: info.var,
        shape: info.shape,
        initial,
    }))])
}

fn function(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let id = lw.required_string(element, "name")?;
    if !is_identifier(&id) {
        return Err(lw.structural(
            element.attr("name").map(|a| a.span).unwrap_or(element.span),
            format!("function name '{}' must be a valid JavaScript identifier", id),
        ));
    }
    if is_reserved_id(&id) {
        return Err(lw.structural(
            element.attr("name").map(|a| a.span).unwrap_or(element.span),
            format!("function name '{}' is reserved by the runtime module", id),
        ));
    }
    if lw.functions.iter().any(|f| f.id == id) {
        return Err(lw.structural(
            element.span,
            format!("function '{}' is declared more than once in this document", id),
        ));
    }
    let body = lw.raw_content(element);
    if body.trim().is_empty() {
        return Err(lw.structural(element.span, format!("function '{}' has an empty body", id)));
    }
    let descriptor = FunctionDescriptor {
        params: lw.shape_attr(element, "params")?,
        returns: lw.shape_attr(element, "returns")?,
        uses: lw.string_list_attr(element, "uses")?,
        body,
        origin: lw.locate(element.span),
        group: lw.source.group(),
        id,
    };
    lw.functions.push(descriptor);
    Ok(Vec::new())
}

fn helper(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let name = lw.required_string(element, "name")?;
    if lw.helpers.iter().any(|h| h.name == name) {
        return Err(lw.structural(
            element.span,
            format!("helper '{}' is declared more than once in this document", name),
        ));
    }
    let body = lw.raw_content(element);
    lw.helpers.push(HelperDescriptor {
        name,
        body,
        origin: lw.locate(element.span),
    });
    Ok(Vec::new())
}

fn call(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let function = lw.required_string(element, "fn")?;
    let mut args = Vec::new();
    if let Some(embedded) = lw.expr_attr(element, "args")? {
        let ExprKind::Object(props) = &embedded.expr.kind else {
            return Err(lw.structural(
                embedded.span,
                "attribute 'args' on <Call> must be an object literal",
            ));
        };
        for prop in props {
            args.push((prop.key.clone(), lw.runtime_arg(&prop.value)?));
        }
    }
    let output = lw.output_var(element)?;
    lw.call_sites.push(CallSite {
        function: function.clone(),
        location: lw.locate(element.name_span),
    });
    Ok(vec![Block::Runtime(RuntimeBlock::Call(CallNode {
        function,
        args,
        output,
    }))])
}

fn loop_block(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let max = match lw.u32_attr(element, "max")? {
        Some(0) => {
            return Err(lw.structural(
                element.attr("max").map(|a| a.span).unwrap_or(element.span),
                "attribute 'max' on <Loop> must be at least 1",
            ));
        }
        Some(max) => max,
        None => {
            return Err(lw.structural(element.name_span, "missing required attribute 'max' on <Loop>"));
        }
    };
    let counter = match lw.string_attr(element, "counter")? {
        Some(name) => lw.variable(&name).map(|info| info.var.clone()),
        None => None,
    };

    lw.loops.push(LoopFrame {
        condition_base: lw.conditions.len(),
        breaks: Vec::new(),
    });
    let body = lw.lower_children(element);
    let frame = lw.loops.pop();
    let body = body?;
    let breaks = frame.map(|f| f.breaks).unwrap_or_default();

    if breaks.len() > 1 {
        return Err(lw.structural(
            breaks[1].span,
            format!("<Loop> may contain at most one <Break>, found {}", breaks.len()),
        ));
    }
    let exit = match breaks.into_iter().next() {
        None => LoopExit::Never,
        Some(site) if site.conditions.is_empty() => LoopExit::Always,
        Some(site) => LoopExit::When(site.conditions),
    };

    Ok(vec![Block::Runtime(RuntimeBlock::Loop(LoopNode {
        max,
        counter,
        body,
        exit,
    }))])
}

fn break_block(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let message = lw.string_attr(element, "message")?;
    if lw.loops.is_empty() {
        return Err(lw.structural(element.name_span, "<Break> is only valid inside a <Loop>"));
    }
    if let Some(frame) = lw.loops.last_mut() {
        let conditions = lw.conditions[frame.condition_base..].to_vec();
        frame.breaks.push(BreakSite {
            conditions,
            span: element.name_span,
        });
    }
    Ok(vec![Block::Runtime(RuntimeBlock::Break { message })])
}

fn return_block(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let status = lw.required_string(element, "status")?;
    let message = lw.string_attr(element, "message")?;
    Ok(vec![Block::Runtime(RuntimeBlock::Return { status, message })])
}

fn ask_user(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let question = lw.required_string(element, "question")?;
    let header = lw.string_attr(element, "header")?;
    let mut options = Vec::new();
    match lw.literal_attr(element, "options")? {
        None => {}
        Some(Value::Array(items)) => {
            for item in items {
                let option = match item {
                    Value::String(label) => AskOption {
                        label,
                        description: None,
                    },
                    Value::Object(map) => {
                        let Some(label) = map.get("label").and_then(Value::as_str) else {
                            return Err(lw.structural(element.span, "every option of <AskUser> needs a 'label'"));
                        };
                        AskOption {
                            label: label.to_string(),
                            description: map.get("description").and_then(Value::as_str).map(str::to_string),
                        }
                    }
                    _ => {
                        return Err(lw.structural(
                            element.span,
                            "options of <AskUser> must be strings or { label, description } objects",
                        ));
                    }
                };
                options.push(option);
            }
        }
        Some(_) => {
            return Err(lw.structural(element.span, "attribute 'options' on <AskUser> must be an array"));
        }
    }
    let multi_select = lw.bool_attr(element, "multiSelect")?;
    let output = lw.output_var(element)?;
    Ok(vec![Block::Runtime(RuntimeBlock::AskUser(AskUserNode {
        question,
        header,
        options,
        multi_select,
        output,
    }))])
}

fn spawn_agent(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let agent = lw.required_string(element, "agent")?;
    let description = lw.required_string(element, "description")?;
    let model = lw.string_attr(element, "model")?;

    let literal = lw.string_attr(element, "prompt")?;
    let input = lw.expr_attr(element, "input")?;
    let children = child_prompt(lw, element)?;
    let prompt = match (literal, input) {
        (Some(_), Some(_)) => {
            return Err(lw.structural(
                element.name_span,
                "<SpawnAgent> takes either 'prompt' or 'input', not both",
            ));
        }
        (Some(prompt), None) => SpawnPrompt::Literal(prompt),
        (None, Some(embedded)) => {
            let ExprKind::Object(props) = &embedded.expr.kind else {
                return Err(lw.structural(
                    embedded.span,
                    "attribute 'input' on <SpawnAgent> must be an object literal",
                ));
            };
            let mut fields: Vec<(String, Arg)> = Vec::with_capacity(props.len());
            for prop in props {
                fields.push((prop.key.clone(), lw.runtime_arg(&prop.value)?));
            }
            SpawnPrompt::Inputs(fields)
        }
        (None, None) if !children.is_empty() => SpawnPrompt::Literal(children),
        (None, None) => {
            return Err(lw.structural(
                element.name_span,
                "<SpawnAgent> needs a 'prompt', an 'input' map or prompt text as children",
            ));
        }
    };

    let inputs = match &prompt {
        SpawnPrompt::Inputs(fields) => Some(fields.iter().map(|(name, _)| name.clone()).collect()),
        SpawnPrompt::Literal(_) => None,
    };
    lw.spawn_sites.push(SpawnSite {
        agent: agent.clone(),
        inputs,
        location: lw.locate(element.name_span),
    });
    let output = lw.output_var(element)?;
    Ok(vec![Block::Runtime(RuntimeBlock::SpawnAgent(SpawnNode {
        agent,
        model,
        description,
        prompt,
        output,
    }))])
}

/// Prompt text written as children, with common indentation removed.
/// Embedded expressions go through the runtime transform and appear as
/// their filter in inline code.
fn child_prompt(lw: &mut Lowerer<'_>, element: &Element) -> Result<String> {
    let mut text = String::new();
    for node in &element.children {
        match node {
            Node::Text(t) => text.push_str(&t.value),
            Node::Expr(e) => match lw.inline_expr(e)? {
                Inline::Code(filter) => {
                    text.push('`');
                    text.push_str(&filter);
                    text.push('`');
                }
                Inline::Text(value) => text.push_str(&value),
                _ => {}
            },
            Node::Element(child) => {
                return Err(lw.structural(
                    child.name_span,
                    format!("expected prompt text inside <SpawnAgent>, found <{}>", child.name),
                ));
            }
        }
    }
    Ok(super::text::dedent(&text))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
