/// Root element handlers, one per document kind

use super::Lowerer;
use crate::error::Result;
use crate::ir::{
    AgentDocument, AgentFrontmatter, AgentInput, CommandDocument, CommandFrontmatter, Document,
    McpConfigDocument, McpServer, McpTransport, OperationKind, ProviderConfig, SkillDocument,
    SkillFile, SkillFrontmatter, StateDocument, StateField, StateOperation, StaticFile,
};
use crate::emit::state::PROVIDERS;
use quire_parser::{AttrValue, Element, Node};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

type RootHandler = fn(&mut Lowerer<'_>, &Element) -> Result<Document>;

const ROOT_HANDLERS: &[(&str, RootHandler, bool)] = &[
    ("Command", command, true),
    ("RuntimeCommand", command, true),
    ("Agent", agent, true),
    ("Skill", skill, true),
    ("MCPConfig", mcp_config, false),
    ("State", state, false),
];

pub(super) fn root_handler(name: &str) -> Option<RootHandler> {
    ROOT_HANDLERS
        .iter()
        .find(|(tag, _, _)| *tag == name)
        .map(|(_, handler, _)| *handler)
}

pub(super) fn root_names() -> Vec<&'static str> {
    ROOT_HANDLERS.iter().map(|(tag, _, _)| *tag).collect()
}

/// Whether runtime components may appear under this root
pub(super) fn hosts_runtime(name: &str) -> bool {
    ROOT_HANDLERS
        .iter()
        .any(|(tag, _, runtime)| *tag == name && *runtime)
}

impl Lowerer<'_> {
    /// Name used in output paths: no separators, no dot segments
    fn document_name(&self, element: &Element) -> Result<String> {
        let name = self.required_string(element, "name")?;
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(self.structural(
                element.attr("name").map(|a| a.span).unwrap_or(element.span),
                format!("name '{}' on <{}> must not contain path separators", name, element.name),
            ));
        }
        Ok(name)
    }

    /// Relative path inside an output directory
    fn relative_path(&self, element: &Element, attr: &str, value: &str) -> Result<()> {
        let path = Path::new(value);
        let valid = !value.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if valid {
            return Ok(());
        }
        Err(self.structural(
            element.attr(attr).map(|a| a.span).unwrap_or(element.span),
            format!(
                "'{}' on <{}> must be a relative path without '..' segments",
                value, element.name
            ),
        ))
    }

    /// Lower the children of a root, handing the named kind-specific
    /// children to `take` and everything else to block lowering
    fn split_root<'e>(
        &mut self,
        root: &'e Element,
        special: &[&str],
    ) -> Result<(Vec<&'e Element>, Vec<crate::ir::Block>)> {
        let mut taken = Vec::new();
        let mut rest: Vec<&Node> = Vec::new();
        for node in &root.children {
            match node {
                Node::Element(element) if special.contains(&element.name.as_str()) => {
                    taken.push(element)
                }
                other => rest.push(other),
            }
        }
        self.parents.push(root.name.clone());
        let body = self.lower_nodes(&rest);
        self.parents.pop();
        Ok((taken, body?))
    }
}

fn command(lw: &mut Lowerer<'_>, root: &Element) -> Result<Document> {
    let frontmatter = CommandFrontmatter {
        name: lw.document_name(root)?,
        description: lw.required_string(root, "description")?,
        argument_hint: lw.string_attr(root, "argumentHint")?,
        allowed_tools: lw.string_list_attr(root, "allowedTools")?,
        model: lw.string_attr(root, "model")?,
    };
    let body = lw.lower_children(root)?;
    Ok(Document::Command(CommandDocument {
        frontmatter,
        body,
        runtime: lw.runtime,
    }))
}

fn agent(lw: &mut Lowerer<'_>, root: &Element) -> Result<Document> {
    let tools = lw.string_list_attr(root, "tools")?;
    let frontmatter = AgentFrontmatter {
        name: lw.document_name(root)?,
        description: lw.required_string(root, "description")?,
        tools: (!tools.is_empty()).then(|| tools.join(" ")),
        color: lw.string_attr(root, "color")?,
        model: lw.string_attr(root, "model")?,
    };

    let (input_elements, body) = lw.split_root(root, &["Input"])?;
    let mut inputs: Vec<AgentInput> = Vec::with_capacity(input_elements.len());
    for element in input_elements {
        let name = lw.required_string(element, "name")?;
        if inputs.iter().any(|input| input.name == name) {
            return Err(lw.structural(
                element.span,
                format!("input '{}' is declared more than once", name),
            ));
        }
        let required = if element.has_attr("required") {
            lw.bool_attr(element, "required")?
        } else {
            !lw.bool_attr(element, "optional")?
        };
        inputs.push(AgentInput {
            name,
            required,
            description: lw.string_attr(element, "description")?,
            shape: lw.shape_attr(element, "type")?,
            location: lw.locate(element.span),
        });
    }

    Ok(Document::Agent(AgentDocument {
        frontmatter,
        inputs,
        body,
    }))
}

fn skill(lw: &mut Lowerer<'_>, root: &Element) -> Result<Document> {
    let frontmatter = SkillFrontmatter {
        name: lw.document_name(root)?,
        description: lw.required_string(root, "description")?,
        allowed_tools: lw.string_list_attr(root, "allowedTools")?,
        model: lw.string_attr(root, "model")?,
    };

    let (special, body) = lw.split_root(root, &["SkillFile", "SkillStatic"])?;
    let mut files = Vec::new();
    let mut statics = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::from(["SKILL.md".to_string()]);
    for element in special {
        let (attr, path) = if element.name == "SkillFile" {
            let path = lw.required_string(element, "path")?;
            lw.relative_path(element, "path", &path)?;
            let body = lw.lower_children(element)?;
            files.push(SkillFile {
                path: path.clone(),
                body,
            });
            ("path", path)
        } else {
            let src = lw.required_string(element, "src")?;
            lw.relative_path(element, "src", &src)?;
            let dest = match lw.string_attr(element, "dest")? {
                Some(dest) => dest,
                None => Path::new(&src)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| src.clone()),
            };
            lw.relative_path(element, "dest", &dest)?;
            statics.push(StaticFile {
                src,
                dest: dest.clone(),
            });
            ("dest", dest)
        };
        if !seen.insert(path.clone()) {
            return Err(lw.structural(
                element.attr(attr).map(|a| a.span).unwrap_or(element.span),
                format!("skill file '{}' is produced more than once", path),
            ));
        }
    }

    Ok(Document::Skill(SkillDocument {
        frontmatter,
        body,
        files,
        statics,
    }))
}

fn mcp_config(lw: &mut Lowerer<'_>, root: &Element) -> Result<Document> {
    let name = lw.document_name(root)?;
    let description = lw.required_string(root, "description")?;
    let mut servers: Vec<McpServer> = Vec::new();
    for node in &root.children {
        let element = match node {
            Node::Element(element) if element.name == "Server" => element,
            Node::Element(element) => {
                return Err(lw.structural(
                    element.name_span,
                    format!("expected <Server> inside <MCPConfig>, found <{}>", element.name),
                ));
            }
            node if node.is_blank_text() => continue,
            other => {
                return Err(lw.structural(other.span(), "expected <Server> inside <MCPConfig>, found text"));
            }
        };
        let server_name = lw.required_string(element, "name")?;
        if servers.iter().any(|s| s.name == server_name) {
            return Err(lw.structural(
                element.span,
                format!("MCP server '{}' is declared more than once", server_name),
            ));
        }
        let command = lw.string_attr(element, "command")?;
        let url = lw.string_attr(element, "url")?;
        let transport = match (command, url) {
            (Some(command), None) => McpTransport::Stdio {
                command,
                args: lw.string_list_attr(element, "args")?,
                env: lw.string_map_attr(element, "env")?,
            },
            (None, Some(url)) => {
                let headers = lw.string_map_attr(element, "headers")?;
                match lw.string_attr(element, "type")?.as_deref() {
                    None | Some("http") => McpTransport::Http { url, headers },
                    Some("sse") => McpTransport::Sse { url, headers },
                    Some(other) => {
                        return Err(lw.structural(
                            element.attr("type").map(|a| a.span).unwrap_or(element.span),
                            format!("unknown MCP transport '{}'; expected http or sse", other),
                        ));
                    }
                }
            }
            _ => {
                return Err(lw.structural(
                    element.name_span,
                    "<Server> needs exactly one of 'command' or 'url'",
                ));
            }
        };
        servers.push(McpServer {
            name: server_name,
            transport,
        });
    }
    Ok(Document::McpConfig(McpConfigDocument {
        name,
        description,
        servers,
    }))
}

fn state(lw: &mut Lowerer<'_>, root: &Element) -> Result<Document> {
    let name = lw.document_name(root)?;
    let description = lw.required_string(root, "description")?;
    let kind = lw
        .string_attr(root, "provider")?
        .unwrap_or_else(|| "sqlite".to_string());
    if !PROVIDERS.contains(&kind.as_str()) {
        return Err(lw.structural(
            root.attr("provider").map(|a| a.span).unwrap_or(root.span),
            format!("unknown state provider '{}'; supported: {}", kind, PROVIDERS.join(", ")),
        ));
    }
    let mut options = BTreeMap::new();
    for attr in &root.attributes {
        if matches!(attr.name.as_str(), "name" | "description" | "provider") {
            continue;
        }
        if let AttrValue::Flag = attr.value {
            continue;
        }
        if let Some(value) = lw.string_attr(root, &attr.name)? {
            options.insert(attr.name.clone(), value);
        }
    }

    let mut fields: Vec<StateField> = Vec::new();
    let mut operations: Vec<StateOperation> = Vec::new();
    for node in &root.children {
        let element = match node {
            Node::Element(element) => element,
            node if node.is_blank_text() => continue,
            other => {
                return Err(lw.structural(
                    other.span(),
                    "expected <Field> or <Operation> inside <State>, found text",
                ));
            }
        };
        match element.name.as_str() {
            "Field" => {
                let field_name = lw.required_string(element, "name")?;
                if fields.iter().any(|f| f.name == field_name) {
                    return Err(lw.structural(
                        element.span,
                        format!("state field '{}' is declared more than once", field_name),
                    ));
                }
                fields.push(StateField {
                    name: field_name,
                    shape: lw.shape_attr(element, "type")?,
                    default: lw.literal_attr(element, "default")?,
                    description: lw.string_attr(element, "description")?,
                });
            }
            "Operation" => {
                let op_name = lw.document_name(element)?;
                if operations.iter().any(|o| o.name == op_name) {
                    return Err(lw.structural(
                        element.span,
                        format!("state operation '{}' is declared more than once", op_name),
                    ));
                }
                let kind = operation_kind(lw, element, &op_name)?;
                let body = lw.lower_children(element)?;
                operations.push(StateOperation {
                    name: op_name,
                    description: lw.string_attr(element, "description")?,
                    kind,
                    body,
                });
            }
            other => {
                return Err(lw.structural(
                    element.name_span,
                    format!("expected <Field> or <Operation> inside <State>, found <{}>", other),
                ));
            }
        }
    }

    for operation in &operations {
        if let OperationKind::Write { field: Some(field) } = &operation.kind {
            if !fields.iter().any(|f| &f.name == field) {
                return Err(lw.structural(
                    root.name_span,
                    format!(
                        "operation '{}' writes field '{}', which is not declared with <Field>",
                        operation.name, field
                    ),
                ));
            }
        }
    }

    Ok(Document::State(StateDocument {
        name,
        description,
        provider: ProviderConfig { kind, options },
        fields,
        operations,
    }))
}

/// Operation kind from `kind`, defaulting to the operation's name
fn operation_kind(lw: &Lowerer<'_>, element: &Element, name: &str) -> Result<OperationKind> {
    let kind = lw.string_attr(element, "kind")?;
    let sql = lw.string_attr(element, "sql")?;
    let kind = match kind.as_deref() {
        Some(kind) => kind.to_string(),
        None if sql.is_some() => "custom".to_string(),
        None => name.to_string(),
    };
    match kind.as_str() {
        "read" => Ok(OperationKind::Read),
        "write" => Ok(OperationKind::Write {
            field: lw.string_attr(element, "field")?,
        }),
        "delete" => Ok(OperationKind::Delete),
        "custom" => match sql {
            Some(sql) => Ok(OperationKind::Custom { sql }),
            None => Err(lw.structural(
                element.name_span,
                format!("custom operation '{}' needs a 'sql' attribute", name),
            )),
        },
        other => Err(lw.structural(
            element.name_span,
            format!(
                "operation '{}' has unknown kind '{}'; expected read, write, delete or custom",
                name, other
            ),
        )),
    }
}
