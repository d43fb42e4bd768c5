/// Document IR
///
/// One `Document` per source file, selected by the root tag. Frontmatter
/// records serialize through serde in their declared field order; optional
/// fields are skipped rather than written empty.

pub mod block;
pub mod runtime;
pub mod shape;

pub use block::*;
pub use runtime::*;
pub use shape::Shape;

use crate::diagnostic::Location;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Command(CommandDocument),
    Agent(AgentDocument),
    Skill(SkillDocument),
    McpConfig(McpConfigDocument),
    State(StateDocument),
}

impl Document {
    pub fn name(&self) -> &str {
        match self {
            Document::Command(d) => &d.frontmatter.name,
            Document::Agent(d) => &d.frontmatter.name,
            Document::Skill(d) => &d.frontmatter.name,
            Document::McpConfig(d) => &d.name,
            Document::State(d) => &d.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Document::Command(_) => "command",
            Document::Agent(_) => "agent",
            Document::Skill(_) => "skill",
            Document::McpConfig(_) => "mcp config",
            Document::State(_) => "state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandFrontmatter {
    pub name: String,
    pub description: String,
    #[serde(rename = "argument-hint", skip_serializing_if = "Option::is_none")]
    pub argument_hint: Option<String>,
    #[serde(rename = "allowed-tools", skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandDocument {
    pub frontmatter: CommandFrontmatter,
    pub body: Vec<Block>,
    /// Whether the runtime transform ran for this document
    pub runtime: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentFrontmatter {
    pub name: String,
    pub description: String,
    /// Space-joined tool names; the host expects one string, never a list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A typed input an agent expects from whoever spawns it
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInput {
    pub name: String,
    pub required: bool,
    pub description: Option<String>,
    pub shape: Shape,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDocument {
    pub frontmatter: AgentFrontmatter,
    pub inputs: Vec<AgentInput>,
    pub body: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillFrontmatter {
    pub name: String,
    pub description: String,
    #[serde(rename = "allowed-tools", skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Generated sibling file of a skill, at a path relative to the skill dir
#[derive(Debug, Clone, PartialEq)]
pub struct SkillFile {
    pub path: String,
    pub body: Vec<Block>,
}

/// File copied verbatim into the skill dir
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFile {
    /// Relative to the source file's directory
    pub src: String,
    /// Relative to the skill dir
    pub dest: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDocument {
    pub frontmatter: SkillFrontmatter,
    pub body: Vec<Block>,
    pub files: Vec<SkillFile>,
    pub statics: Vec<StaticFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum McpTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
    Sse {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct McpServer {
    pub name: String,
    pub transport: McpTransport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct McpConfigDocument {
    pub name: String,
    pub description: String,
    pub servers: Vec<McpServer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateField {
    pub name: String,
    pub shape: Shape,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Read,
    /// Write one field, or every field from a JSON object when `None`
    Write { field: Option<String> },
    Delete,
    Custom { sql: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateOperation {
    pub name: String,
    pub description: Option<String>,
    pub kind: OperationKind,
    pub body: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDocument {
    pub name: String,
    pub description: String,
    pub provider: ProviderConfig,
    pub fields: Vec<StateField>,
    pub operations: Vec<StateOperation>,
}
