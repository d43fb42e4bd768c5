/// State documents: one slash command per operation plus an orchestrator index
///
/// Storage is delegated to a `StateProvider`, which produces the shell that
/// sets up the store and performs each operation. Values are stored as text:
/// strings verbatim, everything else as JSON.

use super::Artifact;
use super::frontmatter::with_frontmatter;
use super::markdown::MarkdownRenderer;
use crate::diagnostic::Location;
use crate::error::{CompileError, Result};
use crate::ir::{
    Block, CommandFrontmatter, Inline, OperationKind, StateDocument, StateOperation, Table,
};
use serde_json::Value;
use std::path::PathBuf;

/// Providers accepted by `<State provider="...">`
pub const PROVIDERS: &[&str] = &["sqlite"];

pub const STATE_DIR: &str = "state";

pub trait StateProvider {
    /// Where the data lives, for humans
    fn location(&self) -> String;
    /// Shell that creates the store and seeds field defaults
    fn setup(&self, state: &StateDocument) -> String;
    /// Shell that performs one operation
    fn operation(&self, state: &StateDocument, operation: &StateOperation) -> String;
}

pub fn provider_for(state: &StateDocument, location: &Location) -> Result<Box<dyn StateProvider>> {
    match state.provider.kind.as_str() {
        "sqlite" => Ok(Box::new(SqliteProvider::new(state))),
        other => Err(CompileError::structural(
            location.clone(),
            format!("unknown state provider '{}'", other),
        )),
    }
}

pub struct SqliteProvider {
    database: String,
    table: String,
}

impl SqliteProvider {
    pub fn new(state: &StateDocument) -> Self {
        let database = state
            .provider
            .options
            .get("database")
            .cloned()
            .unwrap_or_else(|| format!(".claude/state/{}.db", state.name));
        let table = state
            .provider
            .options
            .get("table")
            .cloned()
            .unwrap_or_else(|| sql_identifier(&state.name));
        Self { database, table }
    }

    fn upsert(&self) -> &'static str {
        "ON CONFLICT(field) DO UPDATE SET value = excluded.value"
    }
}

/// Table name from a state name: non-alphanumerics become `_`
fn sql_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Single-quoted SQL string literal
fn sql_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Stored text for a default value
fn stored_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl StateProvider for SqliteProvider {
    fn location(&self) -> String {
        self.database.clone()
    }

    fn setup(&self, state: &StateDocument) -> String {
        let mut sql = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (field TEXT PRIMARY KEY, value TEXT NOT NULL);",
            self.table
        )];
        for field in &state.fields {
            if let Some(default) = &field.default {
                sql.push(format!(
                    "INSERT OR IGNORE INTO {} (field, value) VALUES ({}, {});",
                    self.table,
                    sql_string(&field.name),
                    sql_string(&stored_text(default))
                ));
            }
        }
        let parent = match self.database.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => format!("mkdir -p \"{}\"\n", dir),
            _ => String::new(),
        };
        format!(
            "DB=\"{}\"\n{}sqlite3 \"$DB\" \"{}\"",
            self.database,
            parent,
            sql.join(" ").replace('"', "\\\"")
        )
    }

    fn operation(&self, state: &StateDocument, operation: &StateOperation) -> String {
        let setup = self.setup(state);
        let action = match &operation.kind {
            OperationKind::Read => format!(
                "sqlite3 -json \"$DB\" \"SELECT field, value FROM {} ORDER BY field;\"",
                self.table
            ),
            OperationKind::Write { field: Some(field) } => format!(
                "VALUE=\"$ARGUMENTS\"\nVALUE_SQL=${{VALUE//\\'/\\'\\'}}\nsqlite3 \"$DB\" \"INSERT INTO {} (field, value) VALUES ({}, '$VALUE_SQL') {};\"",
                self.table,
                sql_string(field),
                self.upsert()
            ),
            OperationKind::Write { field: None } => format!(
                "JSON=\"$ARGUMENTS\"\nJSON_SQL=${{JSON//\\'/\\'\\'}}\nsqlite3 \"$DB\" \"INSERT INTO {} (field, value) SELECT key, CASE type WHEN 'text' THEN value ELSE json_quote(value) END FROM json_each('$JSON_SQL') WHERE true {};\"",
                self.table,
                self.upsert()
            ),
            OperationKind::Delete => format!("sqlite3 \"$DB\" \"DELETE FROM {};\"", self.table),
            OperationKind::Custom { sql } => {
                format!("sqlite3 -json \"$DB\" \"{}\"", sql.trim().replace('"', "\\\""))
            }
        };
        format!("{}\n{}", setup, action)
    }
}

fn kind_name(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Read => "read",
        OperationKind::Write { .. } => "write",
        OperationKind::Delete => "delete",
        OperationKind::Custom { .. } => "custom",
    }
}

fn operation_file(state: &str, operation: &str) -> String {
    format!("{}.{}.md", state, operation)
}

fn text(s: impl Into<String>) -> Vec<Inline> {
    vec![Inline::Text(s.into())]
}

fn fields_table(state: &StateDocument) -> Option<Block> {
    if state.fields.is_empty() {
        return None;
    }
    let rows = state
        .fields
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.shape.to_string(),
                f.default.as_ref().map(|d| d.to_string()).unwrap_or_default(),
                f.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    Some(Block::Table(Table {
        headers: vec![
            "Field".into(),
            "Type".into(),
            "Default".into(),
            "Description".into(),
        ],
        rows,
        align: Vec::new(),
    }))
}

/// One command file per operation
pub fn emit_state(
    state: &StateDocument,
    location: &Location,
    renderer: &MarkdownRenderer<'_>,
) -> Result<Vec<Artifact>> {
    let provider = provider_for(state, location)?;
    let mut artifacts = Vec::with_capacity(state.operations.len());
    for operation in &state.operations {
        let argument_hint = match &operation.kind {
            OperationKind::Write { field: Some(_) } => Some("<value>".to_string()),
            OperationKind::Write { field: None } => Some("<json-object>".to_string()),
            _ => None,
        };
        let frontmatter = CommandFrontmatter {
            name: format!("{}.{}", state.name, operation.name),
            description: operation.description.clone().unwrap_or_else(|| {
                format!("{} the {} state", kind_name(&operation.kind), state.name)
            }),
            argument_hint,
            allowed_tools: vec!["Bash".to_string()],
            model: None,
        };

        let mut blocks = vec![Block::Heading {
            level: 1,
            content: text(format!("{}: {}", state.name, operation.name)),
        }];
        blocks.push(Block::Paragraph(text(state.description.clone())));
        blocks.extend(fields_table(state));
        blocks.push(Block::CodeBlock {
            language: Some("bash".to_string()),
            code: provider.operation(state, operation),
        });
        blocks.extend(operation.body.iter().cloned());

        let body = renderer.render_blocks(&blocks)?;
        artifacts.push(Artifact::Generated {
            path: PathBuf::from(STATE_DIR).join(operation_file(&state.name, &operation.name)),
            content: with_frontmatter(&frontmatter, &body)?,
        });
    }
    Ok(artifacts)
}

/// Index of every state and its operations
pub fn orchestrator(
    states: &[(&StateDocument, &Location)],
    renderer: &MarkdownRenderer<'_>,
) -> Result<Artifact> {
    let mut blocks = vec![Block::Heading {
        level: 1,
        content: text("State"),
    }];
    for (state, location) in states {
        let provider = provider_for(state, location)?;
        blocks.push(Block::Heading {
            level: 2,
            content: text(state.name.clone()),
        });
        blocks.push(Block::Paragraph(vec![
            Inline::Text(format!("{} Stored with {} in ", state.description, state.provider.kind)),
            Inline::Code(provider.location()),
            Inline::Text(".".into()),
        ]));
        let rows = state
            .operations
            .iter()
            .map(|op| {
                vec![
                    op.name.clone(),
                    kind_name(&op.kind).to_string(),
                    operation_file(&state.name, &op.name),
                ]
            })
            .collect();
        blocks.push(Block::Table(Table {
            headers: vec!["Operation".into(), "Kind".into(), "File".into()],
            rows,
            align: Vec::new(),
        }));
    }
    let mut content = renderer.render_blocks(&blocks)?;
    content.push('\n');
    Ok(Artifact::Generated {
        path: PathBuf::from(STATE_DIR).join("ORCHESTRATOR.md"),
        content,
    })
}
