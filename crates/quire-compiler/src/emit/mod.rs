/// Emitters: Document IR to output files
///
/// One backend per document kind behind a single match in `emit_document`.
/// Every path is relative to the output root.

pub mod frontmatter;
pub mod markdown;
pub mod mcp;
mod runtime;
pub mod state;

pub use markdown::MarkdownRenderer;

use crate::error::Result;
use crate::ir::{AgentDocument, Block, Document, Inline, List, ListItem, Shape, SkillDocument};
use crate::lower::LoweredDocument;
use frontmatter::with_frontmatter;
use std::path::{Path, PathBuf};

/// Default command prefix for runtime function calls
pub const DEFAULT_RUNTIME_ENTRY: &str = "node .claude/runtime/runtime.js";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Generated { path: PathBuf, content: String },
    /// Copy `from` (resolved against the source file) to `to`
    Copy { from: PathBuf, to: PathBuf },
}

impl Artifact {
    /// Destination path, relative to the output root
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Generated { path, .. } => path,
            Artifact::Copy { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub runtime_entry: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            runtime_entry: DEFAULT_RUNTIME_ENTRY.to_string(),
        }
    }
}

pub fn emit_document(lowered: &LoweredDocument, options: &EmitOptions) -> Result<Vec<Artifact>> {
    let renderer = MarkdownRenderer::new(&options.runtime_entry);
    match &lowered.document {
        Document::Command(doc) => {
            let body = renderer.render_blocks(&doc.body)?;
            Ok(vec![Artifact::Generated {
                path: PathBuf::from("commands").join(format!("{}.md", doc.frontmatter.name)),
                content: with_frontmatter(&doc.frontmatter, &body)?,
            }])
        }
        Document::Agent(doc) => Ok(vec![emit_agent(doc, &renderer)?]),
        Document::Skill(doc) => emit_skill(doc, &lowered.source.path, &renderer),
        Document::McpConfig(doc) => Ok(vec![Artifact::Generated {
            path: PathBuf::from("mcp").join(format!("{}.mcp.json", doc.name)),
            content: mcp::render_mcp_config(doc)?,
        }]),
        Document::State(doc) => state::emit_state(doc, &lowered.location, &renderer),
    }
}

fn emit_agent(doc: &AgentDocument, renderer: &MarkdownRenderer<'_>) -> Result<Artifact> {
    let mut blocks = Vec::with_capacity(doc.body.len() + 1);
    if !doc.inputs.is_empty() {
        let items = doc
            .inputs
            .iter()
            .map(|input| {
                let mut detail = match input.shape {
                    Shape::Any => String::new(),
                    ref shape => format!("{}, ", shape),
                };
                detail.push_str(if input.required { "required" } else { "optional" });
                let mut content = vec![
                    Inline::Code(input.name.clone()),
                    Inline::Text(format!(" ({})", detail)),
                ];
                if let Some(description) = &input.description {
                    content.push(Inline::Text(format!(": {}", description)));
                }
                ListItem {
                    content,
                    children: Vec::new(),
                }
            })
            .collect();
        blocks.push(Block::Xml {
            tag: "inputs".to_string(),
            attributes: Vec::new(),
            children: vec![Block::List(List {
                ordered: false,
                start: 1,
                items,
            })],
        });
    }
    blocks.extend(doc.body.iter().cloned());
    let body = renderer.render_blocks(&blocks)?;
    Ok(Artifact::Generated {
        path: PathBuf::from("agents").join(format!("{}.md", doc.frontmatter.name)),
        content: with_frontmatter(&doc.frontmatter, &body)?,
    })
}

fn emit_skill(
    doc: &SkillDocument,
    source_path: &Path,
    renderer: &MarkdownRenderer<'_>,
) -> Result<Vec<Artifact>> {
    let dir = PathBuf::from("skills").join(&doc.frontmatter.name);
    let body = renderer.render_blocks(&doc.body)?;
    let mut artifacts = vec![Artifact::Generated {
        path: dir.join("SKILL.md"),
        content: with_frontmatter(&doc.frontmatter, &body)?,
    }];
    for file in &doc.files {
        let mut content = renderer.render_blocks(&file.body)?;
        if !content.is_empty() {
            content.push('\n');
        }
        artifacts.push(Artifact::Generated {
            path: dir.join(&file.path),
            content,
        });
    }
    let source_dir = source_path.parent().unwrap_or_else(|| Path::new(""));
    for file in &doc.statics {
        artifacts.push(Artifact::Copy {
            from: source_dir.join(&file.src),
            to: dir.join(&file.dest),
        });
    }
    Ok(artifacts)
}
