/// Cross-document validation
///
/// Runs after every document has been lowered and before anything is
/// emitted. Checks are presence-only: a spawn must pass every required input
/// of the agent it targets, call sites must name a declared function, and
/// functions may only use declared helpers. Input shapes are not compared.

use crate::bundle::FunctionRegistry;
use crate::diagnostic::{Diagnostic, Location};
use crate::emit::Artifact;
use crate::ir::{AgentDocument, Document};
use crate::lower::LoweredDocument;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct Validation {
    pub diagnostics: Vec<Diagnostic>,
    /// Indices of documents whose output must be suppressed
    pub failed: BTreeSet<usize>,
}

impl Validation {
    fn fail(&mut self, index: usize, diagnostic: Diagnostic) {
        self.failed.insert(index);
        self.diagnostics.push(diagnostic);
    }
}

/// Validate lowered documents against each other and the registry
pub fn validate(
    documents: &[LoweredDocument],
    registry: &FunctionRegistry,
    strict: bool,
) -> Validation {
    let mut validation = Validation::default();

    let agents: BTreeMap<&str, (&AgentDocument, &Location)> = documents
        .iter()
        .filter_map(|doc| match &doc.document {
            Document::Agent(agent) => Some((agent.frontmatter.name.as_str(), (agent, &doc.location))),
            _ => None,
        })
        .collect();

    for (index, doc) in documents.iter().enumerate() {
        check_spawns(index, doc, &agents, strict, &mut validation);
        for site in &doc.call_sites {
            if !registry.contains(&site.function) {
                validation.fail(
                    index,
                    Diagnostic::error(
                        site.location.clone(),
                        format!(
                            "<Call> targets unknown function '{}'; declare it with <Function name=\"{}\">",
                            site.function, site.function
                        ),
                    ),
                );
            }
        }
    }

    for function in registry.functions() {
        for helper in &function.uses {
            if registry.has_helper(helper) {
                continue;
            }
            let diagnostic = Diagnostic::error(
                function.origin.clone(),
                format!(
                    "function '{}' uses helper '{}', which is never declared with <Helper>",
                    function.id, helper
                ),
            );
            match documents.iter().position(|d| d.source.path == function.origin.file) {
                Some(index) => validation.fail(index, diagnostic),
                None => validation.diagnostics.push(diagnostic),
            }
        }
    }

    validation
}

fn check_spawns(
    index: usize,
    doc: &LoweredDocument,
    agents: &BTreeMap<&str, (&AgentDocument, &Location)>,
    strict: bool,
    validation: &mut Validation,
) {
    for site in &doc.spawn_sites {
        let Some((agent, agent_location)) = agents.get(site.agent.as_str()) else {
            debug!(agent = %site.agent, "spawn target is not compiled in this build");
            continue;
        };
        let Some(passed) = &site.inputs else {
            continue;
        };

        for input in agent.inputs.iter().filter(|i| i.required) {
            if passed.contains(&input.name) {
                continue;
            }
            let message = format!(
                "<SpawnAgent> of '{}' does not pass required input '{}'",
                site.agent, input.name
            );
            let mut diagnostic = if strict {
                Diagnostic::error(site.location.clone(), message)
            } else {
                Diagnostic::warning(site.location.clone(), message)
            };
            diagnostic = diagnostic.with_related(input.location.clone());
            if strict {
                validation.fail(index, diagnostic);
            } else {
                warn!(%diagnostic, "contract");
                validation.diagnostics.push(diagnostic);
            }
        }

        for name in passed {
            if agent.inputs.iter().any(|i| &i.name == name) {
                continue;
            }
            let diagnostic = Diagnostic::warning(
                site.location.clone(),
                format!("agent '{}' declares no input '{}'", site.agent, name),
            )
            .with_related((*agent_location).clone());
            warn!(%diagnostic, "contract");
            validation.diagnostics.push(diagnostic);
        }
    }
}

/// Errors for output paths produced by more than one document. Every
/// document involved fails.
pub fn check_output_paths(outputs: &[(usize, &Location, &[Artifact])]) -> Validation {
    let mut owners: BTreeMap<PathBuf, Vec<(usize, &Location)>> = BTreeMap::new();
    for (index, location, artifacts) in outputs {
        for artifact in artifacts.iter() {
            let entry = owners.entry(artifact.path().to_path_buf()).or_default();
            if !entry.iter().any(|(i, _)| i == index) {
                entry.push((*index, *location));
            }
        }
    }

    let mut validation = Validation::default();
    for (path, docs) in owners {
        if docs.len() < 2 {
            continue;
        }
        let first = docs[0].1;
        for (index, location) in &docs {
            let mut diagnostic = Diagnostic::error(
                (*location).clone(),
                format!("output path '{}' is produced by more than one document", path.display()),
            );
            if *location != first {
                diagnostic = diagnostic.with_related(first.clone());
            } else if let Some((_, other)) = docs.get(1) {
                diagnostic = diagnostic.with_related((*other).clone());
            }
            validation.fail(*index, diagnostic);
        }
    }
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn artifact(path: &str) -> Artifact {
        Artifact::Generated {
            path: PathBuf::from(path),
            content: String::new(),
        }
    }

    #[test]
    fn test_duplicate_output_paths_fail_both_documents() {
        let a = Location::file("a.quire");
        let b = Location::file("b.quire");
        let first = [artifact("commands/deploy.md")];
        let second = [artifact("commands/deploy.md"), artifact("commands/other.md")];
        let validation = check_output_paths(&[(0, &a, &first[..]), (1, &b, &second[..])]);
        assert_eq!(validation.failed, BTreeSet::from([0, 1]));
        assert_eq!(validation.diagnostics.len(), 2);
        assert_eq!(
            validation.diagnostics[1].related.as_ref().map(|l| l.file.as_path()),
            Some(Path::new("a.quire"))
        );
    }

    #[test]
    fn test_distinct_paths_pass() {
        let a = Location::file("a.quire");
        let first = [artifact("commands/a.md")];
        let second = [artifact("commands/b.md")];
        let validation = check_output_paths(&[(0, &a, &first[..]), (1, &a, &second[..])]);
        assert!(validation.failed.is_empty());
    }
}
