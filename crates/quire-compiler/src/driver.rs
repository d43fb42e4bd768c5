/// Compiler driver that orchestrates the build pipeline
///
/// Phase 1 parses and lowers every document on the blocking pool, filling
/// the shared function registry. After the join barrier, cross-document
/// validation runs, then phase 2 emits every surviving document
/// concurrently. The bundler runs last. A failing document contributes
/// diagnostics and no artifacts; its siblings carry on.

use crate::bundle::{self, BundleStrategy, FunctionRegistry};
use crate::contract;
use crate::diagnostic::{Diagnostic, Location, SourceFile};
use crate::emit::{self, Artifact, DEFAULT_RUNTIME_ENTRY, EmitOptions, MarkdownRenderer};
use crate::error::{CompileError, Result};
use crate::ir::Document;
use crate::lower::{LoweredDocument, lower_document};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Input source files
    pub inputs: Vec<PathBuf>,
    /// Output directory; nothing is written when unset
    pub output_dir: Option<PathBuf>,
    /// Command prefix used for runtime function calls
    pub runtime_entry: String,
    pub bundle: BundleStrategy,
    /// Treat missing agent inputs as errors
    pub strict_contracts: bool,
    pub verbose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_dir: None,
            runtime_entry: DEFAULT_RUNTIME_ENTRY.to_string(),
            bundle: BundleStrategy::default(),
            strict_contracts: false,
            verbose: false,
        }
    }
}

impl CompileOptions {
    pub fn new<I, P>(inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn runtime_entry(mut self, entry: impl Into<String>) -> Self {
        self.runtime_entry = entry.into();
        self
    }

    pub fn bundle(mut self, strategy: BundleStrategy) -> Self {
        self.bundle = strategy;
        self
    }

    pub fn strict_contracts(mut self, strict: bool) -> Self {
        self.strict_contracts = strict;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One source document: where it came from and its text
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: PathBuf,
    pub text: String,
}

impl SourceInput {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Everything a build produced, sorted by path
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn artifact(&self, path: impl AsRef<Path>) -> Option<&Artifact> {
        let path = path.as_ref();
        self.artifacts.iter().find(|a| a.path() == path)
    }

    /// Content of a generated artifact
    pub fn content(&self, path: impl AsRef<Path>) -> Option<&str> {
        match self.artifact(path)? {
            Artifact::Generated { content, .. } => Some(content),
            Artifact::Copy { .. } => None,
        }
    }
}

/// A single build over an in-memory set of sources
pub struct Build {
    options: CompileOptions,
}

impl Build {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub async fn run(&self, sources: Vec<SourceInput>) -> BuildOutput {
        info!(documents = sources.len(), strategy = ?self.options.bundle, "starting build");
        let registry = Arc::new(FunctionRegistry::new());
        let mut diagnostics = Vec::new();

        // Phase 1: parse and lower
        let mut tasks = JoinSet::new();
        for (index, input) in sources.into_iter().enumerate() {
            let registry = Arc::clone(&registry);
            tasks.spawn_blocking(move || {
                let path = input.path.clone();
                (index, path, lower_source(input, &registry))
            });
        }
        let mut lowered: Vec<(usize, LoweredDocument)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(doc))) => lowered.push((index, doc)),
                Ok((_, path, Err(error))) => {
                    debug!(file = %path.display(), %error, "document failed");
                    diagnostics.push(Diagnostic::from_error(&path, &error));
                }
                Err(error) => diagnostics.push(task_failure(error)),
            }
        }
        lowered.sort_by_key(|(index, _)| *index);
        let documents: Vec<LoweredDocument> = lowered.into_iter().map(|(_, doc)| doc).collect();
        for doc in &documents {
            diagnostics.extend(doc.warnings.iter().cloned());
        }

        // Cross-document validation
        let validation = contract::validate(&documents, &registry, self.options.strict_contracts);
        diagnostics.extend(validation.diagnostics);
        let mut failed = validation.failed;

        // Phase 2: emit
        let documents: Vec<Arc<LoweredDocument>> = documents.into_iter().map(Arc::new).collect();
        let emit_options = Arc::new(EmitOptions {
            runtime_entry: self.options.runtime_entry.clone(),
        });
        let mut tasks = JoinSet::new();
        for (index, doc) in documents.iter().enumerate() {
            if failed.contains(&index) {
                continue;
            }
            let doc = Arc::clone(doc);
            let emit_options = Arc::clone(&emit_options);
            tasks.spawn_blocking(move || (index, emit::emit_document(&doc, &emit_options)));
        }
        let mut emitted: Vec<(usize, Vec<Artifact>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(artifacts))) => emitted.push((index, artifacts)),
                Ok((index, Err(error))) => {
                    failed.insert(index);
                    diagnostics.push(Diagnostic::from_error(&documents[index].source.path, &error));
                }
                Err(error) => diagnostics.push(task_failure(error)),
            }
        }
        emitted.sort_by_key(|(index, _)| *index);

        let outputs: Vec<(usize, &Location, &[Artifact])> = emitted
            .iter()
            .map(|(index, artifacts)| (*index, &documents[*index].location, artifacts.as_slice()))
            .collect();
        let collisions = contract::check_output_paths(&outputs);
        diagnostics.extend(collisions.diagnostics);
        failed.extend(collisions.failed);

        let mut artifacts: Vec<Artifact> = Vec::new();
        for (index, doc_artifacts) in emitted {
            if failed.contains(&index) {
                continue;
            }
            artifacts.extend(doc_artifacts);
        }

        match self.build_wide_artifacts(&documents, &failed, &registry) {
            Ok(extra) => artifacts.extend(extra),
            Err(error) => diagnostics.push(Diagnostic::error(
                Location::file(bundle::RUNTIME_DIR),
                error.to_string(),
            )),
        }
        diagnostics.extend(registry.conflict_diagnostics());

        artifacts.sort_by(|a, b| a.path().cmp(b.path()));
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics.dedup();

        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        if errors > 0 {
            warn!(errors, "build finished with errors");
        }
        if self.options.verbose {
            for artifact in &artifacts {
                info!(path = %artifact.path().display(), "generated");
            }
        }
        info!(
            artifacts = artifacts.len(),
            errors,
            warnings = diagnostics.len() - errors,
            "build finished"
        );
        BuildOutput {
            artifacts,
            diagnostics,
        }
    }

    /// Run on a fresh multi-threaded runtime
    pub fn run_blocking(&self, sources: Vec<SourceInput>) -> Result<BuildOutput> {
        let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
        Ok(runtime.block_on(self.run(sources)))
    }

    /// Orchestrator index and runtime bundle
    fn build_wide_artifacts(
        &self,
        documents: &[Arc<LoweredDocument>],
        failed: &BTreeSet<usize>,
        registry: &FunctionRegistry,
    ) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        let states: Vec<_> = documents
            .iter()
            .enumerate()
            .filter(|(index, _)| !failed.contains(index))
            .filter_map(|(_, doc)| match &doc.document {
                Document::State(state) => Some((state, &doc.location)),
                _ => None,
            })
            .collect();
        if !states.is_empty() {
            let renderer = MarkdownRenderer::new(&self.options.runtime_entry);
            artifacts.push(emit::state::orchestrator(&states, &renderer)?);
        }
        artifacts.extend(bundle::bundle(registry, self.options.bundle)?);
        Ok(artifacts)
    }
}

fn lower_source(input: SourceInput, registry: &FunctionRegistry) -> Result<LoweredDocument> {
    let source = Arc::new(SourceFile::new(input.path, input.text));
    let tree = quire_parser::parse(&source.text).map_err(|e| CompileError::Parse {
        location: source.locate(e.span()),
        message: e.to_string(),
    })?;
    lower_document(source, &tree, registry)
}

fn task_failure(error: tokio::task::JoinError) -> Diagnostic {
    Diagnostic::from_error(
        Path::new("<build>"),
        &CompileError::Task(error.to_string()),
    )
}

/// The Quire compiler: reads the configured inputs, builds them and writes
/// the artifacts
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Read every input. An unreadable file becomes an error diagnostic for
    /// that file; the remaining inputs are still returned.
    pub fn read_sources(&self) -> (Vec<SourceInput>, Vec<Diagnostic>) {
        let mut sources = Vec::new();
        let mut diagnostics = Vec::new();
        for path in &self.options.inputs {
            match read_source(path) {
                Ok(source) => sources.push(source),
                Err(error) => {
                    warn!(file = %path.display(), %error, "cannot read input");
                    diagnostics.push(Diagnostic::from_error(path, &error));
                }
            }
        }
        (sources, diagnostics)
    }

    /// Run the full pipeline. Artifacts of documents that compiled are
    /// written even when siblings failed.
    pub async fn compile(&self) -> BuildOutput {
        let (sources, read_failures) = self.read_sources();
        let mut output = Build::new(self.options.clone()).run(sources).await;
        output.diagnostics.extend(read_failures);
        if let Some(dir) = &self.options.output_dir {
            output.diagnostics.extend(write_artifacts(&output, dir));
        }
        output.diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        output
    }
}

fn read_source(path: &Path) -> Result<SourceInput> {
    if !path.exists() {
        return Err(CompileError::FileNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(SourceInput::new(path, text))
}

/// Write generated files and perform static copies under `dir`.
///
/// Every artifact is attempted; each failure is returned as an error
/// diagnostic located at the artifact's source (copies) or target path.
pub fn write_artifacts(output: &BuildOutput, dir: &Path) -> Vec<Diagnostic> {
    let mut failures = Vec::new();
    for artifact in &output.artifacts {
        let target = dir.join(artifact.path());
        match write_artifact(artifact, &target) {
            Ok(()) => debug!(path = %target.display(), "wrote artifact"),
            Err(error) => {
                warn!(path = %target.display(), %error, "cannot write artifact");
                let file = match artifact {
                    Artifact::Copy { from, .. } => from.as_path(),
                    Artifact::Generated { .. } => target.as_path(),
                };
                failures.push(Diagnostic::from_error(file, &error));
            }
        }
    }
    failures
}

fn write_artifact(artifact: &Artifact, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match artifact {
        Artifact::Generated { content, .. } => std::fs::write(target, content)?,
        Artifact::Copy { from, .. } => {
            if !from.exists() {
                return Err(CompileError::FileNotFound(from.clone()));
            }
            std::fs::copy(from, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = CompileOptions::new(["a.quire", "b.quire"])
            .output_dir(".claude")
            .bundle(BundleStrategy::CodeSplit)
            .strict_contracts(true);
        assert_eq!(options.inputs.len(), 2);
        assert_eq!(options.output_dir, Some(PathBuf::from(".claude")));
        assert_eq!(options.runtime_entry, DEFAULT_RUNTIME_ENTRY);
        assert!(options.strict_contracts);
    }

    #[test]
    fn test_missing_input_is_reported() {
        let compiler = Compiler::new(CompileOptions::new(["does/not/exist.quire"]));
        let (sources, diagnostics) = compiler.read_sources();
        assert!(sources.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].location.file, PathBuf::from("does/not/exist.quire"));
        assert!(diagnostics[0].message.contains("File not found"));
    }

    #[test]
    fn test_write_continues_after_failed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let output = BuildOutput {
            artifacts: vec![
                Artifact::Copy {
                    from: dir.path().join("gone.txt"),
                    to: PathBuf::from("skills/a/gone.txt"),
                },
                Artifact::Generated {
                    path: PathBuf::from("skills/a/SKILL.md"),
                    content: "body\n".to_string(),
                },
            ],
            diagnostics: Vec::new(),
        };
        let failures = write_artifacts(&output, &dir.path().join("out"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].location.file, dir.path().join("gone.txt"));
        assert!(dir.path().join("out/skills/a/SKILL.md").exists());
    }
}
