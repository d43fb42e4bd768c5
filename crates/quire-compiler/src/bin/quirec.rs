/// Quire compiler CLI

use anyhow::Context;
use clap::Parser;
use codespan_reporting::diagnostic::{Diagnostic as Report, Label, Severity as ReportSeverity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use quire_compiler::{
    Build, BundleStrategy, CompileOptions, Compiler, Diagnostic, ProjectConfig, Severity,
    SourceInput, write_artifacts,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quirec")]
#[command(about = "Quire compiler - turns component trees into agent commands, skills and runtime code")]
#[command(version)]
struct Args {
    /// Input Quire source files
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Output directory for generated files
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Project config file (defaults to ./quire.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat missing agent inputs as errors
    #[arg(long)]
    strict: bool,

    /// Split the runtime into per-document chunks
    #[arg(long)]
    code_split: bool,

    /// Command used to invoke runtime functions
    #[arg(long, value_name = "CMD")]
    runtime_entry: Option<String>,

    /// Print the parsed element tree and exit
    #[arg(long)]
    dump_ast: bool,

    /// Compile and report diagnostics without writing anything
    #[arg(long)]
    check: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored diagnostics
    #[arg(long)]
    no_color: bool,
}

/// Source texts registered with codespan, by path
struct SourceMap {
    files: SimpleFiles<String, String>,
    ids: HashMap<PathBuf, usize>,
}

impl SourceMap {
    fn new(sources: &[SourceInput]) -> Self {
        let mut files = SimpleFiles::new();
        let mut ids = HashMap::new();
        for source in sources {
            let id = files.add(source.path.display().to_string(), source.text.clone());
            ids.insert(source.path.clone(), id);
        }
        Self { files, ids }
    }

    fn id(&self, path: &Path) -> Option<usize> {
        self.ids.get(path).copied()
    }
}

fn report(
    writer: &StandardStream,
    config: &term::Config,
    map: &SourceMap,
    diagnostic: &Diagnostic,
) -> anyhow::Result<()> {
    let Some(file_id) = map.id(&diagnostic.location.file) else {
        eprintln!("{}", diagnostic);
        return Ok(());
    };
    let severity = match diagnostic.severity {
        Severity::Error => ReportSeverity::Error,
        Severity::Warning => ReportSeverity::Warning,
    };
    let span = diagnostic.location.span;
    let mut labels = vec![Label::primary(file_id, span.start..span.end)];
    let mut notes = Vec::new();
    if let Some(related) = &diagnostic.related {
        match map.id(&related.file) {
            Some(related_id) => labels.push(
                Label::secondary(related_id, related.span.start..related.span.end)
                    .with_message("declared here"),
            ),
            None => notes.push(format!("see {}", related)),
        }
    }
    let report = Report::new(severity)
        .with_message(&diagnostic.message)
        .with_labels(labels)
        .with_notes(notes);
    term::emit_to_write_style(&mut writer.lock(), config, &map.files, &report)
        .context("failed to render diagnostic")?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "quire_compiler=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn options_from(args: &Args) -> anyhow::Result<CompileOptions> {
    let mut options = CompileOptions::new(args.files.clone())
        .strict_contracts(args.strict)
        .verbose(args.verbose);
    if args.code_split {
        options = options.bundle(BundleStrategy::CodeSplit);
    }
    if let Some(output) = &args.output {
        options = options.output_dir(output);
    }

    let config = match &args.config {
        Some(path) => Some(ProjectConfig::load(path)?),
        None => ProjectConfig::discover(Path::new("."))?,
    };
    if let Some(config) = config {
        options = config.apply(options);
    }
    if let Some(entry) = &args.runtime_entry {
        options = options.runtime_entry(entry.clone());
    }
    if args.check {
        options.output_dir = None;
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = options_from(&args)?;
    if options.inputs.is_empty() {
        anyhow::bail!("no input files; pass them as arguments or list them in quire.toml");
    }
    if !args.check && !args.dump_ast && options.output_dir.is_none() {
        anyhow::bail!("no output directory; pass -o DIR, set output-dir in quire.toml or use --check");
    }

    let color = if args.no_color { ColorChoice::Never } else { ColorChoice::Auto };
    let writer = StandardStream::stderr(color);
    let config = term::Config::default();

    let compiler = Compiler::new(options);
    let (sources, read_failures) = compiler.read_sources();
    let map = SourceMap::new(&sources);
    for diagnostic in &read_failures {
        report(&writer, &config, &map, diagnostic)?;
    }

    if args.dump_ast {
        let mut failed = false;
        for source in &sources {
            match quire_parser::parse(&source.text) {
                Ok(tree) => {
                    println!("=== {} ===", source.path.display());
                    print!("{}", quire_parser::ast_dump::dump_tree(&tree));
                }
                Err(error) => {
                    failed = true;
                    let file = quire_compiler::SourceFile::new(source.path.clone(), source.text.clone());
                    let diagnostic = Diagnostic::error(file.locate(error.span()), error.to_string());
                    report(&writer, &config, &map, &diagnostic)?;
                }
            }
        }
        if failed || !read_failures.is_empty() {
            process::exit(1);
        }
        return Ok(());
    }

    let mut output = Build::new(compiler.options().clone()).run(sources).await;
    output.diagnostics.extend(read_failures);
    if let Some(dir) = &compiler.options().output_dir {
        let write_failures = write_artifacts(&output, dir);
        if args.verbose {
            eprintln!(
                "Wrote {} files to {}",
                output.artifacts.len() - write_failures.len(),
                dir.display()
            );
        }
        output.diagnostics.extend(write_failures);
    } else if args.check && !output.has_errors() {
        eprintln!("ok: {} files would be generated", output.artifacts.len());
    }

    output.diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    for diagnostic in &output.diagnostics {
        report(&writer, &config, &map, diagnostic)?;
    }

    if output.has_errors() {
        process::exit(1);
    }
    Ok(())
}
