/// Source files, locations and build diagnostics

use crate::error::CompileError;
use quire_parser::{LineIndex, Span};
use std::fmt;
use std::path::{Path, PathBuf};

/// One source document as handed to the compiler
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    index: LineIndex,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self {
            path: path.into(),
            text,
            index,
        }
    }

    /// Resolve a span to a file/line/column location
    pub fn locate(&self, span: Span) -> Location {
        let (line, column) = self.index.location(&self.text, span.start);
        Location {
            file: self.path.clone(),
            line,
            column,
            span,
        }
    }

    /// Build group name: the file stem with anything non-identifier replaced
    pub fn group(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        let stem = stem.split('.').next().unwrap_or("main");
        stem.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

/// A position in a source file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

impl Location {
    /// Location for a whole file when no finer position exists
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            file: path.as_ref().to_path_buf(),
            line: 1,
            column: 1,
            span: Span::default(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// A reported problem. Cross-document diagnostics carry a `related` location
/// in the referenced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    pub related: Option<Location>,
}

impl Diagnostic {
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location,
            message: message.into(),
            related: None,
        }
    }

    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
            related: None,
        }
    }

    pub fn with_related(mut self, related: Location) -> Self {
        self.related = Some(related);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Convert a compile error into an error diagnostic for `file`
    pub fn from_error(file: &Path, error: &CompileError) -> Self {
        let location = error
            .location()
            .cloned()
            .unwrap_or_else(|| Location::file(file));
        Self::error(location, error.message())
    }

    /// Ordering key used to keep diagnostics deterministic
    pub fn sort_key(&self) -> (&Path, usize, usize, Severity, &str) {
        (
            self.location.file.as_path(),
            self.location.line,
            self.location.column,
            self.severity,
            self.message.as_str(),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", self.location, label, self.message)?;
        if let Some(related) = &self.related {
            write!(f, " (see {})", related)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_multiline() {
        let file = SourceFile::new("a.quire", "<Command>\n  <p/>\n</Command>");
        let loc = file.locate(Span::new(12, 16));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.to_string(), "a.quire:2:3");
    }

    #[test]
    fn test_group_from_stem() {
        let file = SourceFile::new("src/deploy-app.command.quire", "");
        assert_eq!(file.group(), "deploy_app");
    }

    #[test]
    fn test_diagnostic_display_with_related() {
        let diag = Diagnostic::warning(Location::file("a.quire"), "missing input 'topic'")
            .with_related(Location::file("b.quire"));
        assert_eq!(
            diag.to_string(),
            "a.quire:1:1: warning: missing input 'topic' (see b.quire:1:1)"
        );
    }
}
