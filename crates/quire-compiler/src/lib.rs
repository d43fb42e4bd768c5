/// Quire compiler
///
/// Compiles Quire element trees into agent command Markdown, skills, MCP
/// configuration, state commands and a bundled JavaScript runtime.

pub mod bundle;
pub mod config;
pub mod contract;
pub mod diagnostic;
pub mod driver;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lower;

pub use bundle::{BundleStrategy, FunctionRegistry};
pub use config::ProjectConfig;
pub use diagnostic::{Diagnostic, Location, Severity, SourceFile};
pub use driver::{Build, BuildOutput, CompileOptions, Compiler, SourceInput, write_artifacts};
pub use emit::{Artifact, EmitOptions};
pub use error::{CompileError, Result};
pub use lower::{LoweredDocument, lower_document};
