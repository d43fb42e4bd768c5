/// Project configuration
///
/// An optional `quire.toml` supplies the same settings as the command line.
/// Flags given on the command line override values from the file.

use crate::bundle::BundleStrategy;
use crate::driver::CompileOptions;
use crate::error::{CompileError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "quire.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Source files, relative to the config file
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub runtime_entry: Option<String>,
    #[serde(default)]
    pub code_split: bool,
    #[serde(default)]
    pub strict_contracts: bool,
    /// Directory holding the config file; inputs and output resolve against it
    #[serde(skip)]
    pub root: PathBuf,
}

impl ProjectConfig {
    /// Load a config file. Returns an error if it is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompileError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content).map_err(|message| CompileError::Config {
            file: path.to_path_buf(),
            message,
        })?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// `quire.toml` in `dir` when present
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Fill options from this file. Inputs are taken only when the options
    /// have none; booleans are enabled if either side enables them.
    pub fn apply(&self, mut options: CompileOptions) -> CompileOptions {
        if options.inputs.is_empty() {
            options.inputs = self.inputs.iter().map(|p| self.root.join(p)).collect();
        }
        if options.output_dir.is_none() {
            options.output_dir = self.output_dir.as_ref().map(|p| self.root.join(p));
        }
        if let Some(entry) = &self.runtime_entry {
            options.runtime_entry = entry.clone();
        }
        if self.code_split {
            options.bundle = BundleStrategy::CodeSplit;
        }
        options.strict_contracts |= self.strict_contracts;
        options
    }
}
