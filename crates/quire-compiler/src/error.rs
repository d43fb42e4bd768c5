/// Error types for the Quire compiler

use crate::diagnostic::Location;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{location}: parse error: {message}")]
    Parse { location: Location, message: String },

    #[error("{location}: {message}")]
    Structural { location: Location, message: String },

    #[error("{location}: unsupported runtime expression: {message}")]
    Expression { location: Location, message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Configuration error in {file}: {message}")]
    Config { file: PathBuf, message: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Build task failed: {0}")]
    Task(String),
}

impl CompileError {
    pub fn structural(location: Location, message: impl Into<String>) -> Self {
        CompileError::Structural {
            location,
            message: message.into(),
        }
    }

    pub fn expression(location: Location, message: impl Into<String>) -> Self {
        CompileError::Expression {
            location,
            message: message.into(),
        }
    }

    /// Primary source location, when the error has one
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::Parse { location, .. }
            | CompileError::Structural { location, .. }
            | CompileError::Expression { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Message without the location prefix
    pub fn message(&self) -> String {
        match self {
            CompileError::Parse { message, .. }
            | CompileError::Structural { message, .. } => message.clone(),
            CompileError::Expression { message, .. } => {
                format!("unsupported runtime expression: {}", message)
            }
            other => other.to_string(),
        }
    }
}
