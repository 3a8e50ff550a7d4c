use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("unknown dataset id: {0}")]
    #[diagnostic(help("run with --list to see the available datasets"))]
    UnknownDataset(String),

    #[error("invalid run accession: {0}")]
    InvalidRunAccession(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
