//! Gate-level error taxonomy.
//!
//! Only invocation-fatal conditions live here. A failing check (missing
//! files, spec drift, generator exit code) is a [`crate::CheckOutcome`],
//! never an error.

use crate::source::SourceError;
use crate::workspace::WorkspaceError;

/// Errors that abort a gate invocation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid gate request: {0}")]
    InvalidRequest(String),

    #[error("package source error: {0}")]
    Source(#[from] SourceError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("invalid provenance pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
