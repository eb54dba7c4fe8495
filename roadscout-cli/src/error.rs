//! CLI error type.

use std::path::PathBuf;

/// Errors surfaced to the terminal.
#[derive(Debug)]
pub enum CliError {
    /// Failed to read an input file.
    ReadFailed { path: PathBuf, source: std::io::Error },

    /// Failed to parse the roads definitions file.
    ParseFailed { path: PathBuf, reason: String },

    /// Failed to write an output file.
    WriteFailed { path: PathBuf, source: std::io::Error },

    /// Failed to construct the HTTP transport.
    Transport(String),

    /// Cache maintenance failed.
    Cache(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::ParseFailed { path, reason } => {
                write!(f, "failed to parse {}: {}", path.display(), reason)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Cache(msg) => write!(f, "cache error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } | Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
