//! Error types for file access, markup parsing, import resolution and
//! configuration.

use msbuild_expr::EvalError;
use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem access error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// File not found.
    #[error("file not found: {0}")]
    NotFound(String),
    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Any other I/O failure.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl FsError {
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_string()),
            _ => FsError::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// A document's markup could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed markup at byte {offset}: {message}")]
pub struct MarkupError {
    pub message: String,
    /// Byte offset where the parser gave up.
    pub offset: usize,
}

impl MarkupError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Why a single import declaration produced no import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The declaration's path expression is empty or whitespace.
    #[error("empty import value")]
    MissingValue,
    /// The evaluated path does not name an existing file.
    #[error("could not resolve import '{path}'")]
    Unresolved { path: String },
    /// The path expression could not be evaluated.
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    /// The file is already being imported further up the chain.
    #[error("circular import of '{path}'")]
    CircularImport { path: String },
    /// Nested imports went deeper than the configured limit.
    #[error("import depth exceeded maximum ({max_depth})")]
    DepthExceeded { max_depth: usize },
    /// The filesystem refused a query other than "not found".
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
