//! Utility modules
//!
//! - Error types and result types
//! - Diagnostics and their formatting

pub mod diagnostics;
pub mod error;

// Re-export commonly used items
pub use diagnostics::{format_diagnostics, line_col, Diagnostic, DiagnosticKind, DiagnosticSeverity};
pub use error::{ConfigError, FsError, FsResult, ImportError, MarkupError};
