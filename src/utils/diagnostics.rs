//! Diagnostics attached to parsed documents.
//!
//! Nothing in the import pipeline aborts a document. Failures are recorded
//! here with a severity and a source location and parsing carries on.

use std::fmt;

use msbuild_expr::{EvalError, SourceSpan};
use serde::{Serialize, Serializer};

use super::error::{ImportError, MarkupError};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticSeverity {
    /// Evaluation failed outright, e.g. a circular property definition.
    Error,
    /// Something was skipped, e.g. an import that could not be resolved.
    Warning,
    Info,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    MissingValue,
    UnresolvedImport,
    ImportParseFailed,
    CircularProperty,
    CircularImport,
    ImportDepthExceeded,
    MalformedDocument,
    FileSystem,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingValue => "missing value",
            DiagnosticKind::UnresolvedImport => "unresolved import",
            DiagnosticKind::ImportParseFailed => "import parse failed",
            DiagnosticKind::CircularProperty => "circular property",
            DiagnosticKind::CircularImport => "circular import",
            DiagnosticKind::ImportDepthExceeded => "import depth exceeded",
            DiagnosticKind::MalformedDocument => "malformed document",
            DiagnosticKind::FileSystem => "file system",
        }
    }
}

fn serialize_span<S: Serializer>(span: &Option<SourceSpan>, s: S) -> Result<S::Ok, S::Error> {
    match span {
        Some(span) => [span.start, span.end].serialize(s),
        None => s.serialize_none(),
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Byte range in `file` (or the owning document when `file` is unset).
    #[serde(serialize_with = "serialize_span")]
    pub span: Option<SourceSpan>,
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: DiagnosticSeverity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            span: None,
            file: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, kind, message)
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, kind, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Map an import failure to its diagnostic. Circular properties are
    /// errors; everything else only skips the import.
    pub fn from_import_error(err: &ImportError) -> Self {
        match err {
            ImportError::MissingValue => Self::warning(DiagnosticKind::MissingValue, "Empty value"),
            ImportError::Unresolved { .. } => {
                Self::warning(DiagnosticKind::UnresolvedImport, "Could not resolve import")
            }
            ImportError::Evaluation(EvalError::CircularReference { .. }) => {
                Self::error(DiagnosticKind::CircularProperty, err.to_string())
            }
            ImportError::CircularImport { .. } => {
                Self::warning(DiagnosticKind::CircularImport, err.to_string())
            }
            ImportError::DepthExceeded { .. } => {
                Self::warning(DiagnosticKind::ImportDepthExceeded, err.to_string())
            }
            ImportError::Fs(_) => Self::warning(DiagnosticKind::FileSystem, err.to_string()),
        }
    }

    /// A file that could not be parsed as markup.
    pub fn from_markup_error(kind: DiagnosticKind, err: &MarkupError) -> Self {
        Self::warning(kind, err.to_string()).with_span(SourceSpan::new(err.offset, err.offset))
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.kind.as_str(), self.message)?;
        if let Some(file) = &self.file {
            write!(f, " in {}", file)?;
        }
        Ok(())
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|nl| before[nl + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    (line, column)
}

/// Render diagnostics one per line, with positions when `source` is given.
pub fn format_diagnostics(diagnostics: &[Diagnostic], source: Option<&str>) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        match (source, diag.span, &diag.file) {
            (Some(text), Some(span), None) => {
                let (line, col) = line_col(text, span.start);
                out.push_str(&format!("{}:{}: {}\n", line, col, diag));
            }
            _ => out.push_str(&format!("{}\n", diag)),
        }
    }
    out
}
