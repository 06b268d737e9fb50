//! Build file evaluation
//!
//! Evaluates `$(Name)` property expressions and resolves the import graph
//! of build description files, reparsing only what changed.
//!
//! ```text
//!   text ──► MarkupDocument ──► walk ──► Import declarations
//!                                              │
//!                       RuntimeEvaluationContext (+ file properties)
//!                                              │
//!                                   resolve_import_path
//!                                              │
//!           previous ImportMap ──► resolve_import ──► ImportMap ──► BuildDocument
//! ```
//!
//! The expression engine itself lives in the `msbuild-expr` crate and is
//! re-exported as [`expr`].
//!
//! # Example
//!
//! ```
//! use msbuild_eval::{evaluate_expression, PropertyTable};
//!
//! let mut props = PropertyTable::new();
//! props.define("Configuration", "Debug");
//! props.define("OutputPath", r"bin\$(Configuration)");
//! assert_eq!(evaluate_expression(r"$(OutputPath)\app.dll", &props).unwrap(), r"bin\Debug\app.dll");
//! ```

pub mod core;
pub mod host;
pub mod utils;

pub use msbuild_expr as expr;
pub use msbuild_expr::{
    EvalError, EvalResult, EvaluationContext, EvaluationContextExt, Expression, LayeredContext,
    PropertyTable, PropertyValue,
};

pub use crate::core::{
    BuildDocument, DocumentSession, FilenameShortener, ImportMap, ImportRecord, ImportTree,
    ParseEnvironment, ParsedImport,
};
pub use host::{EngineConfig, FileSystem, MemoryFileSystem, RealFileSystem, RuntimeConfig};
pub use utils::{format_diagnostics, Diagnostic, DiagnosticKind, DiagnosticSeverity};

/// Scalar evaluation of `text` against `ctx`.
pub fn evaluate_expression<C>(text: &str, ctx: &C) -> EvalResult<String>
where
    C: EvaluationContext + ?Sized,
{
    msbuild_expr::evaluate_str(text, ctx)
}

/// Every value `text` can take against `ctx`, collected.
pub fn expand_permutations<C>(text: &str, ctx: &C) -> EvalResult<Vec<String>>
where
    C: EvaluationContext + ?Sized,
{
    Ok(msbuild_expr::evaluate_permutations_str(text, ctx)?.to_vec())
}

/// Read and parse a document from disk with `config`.
pub fn load_document(path: &str, config: EngineConfig) -> Result<BuildDocument, utils::FsError> {
    let env = ParseEnvironment::from_config(config);
    BuildDocument::load(path, None, &env)
}
