//! Incremental import cache.
//!
//! Every generation of a document owns an [`ImportMap`] from absolute path
//! to [`ParsedImport`]. While building the next generation, each import is
//! looked up in the previous generation's map first and reused when the
//! file's modification time is still the one recorded when it was parsed.
//! Only changed files are read and parsed again, and a file reached through
//! several imports of one generation is built once.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use msbuild_expr::SourceSpan;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::document::{BuildDocument, ParseEnvironment};
use super::markup::MarkupDocument;
use super::resolve::{resolve_import_path, ImportTarget};
use crate::host::fs::parent_dir;
use crate::host::runtime::{import_context, RuntimeEvaluationContext};
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind};
use crate::utils::error::{FsError, ImportError};

/// One imported file as parsed at `timestamp`. Never mutated; a changed
/// file produces a new value.
#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub filename: String,
    pub document: BuildDocument,
    /// Last write time of the file when it was read.
    pub timestamp: DateTime<Utc>,
}

/// Map key for an absolute path. Paths compare without case on Windows.
pub fn cache_key(filename: &str) -> Cow<'_, str> {
    if cfg!(windows) {
        Cow::Owned(filename.to_lowercase())
    } else {
        Cow::Borrowed(filename)
    }
}

/// Whether a file last written at `modified` is the one parsed at `stored`.
/// Any other time, earlier included, means the contents may differ.
pub fn is_unchanged(modified: DateTime<Utc>, stored: DateTime<Utc>) -> bool {
    modified == stored
}

/// Imports of one document generation, keyed by absolute path, in the
/// order they were first declared.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    entries: IndexMap<String, Arc<ParsedImport>>,
}

impl ImportMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<&Arc<ParsedImport>> {
        self.entries.get(cache_key(filename).as_ref())
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(cache_key(filename).as_ref())
    }

    pub fn insert(&mut self, import: Arc<ParsedImport>) {
        self.entries.insert(cache_key(&import.filename).into_owned(), import);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Arc<ParsedImport>)> {
        self.entries.values().map(|v| (v.filename.as_str(), v))
    }

    /// Filenames as first declared, not as keyed.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|v| v.filename.as_str())
    }
}

/// An import as written in a document, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    /// The raw `Project` attribute.
    pub original: String,
    /// The file it resolved to, if any.
    pub filename: Option<String>,
    #[serde(skip)]
    pub span: SourceSpan,
}

impl ImportRecord {
    pub fn is_resolved(&self) -> bool {
        self.filename.is_some()
    }

    pub fn is_wildcard(&self) -> bool {
        self.original.contains(['*', '?'])
    }
}

/// An import declaration about to be resolved.
#[derive(Debug, Clone, Copy)]
pub struct ImportDeclaration<'a> {
    /// The raw `Project` attribute, `None` when it is absent.
    pub project: Option<&'a str>,
    /// Where to report problems: the attribute value, or the tag.
    pub span: SourceSpan,
}

/// What happened to one file named by a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Already imported earlier in this generation.
    Duplicate,
    /// Already built through another import in this generation.
    Shared,
    /// Taken from the previous generation unchanged.
    Reused,
    /// Unchanged, but rebuilt because something it imports changed.
    Refreshed,
    /// Read and parsed from disk.
    Parsed,
}

/// State shared by every level of one reparse.
pub struct ImportScope<'e> {
    env: &'e ParseEnvironment,
    runtime: Arc<RuntimeEvaluationContext>,
    project_file: String,
    /// Files currently being parsed, outermost first.
    chain: Vec<String>,
    /// Imports built so far in this generation, by [`cache_key`].
    built: FxHashMap<String, Arc<ParsedImport>>,
}

impl<'e> ImportScope<'e> {
    pub fn new(env: &'e ParseEnvironment, project_file: &str, tools_version: &str) -> Self {
        let runtime = RuntimeEvaluationContext::new(
            env.runtime(),
            tools_version,
            &env.config().visual_studio_version,
        );
        Self {
            env,
            runtime: Arc::new(runtime),
            project_file: project_file.to_string(),
            chain: vec![project_file.to_string()],
            built: FxHashMap::default(),
        }
    }

    pub fn env(&self) -> &'e ParseEnvironment {
        self.env
    }

    /// The file whose declarations are being resolved.
    pub fn current_file(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or(&self.project_file)
    }

    /// How many imports deep the current file is; the project is depth 0.
    pub fn depth(&self) -> usize {
        self.chain.len().saturating_sub(1)
    }

    pub fn is_root(&self) -> bool {
        self.chain.len() <= 1
    }
}

/// Resolve one declaration of the current file into `imports`.
///
/// Failures never escape: they become diagnostics and the declaration is
/// skipped. Returns one record per file the declaration named, or a single
/// unresolved record.
pub fn resolve_import(
    previous: Option<&ImportMap>,
    declaration: &ImportDeclaration<'_>,
    imports: &mut ImportMap,
    scope: &mut ImportScope<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ImportRecord> {
    let original = declaration.project.unwrap_or_default().to_string();
    let unresolved = |original: String| ImportRecord {
        original,
        filename: None,
        span: declaration.span,
    };

    let target = {
        let current = scope.current_file().to_string();
        let ctx = import_context(scope.runtime.clone(), &current, &scope.project_file);
        let base = parent_dir(&current);
        resolve_import_path(&original, Some(base.as_str()), &ctx, scope.env.fs())
    };

    let target = match target {
        Ok(target) => target,
        Err(err) => {
            trace!(import = %original, error = %err, "import declaration skipped");
            diagnostics.push(Diagnostic::from_import_error(&err).with_span(declaration.span));
            return vec![unresolved(original)];
        }
    };

    if let ImportTarget::Wildcard { pattern, matches } = &target {
        if matches.is_empty() {
            trace!(pattern = %pattern, "wildcard import matched no files");
            return vec![unresolved(original)];
        }
    }

    let mut records = Vec::new();
    for filename in target.files() {
        match load_import(previous, filename, imports, scope) {
            Ok(outcome) => {
                trace!(file = %filename, ?outcome, "import resolved");
                records.push(ImportRecord {
                    original: original.clone(),
                    filename: Some(filename.clone()),
                    span: declaration.span,
                });
            }
            Err(err) => {
                trace!(file = %filename, error = %err, "import not loaded");
                diagnostics.push(Diagnostic::from_import_error(&err).with_span(declaration.span));
                records.push(unresolved(original.clone()));
            }
        }
    }
    records
}

fn load_import<'e>(
    previous: Option<&ImportMap>,
    filename: &str,
    imports: &mut ImportMap,
    scope: &mut ImportScope<'e>,
) -> Result<ImportOutcome, ImportError> {
    if imports.contains(filename) {
        return Ok(ImportOutcome::Duplicate);
    }
    let key = cache_key(filename);
    if scope.chain.iter().any(|f| cache_key(f) == key) {
        return Err(ImportError::CircularImport {
            path: filename.to_string(),
        });
    }
    let env = scope.env;
    let max_depth = env.config().max_import_depth;
    if scope.depth() >= max_depth {
        return Err(ImportError::DepthExceeded { max_depth });
    }
    if let Some(built) = scope.built.get(key.as_ref()) {
        imports.insert(built.clone());
        return Ok(ImportOutcome::Shared);
    }

    let fs = env.fs();
    let modified = fs.modified(filename)?;
    let cached = previous.and_then(|p| p.get(filename));

    if let Some(cached) = cached {
        if is_unchanged(modified, cached.timestamp) {
            if is_fresh(&cached.document, scope)? {
                debug!(file = %filename, "reusing cached import");
                remember(scope, cached);
                imports.insert(cached.clone());
                return Ok(ImportOutcome::Reused);
            }

            debug!(file = %filename, "nested imports changed, rebuilding import");
            let markup = cached.document.markup_arc();
            let document = nested(scope, filename, |scope| {
                BuildDocument::build(filename, markup, Vec::new(), Some(&cached.document), scope)
            });
            let import = Arc::new(ParsedImport {
                filename: filename.to_string(),
                document,
                timestamp: cached.timestamp,
            });
            remember(scope, &import);
            imports.insert(import);
            return Ok(ImportOutcome::Refreshed);
        }
    }

    debug!(file = %filename, "parsing import");
    let mut parse_diagnostics = Vec::new();
    let markup = match fs.read_text(filename) {
        Ok(text) => match MarkupDocument::parse(&text) {
            Ok(markup) => markup,
            Err(err) => {
                warn!(file = %filename, error = %err, "failed to parse import");
                parse_diagnostics.push(
                    Diagnostic::from_markup_error(DiagnosticKind::ImportParseFailed, &err)
                        .with_file(filename),
                );
                MarkupDocument::empty()
            }
        },
        Err(err) => {
            warn!(file = %filename, error = %err, "failed to read import");
            parse_diagnostics.push(
                Diagnostic::warning(DiagnosticKind::ImportParseFailed, err.to_string()).with_file(filename),
            );
            MarkupDocument::empty()
        }
    };

    let seed = cached.map(|c| &c.document);
    let document = nested(scope, filename, |scope| {
        BuildDocument::build(filename, Arc::new(markup), parse_diagnostics, seed, scope)
    });
    let import = Arc::new(ParsedImport {
        filename: filename.to_string(),
        document,
        timestamp: modified,
    });
    remember(scope, &import);
    imports.insert(import);
    Ok(ImportOutcome::Parsed)
}

/// Make `import` available to the rest of the generation, unless its tree
/// was cut short by the chain that reached it.
fn remember(scope: &mut ImportScope<'_>, import: &Arc<ParsedImport>) {
    let cut = import.document.all_diagnostics().iter().any(|d| {
        matches!(
            d.kind,
            DiagnosticKind::CircularImport | DiagnosticKind::ImportDepthExceeded
        )
    });
    if !cut {
        scope
            .built
            .insert(cache_key(&import.filename).into_owned(), import.clone());
    }
}

/// Run `f` with `filename` pushed on the active import chain.
fn nested<'e, T>(
    scope: &mut ImportScope<'e>,
    filename: &str,
    f: impl FnOnce(&mut ImportScope<'e>) -> T,
) -> T {
    scope.chain.push(filename.to_string());
    let result = f(scope);
    scope.chain.pop();
    result
}

/// Whether everything `document` imports, at any depth, still has the
/// modification time it was parsed at.
fn is_fresh(document: &BuildDocument, scope: &ImportScope<'_>) -> Result<bool, ImportError> {
    let fs = scope.env.fs();
    let mut pending: Vec<&BuildDocument> = vec![document];
    while let Some(doc) = pending.pop() {
        for (filename, import) in doc.imports().iter() {
            match fs.modified(filename) {
                Ok(modified) if is_unchanged(modified, import.timestamp) => pending.push(&import.document),
                Ok(_) => return Ok(false),
                Err(FsError::NotFound(_)) => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(true)
}
