//! Build documents.
//!
//! A [`BuildDocument`] is one generation of a parsed file: its markup, the
//! imports it pulled in (recursively) and any diagnostics. Reparsing never
//! changes an existing generation; it builds a new one, handing the old one
//! in so unchanged imports can be reused.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fxhash::FxHasher64;
use msbuild_expr::{PropertyTable, SourceSpan};
use tracing::debug;

use super::imports::{resolve_import, ImportDeclaration, ImportMap, ImportRecord, ImportScope};
use super::language::{walk, LanguageElement, VisitEvent};
use super::markup::{Annotations, MarkupDocument, NodeId};
use crate::host::config::EngineConfig;
use crate::host::fs::{combine, normalize_path, normalize_separators, FileSystem, RealFileSystem};
use crate::host::runtime::{RuntimeInformation, StaticRuntimeInformation};
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSeverity};
use crate::utils::error::FsError;

/// Everything a parse needs from the outside world.
#[derive(Clone)]
pub struct ParseEnvironment {
    fs: Arc<dyn FileSystem>,
    runtime: Arc<dyn RuntimeInformation>,
    config: EngineConfig,
}

impl ParseEnvironment {
    pub fn new(fs: Arc<dyn FileSystem>, runtime: Arc<dyn RuntimeInformation>, config: EngineConfig) -> Self {
        Self { fs, runtime, config }
    }

    /// The real file system, with runtime information from `config`.
    pub fn from_config(config: EngineConfig) -> Self {
        let runtime = StaticRuntimeInformation::new(config.runtime.clone());
        Self::new(Arc::new(RealFileSystem::new()), Arc::new(runtime), config)
    }

    /// `fs` with runtime information from `config`.
    pub fn with_fs(fs: Arc<dyn FileSystem>, config: EngineConfig) -> Self {
        let runtime = StaticRuntimeInformation::new(config.runtime.clone());
        Self::new(fs, Arc::new(runtime), config)
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn runtime(&self) -> &dyn RuntimeInformation {
        self.runtime.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Absolute, normalized form of a document path.
    pub fn absolute_path(&self, filename: &str) -> String {
        let filename = normalize_separators(filename);
        let cwd = self.fs.current_dir().unwrap_or_default();
        normalize_path(&combine(&cwd, &filename))
    }
}

impl std::fmt::Debug for ParseEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseEnvironment")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct BuildDocument {
    filename: String,
    markup: Arc<MarkupDocument>,
    elements: Annotations<LanguageElement>,
    tools_version: String,
    imports: ImportMap,
    declarations: Vec<ImportRecord>,
    diagnostics: Vec<Diagnostic>,
}

impl BuildDocument {
    /// Parse `text` as the contents of `filename`.
    ///
    /// `previous` is the last generation of the same document, if any; its
    /// imports are reused where the files have not changed. A document that
    /// is not well-formed markup yields an empty tree and an error diagnostic.
    pub fn parse(
        filename: &str,
        text: &str,
        previous: Option<&BuildDocument>,
        env: &ParseEnvironment,
    ) -> BuildDocument {
        let filename = env.absolute_path(filename);
        let mut diagnostics = Vec::new();
        let markup = match MarkupDocument::parse(text) {
            Ok(markup) => markup,
            Err(err) => {
                diagnostics.push(Diagnostic {
                    severity: DiagnosticSeverity::Error,
                    ..Diagnostic::from_markup_error(DiagnosticKind::MalformedDocument, &err)
                });
                MarkupDocument::empty()
            }
        };

        let tools_version = root_tools_version(&markup)
            .unwrap_or_else(|| env.config().default_tools_version.clone());
        let mut scope = ImportScope::new(env, &filename, &tools_version);
        let document = BuildDocument::build(&filename, Arc::new(markup), diagnostics, previous, &mut scope);
        debug!(
            file = %document.filename,
            imports = document.imports.len(),
            diagnostics = document.diagnostics.len(),
            "document parsed"
        );
        document
    }

    /// Read and parse `filename` from the environment's file system.
    pub fn load(
        filename: &str,
        previous: Option<&BuildDocument>,
        env: &ParseEnvironment,
    ) -> Result<BuildDocument, FsError> {
        let path = env.absolute_path(filename);
        let text = env.fs().read_text(&path)?;
        Ok(Self::parse(&path, &text, previous, env))
    }

    /// Resolve the declarations in `markup` within `scope`, whose current
    /// file is `filename`.
    pub(crate) fn build(
        filename: &str,
        markup: Arc<MarkupDocument>,
        mut diagnostics: Vec<Diagnostic>,
        previous: Option<&BuildDocument>,
        scope: &mut ImportScope<'_>,
    ) -> BuildDocument {
        let tools_version = root_tools_version(&markup)
            .unwrap_or_else(|| scope.env().config().default_tools_version.clone());
        let is_root = scope.is_root();
        let previous_imports = previous.map(|p| &p.imports);

        let mut elements = Annotations::new();
        let mut imports = ImportMap::new();
        let mut declarations = Vec::new();
        let mut found = Vec::new();

        for event in walk(&markup, None) {
            match event {
                VisitEvent::ResolvedElement { id, resolved } => {
                    elements.insert(id, resolved);
                    if resolved == LanguageElement::Import {
                        found.push(id);
                    }
                }
                VisitEvent::UnknownElement { .. }
                | VisitEvent::ResolvedAttribute { .. }
                | VisitEvent::UnknownAttribute { .. }
                | VisitEvent::ElementValue { .. } => {}
            }
        }

        for id in found {
            let Some(element) = markup.get(id) else { continue };
            let attribute = element.attribute("Project");
            let declaration = ImportDeclaration {
                project: attribute.map(|a| a.value.as_str()),
                span: attribute.map(|a| a.value_span).unwrap_or(element.start_tag),
            };
            let mut found_diagnostics = Vec::new();
            let records = resolve_import(
                previous_imports,
                &declaration,
                &mut imports,
                scope,
                &mut found_diagnostics,
            );
            declarations.extend(records);
            diagnostics.extend(found_diagnostics.into_iter().map(|d| {
                if is_root || d.file.is_some() {
                    d
                } else {
                    d.with_file(filename)
                }
            }));
        }

        BuildDocument {
            filename: filename.to_string(),
            markup,
            elements,
            tools_version,
            imports,
            declarations,
            diagnostics,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn markup(&self) -> &MarkupDocument {
        &self.markup
    }

    pub(crate) fn markup_arc(&self) -> Arc<MarkupDocument> {
        Arc::clone(&self.markup)
    }

    /// The language element an element resolved to, if any.
    pub fn language_element(&self, id: NodeId) -> Option<LanguageElement> {
        self.elements.get(id).copied()
    }

    /// The root element's `ToolsVersion`, or the configured default.
    pub fn tools_version(&self) -> &str {
        &self.tools_version
    }

    pub fn imports(&self) -> &ImportMap {
        &self.imports
    }

    /// Import declarations in document order, resolved or not.
    pub fn declarations(&self) -> &[ImportRecord] {
        &self.declarations
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics of this document and, after them, of everything it
    /// imports. Each import is visited once.
    pub fn all_diagnostics(&self) -> Vec<&Diagnostic> {
        let mut all: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        let mut seen = std::collections::HashSet::new();
        let mut pending: Vec<&BuildDocument> = self.imports.iter().map(|(_, i)| &i.document).collect();
        pending.reverse();
        while let Some(doc) = pending.pop() {
            if !seen.insert(doc.filename.as_str()) {
                continue;
            }
            all.extend(doc.diagnostics.iter());
            pending.extend(doc.imports.iter().rev().map(|(_, i)| &i.document));
        }
        all
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Properties defined in this document's property groups.
    ///
    /// A property assigned several different values is multi-valued, in the
    /// order the values appear.
    pub fn properties(&self) -> PropertyTable {
        let mut table = PropertyTable::new();
        for event in walk(&self.markup, None) {
            if let VisitEvent::ElementValue {
                id,
                resolved: LanguageElement::Property,
                value,
                ..
            } = event
            {
                if let Some(element) = self.markup.get(id) {
                    table.append(element.name.as_str(), value.trim());
                }
            }
        }
        table
    }

    /// Span of the first element resolving to `element`.
    pub fn find_element(&self, element: LanguageElement) -> Option<(NodeId, SourceSpan)> {
        self.markup
            .iter()
            .find(|(id, _)| self.elements.get(*id) == Some(&element))
            .map(|(id, e)| (id, e.span))
    }

    /// Hash of the import forest's paths and timestamps. Equal hashes mean
    /// the same files at the same versions were imported.
    pub fn imports_hash(&self) -> u64 {
        let mut hasher = FxHasher64::default();
        let mut pending: Vec<(usize, &BuildDocument)> = vec![(0, self)];
        while let Some((depth, doc)) = pending.pop() {
            depth.hash(&mut hasher);
            for record in &doc.declarations {
                record.original.hash(&mut hasher);
                record.filename.hash(&mut hasher);
            }
            for (filename, import) in doc.imports.iter().rev() {
                filename.hash(&mut hasher);
                import.timestamp.timestamp_nanos_opt().hash(&mut hasher);
                pending.push((depth + 1, &import.document));
            }
        }
        hasher.finish()
    }
}

fn root_tools_version(markup: &MarkupDocument) -> Option<String> {
    markup
        .root_element()
        .and_then(|root| root.attribute_value("ToolsVersion"))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
