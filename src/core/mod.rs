//! Document pipeline
//!
//! - `markup`: owned element tree parsed with quick-xml
//! - `language`: element resolution and the tree walker
//! - `resolve`: import path resolution
//! - `imports`: incremental import cache
//! - `document`: document generations
//! - `session`: atomic publishing of generations
//! - `navigator`: import tree for display

pub mod document;
pub mod imports;
pub mod language;
pub mod markup;
pub mod navigator;
pub mod resolve;
pub mod session;

pub use document::{BuildDocument, ParseEnvironment};
pub use imports::{
    resolve_import, ImportDeclaration, ImportMap, ImportOutcome, ImportRecord, ImportScope, ParsedImport,
};
pub use language::{walk, LanguageElement, ValueKind, VisitEvent};
pub use markup::{Annotations, Attribute, Element, MarkupDocument, NodeId};
pub use navigator::{FilenameShortener, ImportTree, ImportTreeNode};
pub use resolve::{is_wildcard, resolve_import_path, ImportTarget};
pub use session::DocumentSession;
