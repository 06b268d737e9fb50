//! Import tree for display.
//!
//! Flattens a document's import declarations, and those of everything it
//! imports, into a tree. Consecutive imports from one wildcard declaration
//! are grouped under the pattern.

use serde::Serialize;

use super::document::BuildDocument;
use super::imports::ImportRecord;
use crate::host::fs::{normalize_path, normalize_separators};
use crate::host::runtime::RuntimeInformation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ImportTreeNode {
    Import {
        filename: String,
        /// `filename` with a known runtime directory replaced by its property.
        display: String,
        children: Vec<ImportTreeNode>,
    },
    Unresolved {
        original: String,
    },
    Group {
        pattern: String,
        children: Vec<ImportTreeNode>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportTree {
    pub roots: Vec<ImportTreeNode>,
}

impl ImportTree {
    pub fn build(document: &BuildDocument, shortener: &FilenameShortener) -> Self {
        Self {
            roots: nodes_for(document, shortener),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// One line per node, children indented by two spaces.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut pending: Vec<(usize, &ImportTreeNode)> = self.roots.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = pending.pop() {
            let indent = "  ".repeat(depth);
            let children = match node {
                ImportTreeNode::Import { display, children, .. } => {
                    out.push_str(&format!("{}{}\n", indent, display));
                    children
                }
                ImportTreeNode::Unresolved { original } => {
                    out.push_str(&format!("{}{} (unresolved)\n", indent, original));
                    continue;
                }
                ImportTreeNode::Group { pattern, children } => {
                    out.push_str(&format!("{}[{}]\n", indent, pattern));
                    children
                }
            };
            pending.extend(children.iter().rev().map(|n| (depth + 1, n)));
        }
        out
    }
}

fn nodes_for(document: &BuildDocument, shortener: &FilenameShortener) -> Vec<ImportTreeNode> {
    let mut nodes = Vec::new();
    // Index into `nodes` of the open wildcard group and its pattern.
    let mut group: Option<(usize, &str)> = None;

    for record in document.declarations() {
        if !record.is_wildcard() {
            group = None;
            nodes.push(node_for(document, record, shortener));
            continue;
        }

        if group.map(|(_, pattern)| pattern) != Some(record.original.as_str()) {
            nodes.push(ImportTreeNode::Group {
                pattern: record.original.clone(),
                children: Vec::new(),
            });
            group = if record.is_resolved() {
                Some((nodes.len() - 1, record.original.as_str()))
            } else {
                None
            };
            if !record.is_resolved() {
                continue;
            }
        }

        if let Some((index, _)) = group {
            let child = node_for(document, record, shortener);
            if let Some(ImportTreeNode::Group { children, .. }) = nodes.get_mut(index) {
                children.push(child);
            }
        }
    }
    nodes
}

fn node_for(document: &BuildDocument, record: &ImportRecord, shortener: &FilenameShortener) -> ImportTreeNode {
    let Some(filename) = &record.filename else {
        return ImportTreeNode::Unresolved {
            original: record.original.clone(),
        };
    };
    let children = document
        .imports()
        .get(filename)
        .map(|import| nodes_for(&import.document, shortener))
        .unwrap_or_default();
    ImportTreeNode::Import {
        filename: filename.clone(),
        display: shortener.display(filename),
        children,
    }
}

/// Replaces known runtime directories at the start of a path with the
/// property that names them.
#[derive(Debug, Clone, Default)]
pub struct FilenameShortener {
    /// (directory, property), longest directory first.
    prefixes: Vec<(String, String)>,
}

impl FilenameShortener {
    pub fn new(runtime: &dyn RuntimeInformation) -> Self {
        let mut shortener = Self::default();
        shortener.add("MSBuildBinPath", &runtime.bin_path());
        shortener.add("MSBuildToolsPath", &runtime.tools_path());
        if let Some(sdks) = runtime.sdks_path() {
            shortener.add("MSBuildSDKsPath", &sdks);
        }
        for (property, dirs) in runtime.search_paths() {
            for dir in dirs {
                shortener.add(&property, &dir);
            }
        }
        shortener
    }

    /// Register `dir` as the value of `property`. The first property
    /// registered for a directory is kept.
    pub fn add(&mut self, property: &str, dir: &str) {
        if dir.is_empty() {
            return;
        }
        let dir = normalize_path(&normalize_separators(dir));
        if self.prefixes.iter().any(|(d, _)| *d == dir) {
            return;
        }
        self.prefixes.push((dir, property.to_string()));
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Split `filename` into `$(Property)` and the rest of the path.
    pub fn shorten(&self, filename: &str) -> Option<(String, String)> {
        self.prefixes.iter().find_map(|(dir, property)| {
            let rest = filename.strip_prefix(dir.as_str())?;
            rest.starts_with(['/', '\\'])
                .then(|| (format!("$({})", property), rest.to_string()))
        })
    }

    pub fn display(&self, filename: &str) -> String {
        match self.shorten(filename) {
            Some((prefix, rest)) => format!("{}{}", prefix, rest),
            None => filename.to_string(),
        }
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use crate::host::config::RuntimeConfig;
    use crate::host::runtime::StaticRuntimeInformation;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shortener_prefers_longest_prefix() {
        let runtime = StaticRuntimeInformation::new(RuntimeConfig {
            bin_path: "/usr/lib/msbuild".to_string(),
            sdks_path: Some("/usr/lib/msbuild/Sdks".to_string()),
            ..RuntimeConfig::default()
        });
        let shortener = FilenameShortener::new(&runtime);
        assert_eq!(
            shortener.display("/usr/lib/msbuild/Sdks/Foo/Sdk.props"),
            "$(MSBuildSDKsPath)/Foo/Sdk.props"
        );
        assert_eq!(
            shortener.display("/usr/lib/msbuild/Common.targets"),
            "$(MSBuildBinPath)/Common.targets"
        );
        assert_eq!(shortener.shorten("/usr/lib/msbuildx/a.targets"), None);
    }
}
