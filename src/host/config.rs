//! Engine configuration.
//!
//! Everything the document pipeline would otherwise pull from global
//! state (tool locations, version defaults, limits) lives here and is
//! passed in explicitly.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::utils::error::ConfigError;

/// Default maximum nesting of imports (import of an import of ...).
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 32;

/// Where the build tools live on this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Directory of the build engine binaries.
    pub bin_path: String,
    /// Directory of the default targets; falls back to `bin_path`.
    pub tools_path: Option<String>,
    /// Directory of installed SDKs, if any.
    pub sdks_path: Option<String>,
    /// Fallback search directories keyed by property name, e.g.
    /// `MSBuildExtensionsPath`. Each entry becomes a multi-valued property.
    pub search_paths: IndexMap<String, Vec<String>>,
}

/// Configuration for parsing documents and resolving their imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Deepest import nesting followed before giving up on a branch.
    pub max_import_depth: usize,
    /// Tools version assumed when the root element does not declare one.
    pub default_tools_version: String,
    /// Value of the `VisualStudioVersion` property.
    pub visual_studio_version: String,
    pub runtime: RuntimeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            default_tools_version: "2.0".to_string(),
            visual_studio_version: "15.0".to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Builder-style override of the import depth limit.
    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }
}
