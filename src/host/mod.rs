//! Host collaborators: file access, runtime information and configuration.

pub mod config;
pub mod fs;
pub mod runtime;

pub use config::{EngineConfig, RuntimeConfig, DEFAULT_MAX_IMPORT_DEPTH};
pub use fs::{combine, normalize_path, normalize_separators, parent_dir, FileSystem, MemoryFileSystem, RealFileSystem};
pub use runtime::{
    file_properties, import_context, to_msbuild_path, RuntimeEvaluationContext, RuntimeInformation,
    StaticRuntimeInformation,
};
