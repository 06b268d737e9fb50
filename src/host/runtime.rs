//! Properties provided by the build runtime itself.
//!
//! Import paths in real projects are almost always rooted in a runtime
//! property such as `$(MSBuildExtensionsPath)` or `$(MSBuildBinPath)`.
//! This module turns a description of the installed runtime into an
//! [`EvaluationContext`] holding those properties, plus the reserved
//! per-file properties (`MSBuildThisFileDirectory`, ...).

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use msbuild_expr::{EvaluationContext, LayeredContext, PropertyTable, PropertyValue};

use super::config::RuntimeConfig;

/// Extension search path properties that may carry several directories.
const EXTENSIONS_PATH_PROPERTIES: [&str; 3] = [
    "MSBuildExtensionsPath",
    "MSBuildExtensionsPath32",
    "MSBuildExtensionsPath64",
];

/// Describes the installed build runtime.
pub trait RuntimeInformation: Send + Sync {
    fn bin_path(&self) -> String;
    fn tools_path(&self) -> String;
    fn sdks_path(&self) -> Option<String>;
    /// Fallback search directories keyed by property name.
    fn search_paths(&self) -> IndexMap<String, Vec<String>>;
}

/// Runtime information taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRuntimeInformation {
    config: RuntimeConfig,
}

impl StaticRuntimeInformation {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

impl RuntimeInformation for StaticRuntimeInformation {
    fn bin_path(&self) -> String {
        self.config.bin_path.clone()
    }

    fn tools_path(&self) -> String {
        self.config
            .tools_path
            .clone()
            .unwrap_or_else(|| self.config.bin_path.clone())
    }

    fn sdks_path(&self) -> Option<String> {
        self.config.sdks_path.clone()
    }

    fn search_paths(&self) -> IndexMap<String, Vec<String>> {
        self.config.search_paths.clone()
    }
}

/// Convert a host path to the build language's backslash form.
pub fn to_msbuild_path(path: &str) -> String {
    path.replace('/', "\\")
}

/// Properties built into the runtime.
#[derive(Debug, Clone, Default)]
pub struct RuntimeEvaluationContext {
    values: PropertyTable,
}

impl RuntimeEvaluationContext {
    pub fn new(
        runtime: &dyn RuntimeInformation,
        tools_version: &str,
        visual_studio_version: &str,
    ) -> Self {
        let bin_path = to_msbuild_path(&runtime.bin_path());
        let tools_path = to_msbuild_path(&runtime.tools_path());
        let search_paths = runtime.search_paths();

        let mut values = PropertyTable::new();
        for name in EXTENSIONS_PATH_PROPERTIES {
            let found = search_paths
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, dirs)| dirs);
            if let Some(value) = found
                .and_then(|dirs| PropertyValue::from_candidates(dirs.iter().map(|d| to_msbuild_path(d))))
            {
                values.define(name, value);
            }
        }

        values.define("MSBuildBinPath", bin_path.as_str());
        values.define("MSBuildToolsPath", tools_path.as_str());
        values.define("MSBuildToolsPath32", tools_path.as_str());
        values.define("MSBuildToolsPath64", tools_path.as_str());
        values.define("RoslynTargetsPath", format!("{}\\Roslyn", bin_path));
        values.define("MSBuildToolsVersion", tools_version);
        values.define("VisualStudioVersion", visual_studio_version);

        if let Some(sdks) = runtime.sdks_path() {
            values.define("MSBuildSDKsPath", to_msbuild_path(&sdks));
        }

        Self { values }
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.values
    }
}

impl EvaluationContext for RuntimeEvaluationContext {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        self.values.try_get_property(name)
    }
}

/// Reserved properties describing `this_file` (the file containing the
/// expression) and `project_file` (the root document).
pub fn file_properties(this_file: &str, project_file: &str) -> PropertyTable {
    let mut table = PropertyTable::new();
    describe_file(&mut table, "MSBuildThisFile", this_file);
    describe_file(&mut table, "MSBuildProject", project_file);

    let this_dir = directory_of(this_file);
    let no_root = this_dir
        .trim_start_matches(|c| c == '/' || c == '\\')
        .to_string();
    table.define("MSBuildThisFileDirectory", with_trailing_separator(&this_dir));
    table.define("MSBuildThisFileDirectoryNoRoot", with_trailing_separator(&no_root));
    table.define("MSBuildProjectDirectory", directory_of(project_file));
    table
}

/// The context used to evaluate import paths declared in `this_file`.
///
/// Properties defined by the documents themselves are not consulted.
pub fn import_context(
    runtime: Arc<RuntimeEvaluationContext>,
    this_file: &str,
    project_file: &str,
) -> LayeredContext {
    LayeredContext::with_base(runtime).layer(Arc::new(file_properties(this_file, project_file)))
}

fn describe_file(table: &mut PropertyTable, prefix: &str, path: &str) {
    let p = Path::new(path);
    let file = p.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = p.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = p
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();
    let (file_key, name_key) = if prefix == "MSBuildProject" {
        ("MSBuildProjectFile", "MSBuildProjectName")
    } else {
        ("MSBuildThisFile", "MSBuildThisFileName")
    };
    table.define(file_key, file);
    table.define(name_key, stem);
    table.define(format!("{}Extension", prefix), ext);
    table.define(format!("{}FullPath", prefix), to_msbuild_path(path));
}

fn directory_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| to_msbuild_path(&p.to_string_lossy()))
        .unwrap_or_default()
}

fn with_trailing_separator(dir: &str) -> String {
    if dir.is_empty() || dir.ends_with('\\') {
        dir.to_string()
    } else {
        format!("{}\\", dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msbuild_expr::EvaluationContextExt;

    fn runtime() -> StaticRuntimeInformation {
        let mut search_paths = IndexMap::new();
        search_paths.insert(
            "MSBuildExtensionsPath".to_string(),
            vec!["/usr/lib/xbuild".to_string(), "/opt/xbuild".to_string()],
        );
        StaticRuntimeInformation::new(RuntimeConfig {
            bin_path: "/usr/lib/msbuild/bin".to_string(),
            tools_path: None,
            sdks_path: Some("/usr/lib/sdks".to_string()),
            search_paths,
        })
    }

    #[test]
    fn test_runtime_properties() {
        let ctx = RuntimeEvaluationContext::new(&runtime(), "15.0", "15.0");
        assert_eq!(ctx.evaluate("$(MSBuildBinPath)").unwrap(), r"\usr\lib\msbuild\bin");
        assert_eq!(ctx.evaluate("$(MSBuildToolsPath64)").unwrap(), r"\usr\lib\msbuild\bin");
        assert_eq!(
            ctx.evaluate("$(RoslynTargetsPath)").unwrap(),
            r"\usr\lib\msbuild\bin\Roslyn"
        );
        assert_eq!(ctx.evaluate("$(MSBuildSDKsPath)").unwrap(), r"\usr\lib\sdks");
        assert_eq!(ctx.evaluate("$(MSBuildToolsVersion)").unwrap(), "15.0");
    }

    #[test]
    fn test_extensions_path_is_multi_valued() {
        let ctx = RuntimeEvaluationContext::new(&runtime(), "15.0", "15.0");
        let value = ctx.try_get_property("msbuildextensionspath").unwrap();
        assert_eq!(value.candidates(), [r"\usr\lib\xbuild", r"\opt\xbuild"]);
        assert!(ctx.try_get_property("MSBuildExtensionsPath32").is_none());

        let all = ctx
            .evaluate_permutations(r"$(MSBuildExtensionsPath)\a.targets")
            .unwrap()
            .to_vec();
        assert_eq!(all, [r"\usr\lib\xbuild\a.targets", r"\opt\xbuild\a.targets"]);
    }

    #[test]
    fn test_file_properties() {
        let table = file_properties("/src/build/common.props", "/src/app.csproj");
        assert_eq!(table.get("MSBuildThisFile").unwrap().first(), "common.props");
        assert_eq!(table.get("MSBuildThisFileName").unwrap().first(), "common");
        assert_eq!(table.get("MSBuildThisFileExtension").unwrap().first(), ".props");
        assert_eq!(
            table.get("MSBuildThisFileDirectory").unwrap().first(),
            r"\src\build\"
        );
        assert_eq!(table.get("MSBuildProjectName").unwrap().first(), "app");
        assert_eq!(table.get("MSBuildProjectDirectory").unwrap().first(), r"\src");
    }

    #[test]
    fn test_import_context_layers_file_over_runtime() {
        let rt = Arc::new(RuntimeEvaluationContext::new(&runtime(), "4.0", "15.0"));
        let ctx = import_context(rt, "/src/a.props", "/src/a.props");
        assert_eq!(
            ctx.evaluate(r"$(MSBuildThisFileDirectory)x.props").unwrap(),
            r"\src\x.props"
        );
        assert_eq!(ctx.evaluate("$(MSBuildToolsVersion)").unwrap(), "4.0");
    }
}
