//! Import resolution and incremental reparse tests against an in-memory
//! file system.

#![cfg(not(windows))]

use std::sync::Arc;

use chrono::Duration;
use indexmap::IndexMap;
use msbuild_eval::core::{ImportTreeNode, LanguageElement};
use msbuild_eval::{
    BuildDocument, DiagnosticKind, DiagnosticSeverity, EngineConfig, EvaluationContextExt,
    FilenameShortener, ImportTree, MemoryFileSystem, ParseEnvironment, RuntimeConfig,
};
use pretty_assertions::assert_eq;

const ROOT: &str = "/proj/app.proj";

fn config() -> EngineConfig {
    let mut search_paths = IndexMap::new();
    search_paths.insert(
        "MSBuildExtensionsPath".to_string(),
        vec!["/ext/one".to_string(), "/ext/two".to_string()],
    );
    EngineConfig {
        runtime: RuntimeConfig {
            bin_path: "/msbuild/bin".to_string(),
            tools_path: None,
            sdks_path: None,
            search_paths,
        },
        ..EngineConfig::default()
    }
}

fn setup() -> (Arc<MemoryFileSystem>, ParseEnvironment) {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.write_file(
        "/msbuild/bin/Common.targets",
        r#"<Project><PropertyGroup><Common>yes</Common></PropertyGroup></Project>"#,
    );
    fs.write_file("/proj/a.props", r#"<Project><Import Project="nested.props" /></Project>"#);
    fs.write_file("/proj/nested.props", "<Project />");
    fs.write_file("/proj/b.props", "<Project />");
    let env = ParseEnvironment::with_fs(fs.clone(), config());
    (fs, env)
}

const PROJECT: &str = r#"<Project ToolsVersion="15.0">
  <Import Project="a.props" />
  <Import Project="b.props" />
  <Import Project="$(MSBuildBinPath)\Common.targets" />
</Project>"#;

fn import_files(doc: &BuildDocument) -> Vec<String> {
    doc.imports().filenames().map(str::to_string).collect()
}

#[test]
fn test_resolves_imports_in_declaration_order() {
    let (_fs, env) = setup();
    let doc = BuildDocument::parse(ROOT, PROJECT, None, &env);

    assert_eq!(doc.filename(), ROOT);
    assert_eq!(doc.tools_version(), "15.0");
    assert!(doc.diagnostics().is_empty(), "{:?}", doc.diagnostics());
    assert_eq!(
        import_files(&doc),
        ["/proj/a.props", "/proj/b.props", "/msbuild/bin/Common.targets"]
    );

    let a = doc.imports().get("/proj/a.props").unwrap();
    assert_eq!(import_files(&a.document), ["/proj/nested.props"]);
}

#[test]
fn test_reparse_without_changes_reads_nothing() {
    let (fs, env) = setup();
    let first = BuildDocument::parse(ROOT, PROJECT, None, &env);
    let reads = fs.total_reads();
    assert_eq!(reads, 4);

    let second = BuildDocument::parse(ROOT, PROJECT, Some(&first), &env);
    assert_eq!(fs.total_reads(), reads);
    for (filename, import) in first.imports().iter() {
        assert!(Arc::ptr_eq(import, second.imports().get(filename).unwrap()));
    }
    assert_eq!(first.imports_hash(), second.imports_hash());
}

#[test]
fn test_touching_one_import_reparses_only_it() {
    let (fs, env) = setup();
    let first = BuildDocument::parse(ROOT, PROJECT, None, &env);

    fs.touch("/proj/b.props").unwrap();
    let second = BuildDocument::parse(ROOT, PROJECT, Some(&first), &env);

    assert_eq!(fs.read_count("/proj/b.props"), 2);
    assert_eq!(fs.read_count("/proj/a.props"), 1);
    assert_eq!(fs.read_count("/msbuild/bin/Common.targets"), 1);

    let reused = |path: &str| {
        Arc::ptr_eq(
            first.imports().get(path).unwrap(),
            second.imports().get(path).unwrap(),
        )
    };
    assert!(reused("/proj/a.props"));
    assert!(reused("/msbuild/bin/Common.targets"));
    assert!(!reused("/proj/b.props"));
    assert_ne!(first.imports_hash(), second.imports_hash());
}

#[test]
fn test_touching_nested_import_refreshes_parent_without_reading_it() {
    let (fs, env) = setup();
    let first = BuildDocument::parse(ROOT, PROJECT, None, &env);

    fs.touch("/proj/nested.props").unwrap();
    let second = BuildDocument::parse(ROOT, PROJECT, Some(&first), &env);

    assert_eq!(fs.read_count("/proj/nested.props"), 2);
    assert_eq!(fs.read_count("/proj/a.props"), 1);

    let old_a = first.imports().get("/proj/a.props").unwrap();
    let new_a = second.imports().get("/proj/a.props").unwrap();
    assert!(!Arc::ptr_eq(old_a, new_a));
    assert_eq!(old_a.timestamp, new_a.timestamp);
    assert!(
        new_a.document.imports().get("/proj/nested.props").unwrap().timestamp
            > old_a.document.imports().get("/proj/nested.props").unwrap().timestamp
    );
}

#[test]
fn test_import_restored_with_older_mtime_is_read_again() {
    let (fs, env) = setup();
    fs.write_file(
        "/proj/v.props",
        "<Project><PropertyGroup><V>old</V></PropertyGroup></Project>",
    );
    let text = r#"<Project><Import Project="v.props" /></Project>"#;
    let first = BuildDocument::parse(ROOT, text, None, &env);
    let stored = first.imports().get("/proj/v.props").unwrap().timestamp;

    fs.write_file(
        "/proj/v.props",
        "<Project><PropertyGroup><V>new</V></PropertyGroup></Project>",
    );
    fs.set_modified("/proj/v.props", stored - Duration::seconds(10)).unwrap();
    let second = BuildDocument::parse(ROOT, text, Some(&first), &env);

    assert_eq!(fs.read_count("/proj/v.props"), 2);
    let v = second.imports().get("/proj/v.props").unwrap();
    assert_eq!(v.timestamp, stored - Duration::seconds(10));
    assert_eq!(v.document.properties().evaluate("$(V)").unwrap(), "new");
}

#[test]
fn test_nested_import_with_older_mtime_refreshes_parent() {
    let (fs, env) = setup();
    let first = BuildDocument::parse(ROOT, PROJECT, None, &env);
    let old_a = first.imports().get("/proj/a.props").unwrap();
    let stored = old_a.document.imports().get("/proj/nested.props").unwrap().timestamp;

    fs.set_modified("/proj/nested.props", stored - Duration::seconds(1)).unwrap();
    let second = BuildDocument::parse(ROOT, PROJECT, Some(&first), &env);

    assert_eq!(fs.read_count("/proj/nested.props"), 2);
    assert_eq!(fs.read_count("/proj/a.props"), 1);
    assert!(!Arc::ptr_eq(old_a, second.imports().get("/proj/a.props").unwrap()));
}

#[test]
fn test_import_reached_twice_is_built_once() {
    let (fs, env) = setup();
    fs.write_file("/proj/left.props", r#"<Project><Import Project="common.props" /></Project>"#);
    fs.write_file("/proj/right.props", r#"<Project><Import Project="common.props" /></Project>"#);
    fs.write_file("/proj/common.props", "<Project />");

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project><Import Project="left.props" /><Import Project="right.props" /></Project>"#,
        None,
        &env,
    );
    assert!(doc.all_diagnostics().is_empty());
    assert_eq!(fs.read_count("/proj/common.props"), 1);

    let common = |parent: &str| {
        doc.imports().get(parent).unwrap().document.imports().get("/proj/common.props").unwrap().clone()
    };
    assert!(Arc::ptr_eq(&common("/proj/left.props"), &common("/proj/right.props")));
}

#[test]
fn test_duplicate_declarations_share_one_entry() {
    let (fs, env) = setup();
    let text = r#"<Project>
  <Import Project="b.props" />
  <Import Project="./b.props" />
  <ImportGroup><Import Project="sub\..\b.props" /></ImportGroup>
</Project>"#;
    let doc = BuildDocument::parse(ROOT, text, None, &env);

    assert_eq!(import_files(&doc), ["/proj/b.props"]);
    assert_eq!(doc.declarations().len(), 3);
    assert!(doc.declarations().iter().all(|d| d.is_resolved()));
    assert_eq!(fs.read_count("/proj/b.props"), 1);
}

#[test]
fn test_missing_and_unresolved_imports_are_warnings() {
    let (_fs, env) = setup();
    let text = r#"<Project>
  <Import Project="" />
  <Import />
  <Import Project="$(Nope)missing.props" />
  <Import Project="b.props" />
</Project>"#;
    let doc = BuildDocument::parse(ROOT, text, None, &env);

    let kinds: Vec<_> = doc.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        [
            DiagnosticKind::MissingValue,
            DiagnosticKind::MissingValue,
            DiagnosticKind::UnresolvedImport
        ]
    );
    assert!(doc
        .diagnostics()
        .iter()
        .all(|d| d.severity == DiagnosticSeverity::Warning && d.span.is_some()));
    assert_eq!(doc.diagnostics()[2].message, "Could not resolve import");
    let span = doc.diagnostics()[2].span.unwrap();
    assert_eq!(span.extract(text), Some("$(Nope)missing.props"));

    assert_eq!(import_files(&doc), ["/proj/b.props"]);
    assert!(!doc.has_errors());
}

#[test]
fn test_circular_property_in_import_path_is_an_error() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut config = config();
    config.runtime.search_paths.insert(
        "MSBuildExtensionsPath".to_string(),
        vec!["$(MSBuildExtensionsPath32)".to_string()],
    );
    config.runtime.search_paths.insert(
        "MSBuildExtensionsPath32".to_string(),
        vec!["$(MSBuildExtensionsPath)".to_string()],
    );
    let env = ParseEnvironment::with_fs(fs, config);

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project><Import Project="$(MSBuildExtensionsPath)\x.targets" /></Project>"#,
        None,
        &env,
    );
    assert!(doc.has_errors());
    assert_eq!(doc.diagnostics()[0].kind, DiagnosticKind::CircularProperty);
    assert!(doc.diagnostics()[0].message.contains("circular reference"));
    assert!(doc.imports().is_empty());
}

#[test]
fn test_circular_imports_are_cut() {
    let (fs, env) = setup();
    fs.write_file("/proj/x.props", r#"<Project><Import Project="y.props" /></Project>"#);
    fs.write_file("/proj/y.props", r#"<Project><Import Project="x.props" /></Project>"#);
    fs.write_file(ROOT, "<Project />");

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project><Import Project="x.props" /><Import Project="app.proj" /></Project>"#,
        None,
        &env,
    );

    let kinds: Vec<_> = doc.all_diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, [DiagnosticKind::CircularImport, DiagnosticKind::CircularImport]);

    let y = &doc.imports().get("/proj/x.props").unwrap().document;
    let y = &y.imports().get("/proj/y.props").unwrap().document;
    assert!(y.imports().is_empty());
    assert_eq!(y.diagnostics()[0].file.as_deref(), Some("/proj/y.props"));
}

#[test]
fn test_import_depth_is_limited() {
    let fs = Arc::new(MemoryFileSystem::new());
    for i in 0..5 {
        fs.write_file(
            format!("/proj/{}.props", i),
            format!(r#"<Project><Import Project="{}.props" /></Project>"#, i + 1),
        );
    }
    fs.write_file("/proj/5.props", "<Project />");
    let env = ParseEnvironment::with_fs(fs, config().with_max_import_depth(2));

    let doc = BuildDocument::parse(ROOT, r#"<Project><Import Project="0.props" /></Project>"#, None, &env);
    let all = doc.all_diagnostics();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind, DiagnosticKind::ImportDepthExceeded);
    assert_eq!(all[0].file.as_deref(), Some("/proj/1.props"));
}

#[test]
fn test_broken_import_is_cached_until_it_changes() {
    let (fs, env) = setup();
    fs.write_file("/proj/broken.props", "<Project><PropertyGroup></Project>");
    let text = r#"<Project><Import Project="broken.props" /><Import Project="b.props" /></Project>"#;

    let first = BuildDocument::parse(ROOT, text, None, &env);
    let broken = first.imports().get("/proj/broken.props").unwrap();
    assert!(broken.document.markup().is_empty());
    assert_eq!(broken.document.diagnostics()[0].kind, DiagnosticKind::ImportParseFailed);
    assert!(!first.has_errors());
    assert_eq!(import_files(&first), ["/proj/broken.props", "/proj/b.props"]);

    let second = BuildDocument::parse(ROOT, text, Some(&first), &env);
    assert_eq!(fs.read_count("/proj/broken.props"), 1);

    fs.write_file("/proj/broken.props", "<Project />");
    let third = BuildDocument::parse(ROOT, text, Some(&second), &env);
    assert_eq!(fs.read_count("/proj/broken.props"), 2);
    assert!(third.all_diagnostics().is_empty());
}

#[test]
fn test_wildcard_imports() {
    let (fs, env) = setup();
    fs.write_file("/proj/ext/one.props", "<Project />");
    fs.write_file("/proj/ext/two.props", "<Project />");
    fs.write_file("/proj/ext/skip.targets", "<Project />");

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project><Import Project="ext\*.props" /><Import Project="none\*.props" /></Project>"#,
        None,
        &env,
    );
    assert!(doc.diagnostics().is_empty());
    assert_eq!(import_files(&doc), ["/proj/ext/one.props", "/proj/ext/two.props"]);

    let tree = ImportTree::build(&doc, &FilenameShortener::default());
    assert_eq!(
        tree.roots,
        [
            ImportTreeNode::Group {
                pattern: r"ext\*.props".to_string(),
                children: vec![
                    ImportTreeNode::Import {
                        filename: "/proj/ext/one.props".to_string(),
                        display: "/proj/ext/one.props".to_string(),
                        children: vec![],
                    },
                    ImportTreeNode::Import {
                        filename: "/proj/ext/two.props".to_string(),
                        display: "/proj/ext/two.props".to_string(),
                        children: vec![],
                    },
                ],
            },
            ImportTreeNode::Group {
                pattern: r"none\*.props".to_string(),
                children: vec![],
            },
        ]
    );
}

#[test]
fn test_import_tree_render() {
    let (_fs, env) = setup();
    let text = r#"<Project>
  <Import Project="a.props" />
  <Import Project="gone.props" />
  <Import Project="$(MSBuildBinPath)\Common.targets" />
</Project>"#;
    let doc = BuildDocument::parse(ROOT, text, None, &env);
    let tree = ImportTree::build(&doc, &FilenameShortener::new(env.runtime()));
    assert_eq!(
        tree.render(),
        "/proj/a.props\n  /proj/nested.props\ngone.props (unresolved)\n$(MSBuildBinPath)/Common.targets\n"
    );
}

#[test]
fn test_tools_version_and_file_properties_in_paths() {
    let (fs, env) = setup();
    fs.write_file("/proj/4.0/tv.props", "<Project />");
    fs.write_file("/proj/app.proj.user", "<Project />");

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project ToolsVersion="4.0">
  <Import Project="$(MSBuildToolsVersion)/tv.props" />
  <Import Project="$(MSBuildThisFileDirectory)$(MSBuildThisFile).user" />
</Project>"#,
        None,
        &env,
    );
    assert!(doc.diagnostics().is_empty(), "{:?}", doc.diagnostics());
    assert_eq!(import_files(&doc), ["/proj/4.0/tv.props", "/proj/app.proj.user"]);

    let default = BuildDocument::parse(ROOT, "<Project />", None, &env);
    assert_eq!(default.tools_version(), "2.0");
}

#[test]
fn test_import_paths_use_first_extensions_candidate() {
    let (fs, env) = setup();
    fs.write_file("/ext/one/x.targets", "<Project />");
    fs.write_file("/ext/two/x.targets", "<Project />");

    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project><Import Project="$(MSBuildExtensionsPath)\x.targets" /></Project>"#,
        None,
        &env,
    );
    assert_eq!(import_files(&doc), ["/ext/one/x.targets"]);
}

#[test]
fn test_malformed_root_document() {
    let (_fs, env) = setup();
    let doc = BuildDocument::parse(ROOT, "<Project><Import Project=\"a.props\"", None, &env);
    assert!(doc.has_errors());
    assert_eq!(doc.diagnostics()[0].kind, DiagnosticKind::MalformedDocument);
    assert!(doc.imports().is_empty());
    assert!(doc.markup().is_empty());
}

#[test]
fn test_properties_collect_multiple_values() {
    let (_fs, env) = setup();
    let doc = BuildDocument::parse(
        ROOT,
        r#"<Project>
  <PropertyGroup>
    <Platform>x86</Platform>
    <OutDir>bin\$(Platform)</OutDir>
  </PropertyGroup>
  <PropertyGroup Condition="'$(Foo)' == ''">
    <Platform>x64</Platform>
    <Platform>x86</Platform>
  </PropertyGroup>
</Project>"#,
        None,
        &env,
    );
    let props = doc.properties();
    assert_eq!(props.get("platform").unwrap().candidates(), ["x86", "x64"]);
    assert_eq!(props.evaluate("$(OutDir)").unwrap(), r"bin\x86");
    assert_eq!(
        props.evaluate_permutations("$(OutDir)").unwrap().to_vec(),
        [r"bin\x86", r"bin\x64"]
    );

    let (_, span) = doc.find_element(LanguageElement::PropertyGroup).unwrap();
    assert!(span.start > 0);
}
