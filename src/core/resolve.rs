//! Import path resolution.
//!
//! Turns the raw `Project` attribute of an import declaration into the
//! file(s) it names. Import paths are evaluated with scalar evaluation
//! only, so a multi-valued property contributes its first candidate.

use std::path::Path;

use msbuild_expr::{evaluate_str, EvaluationContext};
use regex::Regex;

use crate::host::fs::{combine, normalize_path, normalize_separators, FileSystem};
use crate::utils::error::ImportError;

/// What an import declaration resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A single existing file.
    File(String),
    /// A wildcard pattern and the files it matched, sorted. May be empty.
    Wildcard { pattern: String, matches: Vec<String> },
}

impl ImportTarget {
    pub fn files(&self) -> &[String] {
        match self {
            ImportTarget::File(file) => std::slice::from_ref(file),
            ImportTarget::Wildcard { matches, .. } => matches,
        }
    }
}

/// Evaluate `raw` and locate the file(s) it refers to.
///
/// Relative results are taken relative to `base_dir`. A path whose last
/// component contains `*` or `?` is expanded against the directory's files.
pub fn resolve_import_path<C>(
    raw: &str,
    base_dir: Option<&str>,
    ctx: &C,
    fs: &dyn FileSystem,
) -> Result<ImportTarget, ImportError>
where
    C: EvaluationContext + ?Sized,
{
    if raw.trim().is_empty() {
        return Err(ImportError::MissingValue);
    }

    let evaluated = evaluate_str(raw, ctx)?;
    let separated = normalize_separators(evaluated.trim());
    let combined = match base_dir {
        Some(base) => combine(base, &separated),
        None => separated,
    };
    let filename = normalize_path(&combined);

    if is_wildcard(&filename) {
        return expand_wildcard(&filename, fs);
    }
    if !fs.exists(&filename) {
        return Err(ImportError::Unresolved { path: filename });
    }
    Ok(ImportTarget::File(filename))
}

/// Whether the final path component is a glob.
pub fn is_wildcard(path: &str) -> bool {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().contains(['*', '?']))
        .unwrap_or(false)
}

fn expand_wildcard(pattern: &str, fs: &dyn FileSystem) -> Result<ImportTarget, ImportError> {
    let path = Path::new(pattern);
    let dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let glob = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Directory wildcards are not expanded.
    if dir.contains(['*', '?']) {
        return Err(ImportError::Unresolved {
            path: pattern.to_string(),
        });
    }

    let matcher = glob_regex(&glob).map_err(|_| ImportError::Unresolved {
        path: pattern.to_string(),
    })?;
    let matches = match fs.list_dir(&dir) {
        Ok(files) => files
            .into_iter()
            .filter(|file| {
                Path::new(file)
                    .file_name()
                    .map(|name| matcher.is_match(&name.to_string_lossy()))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    Ok(ImportTarget::Wildcard {
        pattern: pattern.to_string(),
        matches,
    })
}

/// Anchored regex for a file name glob.
fn glob_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from(if cfg!(windows) { "(?i)^" } else { "^" });
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}
