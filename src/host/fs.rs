//! File system abstraction for import resolution.
//!
//! The import pipeline only needs to ask whether a file exists, when it was
//! last written, what it contains, and which files a directory holds. The
//! [`FileSystem`] trait covers exactly that so documents can be parsed
//! against the real disk or an in-memory tree in tests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::utils::error::{FsError, FsResult};

/// Read-only file access used by the import resolver and cache.
pub trait FileSystem: Send + Sync {
    /// Check if a regular file exists.
    fn exists(&self, path: &str) -> bool;

    /// Last write time of a file.
    fn modified(&self, path: &str) -> FsResult<DateTime<Utc>>;

    /// Read a whole file as text.
    fn read_text(&self, path: &str) -> FsResult<String>;

    /// Files (not directories) directly inside `dir`, as full paths, sorted.
    fn list_dir(&self, dir: &str) -> FsResult<Vec<String>>;

    /// Directory used to anchor relative document paths.
    fn current_dir(&self) -> FsResult<String>;
}

/// Use the host's directory separator throughout.
pub fn normalize_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.replace('\\', "/")
    }
}

/// Join `relative` onto `base` unless it is already absolute.
pub fn combine(base: &str, relative: &str) -> String {
    if Path::new(relative).is_absolute() || base.is_empty() {
        return relative.to_string();
    }
    Path::new(base).join(relative).to_string_lossy().into_owned()
}

/// Lexically collapse `.` and `..` components so one file always has one
/// spelling. Does not touch the disk.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                None | Some(Component::ParentDir) | Some(Component::CurDir) => {
                    normalized.push("..");
                }
            },
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.to_string_lossy().into_owned()
}

/// Parent directory of a file path, or the empty string.
pub fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The real file system.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn modified(&self, path: &str) -> FsResult<DateTime<Utc>> {
        let meta = std::fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
        let time = meta.modified().map_err(|e| FsError::from_io(path, e))?;
        Ok(DateTime::<Utc>::from(time))
    }

    fn read_text(&self, path: &str) -> FsResult<String> {
        let bytes = std::fs::read(path).map_err(|e| FsError::from_io(path, e))?;
        let text = String::from_utf8_lossy(&bytes);
        // Drop a UTF-8 byte order mark.
        Ok(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string())
    }

    fn list_dir(&self, dir: &str) -> FsResult<Vec<String>> {
        let entries = std::fs::read_dir(dir).map_err(|e| FsError::from_io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::from_io(dir, e))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.path().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    fn current_dir(&self) -> FsResult<String> {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|e| FsError::from_io(".", e))
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    text: String,
    modified: DateTime<Utc>,
}

/// An in-memory file system for tests and unsaved buffers.
///
/// Every write advances a logical clock by one second, so write order is
/// reflected in modification times. Reads are counted per path.
#[derive(Debug)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, MemoryFile>>,
    reads: Mutex<HashMap<String, usize>>,
    clock: Mutex<DateTime<Utc>>,
    cwd: String,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    /// Create a new empty file system rooted at `/`.
    pub fn new() -> Self {
        let epoch = Utc
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            files: RwLock::new(HashMap::new()),
            reads: Mutex::new(HashMap::new()),
            clock: Mutex::new(epoch),
            cwd: normalize_separators("/"),
        }
    }

    /// Set the current working directory.
    pub fn set_cwd(&mut self, cwd: impl Into<String>) {
        self.cwd = cwd.into();
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        *clock += Duration::seconds(1);
        *clock
    }

    /// Create or overwrite a file; its modification time moves forward.
    pub fn write_file(&self, path: impl Into<String>, text: impl Into<String>) {
        let modified = self.tick();
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(
            path.into(),
            MemoryFile {
                text: text.into(),
                modified,
            },
        );
    }

    /// Move a file's modification time forward without changing it.
    pub fn touch(&self, path: &str) -> FsResult<()> {
        let modified = self.tick();
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let file = files
            .get_mut(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        file.modified = modified;
        Ok(())
    }

    /// Set a file's modification time explicitly.
    pub fn set_modified(&self, path: &str, modified: DateTime<Utc>) -> FsResult<()> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let file = files
            .get_mut(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        file.modified = modified;
        Ok(())
    }

    pub fn remove_file(&self, path: &str) -> bool {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.remove(path).is_some()
    }

    /// How many times `path` has been read.
    pub fn read_count(&self, path: &str) -> usize {
        let reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
        reads.get(path).copied().unwrap_or(0)
    }

    /// Reads across all paths.
    pub fn total_reads(&self) -> usize {
        let reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
        reads.values().sum()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.contains_key(path)
    }

    fn modified(&self, path: &str) -> FsResult<DateTime<Utc>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn read_text(&self, path: &str) -> FsResult<String> {
        let text = {
            let files = self.files.read().unwrap_or_else(|e| e.into_inner());
            files
                .get(path)
                .map(|f| f.text.clone())
                .ok_or_else(|| FsError::NotFound(path.to_string()))?
        };
        let mut reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
        *reads.entry(path.to_string()).or_insert(0) += 1;
        Ok(text)
    }

    fn list_dir(&self, dir: &str) -> FsResult<Vec<String>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let dir = Path::new(dir);
        let mut listed: Vec<String> = files
            .keys()
            .filter(|path| Path::new(path.as_str()).parent() == Some(dir))
            .cloned()
            .collect();
        listed.sort();
        Ok(listed)
    }

    fn current_dir(&self) -> FsResult<String> {
        Ok(self.cwd.clone())
    }
}
