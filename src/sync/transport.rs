//! File transports for the shared remote
//!
//! Sync only ever talks to a remote through [`FileTransport`]: a flat,
//! path-addressed file store. Paths are relative, `/`-separated, and never
//! escape the transport's root.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SyncMode;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::file_io::write_bytes_atomic;

/// Path-addressed remote file store
///
/// Every failure, whatever the backing store, is reported as
/// [`LedgerError::Io`].
pub trait FileTransport: Send + Sync {
    fn exists(&self, path: &str) -> LedgerResult<bool>;

    fn read_all(&self, path: &str) -> LedgerResult<Vec<u8>>;

    /// Write a file, replacing any previous contents
    fn write_all(&self, path: &str, bytes: &[u8]) -> LedgerResult<()>;

    fn delete(&self, path: &str) -> LedgerResult<()>;

    /// Rename a file; fails if `dst` exists and `overwrite` is false
    fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> LedgerResult<()>;

    /// Names (not paths) of the files directly under `dir`, sorted
    ///
    /// A directory that does not exist lists as empty rather than failing:
    /// a remote nobody has synced to yet has no ledger directory.
    fn list_files(&self, dir: &str) -> LedgerResult<Vec<String>>;

    /// Names of the directories directly under `dir`, sorted; empty when
    /// `dir` does not exist
    fn list_directories(&self, dir: &str) -> LedgerResult<Vec<String>>;

    /// Create a directory and any missing parents
    fn create_directory(&self, dir: &str) -> LedgerResult<()>;
}

/// Build the transport selected by the sync settings, if any
pub fn open_transport(mode: &SyncMode) -> LedgerResult<Option<Arc<dyn FileTransport>>> {
    match mode {
        SyncMode::Disabled => Ok(None),
        SyncMode::Local { root } => {
            let transport = LocalFileTransport::new(root.clone())?;
            Ok(Some(Arc::new(transport)))
        }
    }
}

/// Check a transport path, returning its segments
///
/// An empty path names the root and is only accepted where a directory is
/// expected.
fn validate_path(path: &str, allow_root: bool) -> LedgerResult<Vec<&str>> {
    if path.is_empty() {
        return if allow_root {
            Ok(Vec::new())
        } else {
            Err(LedgerError::Io("empty path".into()))
        };
    }

    let segments: Vec<&str> = path.split('/').collect();
    for segment in &segments {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            return Err(LedgerError::Io(format!("invalid path '{}'", path)));
        }
        if segment
            .chars()
            .any(|c| c.is_control() || matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        {
            return Err(LedgerError::Io(format!(
                "path '{}' contains a reserved character",
                path
            )));
        }
    }
    Ok(segments)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

fn io_error(action: &str, path: &str, err: std::io::Error) -> LedgerError {
    LedgerError::Io(format!("Failed to {} '{}': {}", action, path, err))
}

/// Transport over a directory on the local filesystem (or a mounted share)
#[derive(Debug, Clone)]
pub struct LocalFileTransport {
    root: PathBuf,
}

impl LocalFileTransport {
    /// Use `root` as the remote, creating it if needed
    pub fn new(root: PathBuf) -> LedgerResult<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| io_error("create sync root", &root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str, allow_root: bool) -> LedgerResult<PathBuf> {
        let segments = validate_path(path, allow_root)?;
        Ok(segments
            .into_iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }

    fn list_entries(&self, dir: &str, want_dirs: bool) -> LedgerResult<Vec<String>> {
        let full = self.resolve(dir, true)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| io_error("list", dir, e))? {
            let entry = entry.map_err(|e| io_error("list", dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_error("list", dir, e))?;
            if file_type.is_dir() == want_dirs {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl FileTransport for LocalFileTransport {
    fn exists(&self, path: &str) -> LedgerResult<bool> {
        Ok(self.resolve(path, false)?.exists())
    }

    fn read_all(&self, path: &str) -> LedgerResult<Vec<u8>> {
        fs::read(self.resolve(path, false)?).map_err(|e| io_error("read", path, e))
    }

    fn write_all(&self, path: &str, bytes: &[u8]) -> LedgerResult<()> {
        let full = self.resolve(path, false)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create parent of", path, e))?;
        }
        write_bytes_atomic(&full, bytes)
    }

    fn delete(&self, path: &str) -> LedgerResult<()> {
        fs::remove_file(self.resolve(path, false)?).map_err(|e| io_error("delete", path, e))
    }

    fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> LedgerResult<()> {
        let from = self.resolve(src, false)?;
        let to = self.resolve(dst, false)?;

        if !from.is_file() {
            return Err(LedgerError::Io(format!("'{}' does not exist", src)));
        }
        if !overwrite && to.exists() {
            return Err(LedgerError::Io(format!("'{}' already exists", dst)));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create parent of", dst, e))?;
        }
        fs::rename(&from, &to).map_err(|e| io_error("move", src, e))
    }

    fn list_files(&self, dir: &str) -> LedgerResult<Vec<String>> {
        self.list_entries(dir, false)
    }

    fn list_directories(&self, dir: &str) -> LedgerResult<Vec<String>> {
        self.list_entries(dir, true)
    }

    fn create_directory(&self, dir: &str) -> LedgerResult<()> {
        let full = self.resolve(dir, true)?;
        fs::create_dir_all(full).map_err(|e| io_error("create directory", dir, e))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    offline: bool,
}

impl MemoryState {
    fn add_dir_chain(&mut self, dir: &str) {
        let mut current = dir;
        while !current.is_empty() {
            self.dirs.insert(current.to_string());
            current = parent_of(current);
        }
    }

    fn children<'a>(names: impl Iterator<Item = &'a String>, dir: &str) -> Vec<String> {
        let mut children: Vec<String> = names
            .filter(|name| parent_of(name) == dir)
            .map(|name| name.rsplit('/').next().unwrap_or(name).to_string())
            .collect();
        children.sort();
        children.dedup();
        children
    }
}

/// In-memory transport
///
/// Clones share the same files, so two replicas holding clones see one
/// remote. Taking it offline makes every call fail, which is how sync
/// failure paths are exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the remote
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    fn state(&self) -> LedgerResult<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|e| LedgerError::Io(format!("Transport lock poisoned: {}", e)))?;
        if state.offline {
            return Err(LedgerError::Io("remote is offline".into()));
        }
        Ok(state)
    }
}

impl FileTransport for MemoryFileTransport {
    fn exists(&self, path: &str) -> LedgerResult<bool> {
        validate_path(path, false)?;
        let state = self.state()?;
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    fn read_all(&self, path: &str) -> LedgerResult<Vec<u8>> {
        validate_path(path, false)?;
        self.state()?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| LedgerError::Io(format!("'{}' does not exist", path)))
    }

    fn write_all(&self, path: &str, bytes: &[u8]) -> LedgerResult<()> {
        validate_path(path, false)?;
        let mut state = self.state()?;
        state.add_dir_chain(parent_of(path));
        state.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> LedgerResult<()> {
        validate_path(path, false)?;
        self.state()?
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| LedgerError::Io(format!("'{}' does not exist", path)))
    }

    fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> LedgerResult<()> {
        validate_path(src, false)?;
        validate_path(dst, false)?;
        let mut state = self.state()?;

        if !state.files.contains_key(src) {
            return Err(LedgerError::Io(format!("'{}' does not exist", src)));
        }
        if !overwrite && state.files.contains_key(dst) {
            return Err(LedgerError::Io(format!("'{}' already exists", dst)));
        }

        if let Some(bytes) = state.files.remove(src) {
            state.add_dir_chain(parent_of(dst));
            state.files.insert(dst.to_string(), bytes);
        }
        Ok(())
    }

    fn list_files(&self, dir: &str) -> LedgerResult<Vec<String>> {
        validate_path(dir, true)?;
        let state = self.state()?;
        Ok(MemoryState::children(state.files.keys(), dir))
    }

    fn list_directories(&self, dir: &str) -> LedgerResult<Vec<String>> {
        validate_path(dir, true)?;
        let state = self.state()?;
        Ok(MemoryState::children(state.dirs.iter(), dir))
    }

    fn create_directory(&self, dir: &str) -> LedgerResult<()> {
        validate_path(dir, true)?;
        self.state()?.add_dir_chain(dir);
        Ok(())
    }
}
