//! FileSystem trait abstraction for the vault collaborator.
//!
//! Implementations:
//! - `InMemoryFs` - For testing
//! - `NativeFs` (in library-daemon) - Uses tokio::fs
//!
//! Paths are relative to the library root and use `/` as separator.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Not a directory: {0}")]
    NotDirectory(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File or directory name (not full path)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Filesystem operations the vault needs. Implementations must be
/// `Send + Sync` for use across Tokio tasks.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read file contents
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write file contents (creates parent directories if needed)
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// List directory contents
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Delete file or empty directory
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Create directory (and parents if needed)
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Move a file or directory. Fails with `AlreadyExists` if `to` exists.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    /// Every directory except the root
    dirs: BTreeSet<String>,
}

impl Tree {
    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }

    fn ensure_dir(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }
}

/// In-memory filesystem for testing
#[derive(Debug, Default)]
pub struct InMemoryFs {
    tree: RwLock<Tree>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filesystem from `(path, content)` pairs.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut tree = Tree::default();
        for (path, content) in files {
            let path = Self::normalize_path(path);
            if let Some(parent) = Self::parent_path(&path) {
                tree.ensure_dir(&parent);
            }
            tree.files.insert(path, content.as_bytes().to_vec());
        }
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Every file path, sorted.
    pub fn paths(&self) -> Result<Vec<String>> {
        Ok(self.read_tree()?.files.keys().cloned().collect())
    }

    /// File contents as UTF-8, if the file exists.
    pub fn contents(&self, path: &str) -> Option<String> {
        let tree = self.read_tree().ok()?;
        tree.files
            .get(&Self::normalize_path(path))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_tree(&self) -> Result<RwLockReadGuard<'_, Tree>> {
        self.tree
            .read()
            .map_err(|_| FsError::Io("filesystem lock poisoned".into()))
    }

    fn write_tree(&self) -> Result<RwLockWriteGuard<'_, Tree>> {
        self.tree
            .write()
            .map_err(|_| FsError::Io("filesystem lock poisoned".into()))
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn parent_path(path: &str) -> Option<String> {
        let normalized = Self::normalize_path(path);
        if normalized.is_empty() {
            None
        } else {
            match normalized.rfind('/') {
                Some(pos) => Some(normalized[..pos].to_string()),
                None => Some(String::new()),
            }
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        let tree = self.read_tree()?;
        if tree.is_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }
        tree.files
            .get(&path)
            .cloned()
            .ok_or(FsError::NotFound(path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut tree = self.write_tree()?;
        if tree.is_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }
        if let Some(parent) = Self::parent_path(&path) {
            tree.ensure_dir(&parent);
        }
        tree.files.insert(path, content.to_vec());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = Self::normalize_path(path);
        let tree = self.read_tree()?;
        if !tree.is_dir(&path) {
            return Err(if tree.files.contains_key(&path) {
                FsError::NotDirectory(path)
            } else {
                FsError::NotFound(path)
            });
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let direct_child = |full: &str| {
            full.strip_prefix(&prefix)
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        };

        let dirs = tree.dirs.iter().filter_map(|d| direct_child(d)).map(|name| FileEntry {
            name,
            is_dir: true,
        });
        let files = tree.files.keys().filter_map(|f| direct_child(f)).map(|name| FileEntry {
            name,
            is_dir: false,
        });
        Ok(dirs.chain(files).collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut tree = self.write_tree()?;

        if tree.files.remove(&path).is_some() {
            return Ok(());
        }
        if tree.dirs.contains(&path) {
            let prefix = format!("{}/", path);
            let non_empty = tree.files.keys().any(|f| f.starts_with(&prefix))
                || tree.dirs.iter().any(|d| d.starts_with(&prefix));
            if non_empty {
                return Err(FsError::Io(format!("Directory not empty: {}", path)));
            }
            tree.dirs.remove(&path);
            return Ok(());
        }

        Err(FsError::NotFound(path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = Self::normalize_path(path);
        let tree = self.read_tree()?;
        Ok(tree.files.contains_key(&path) || tree.is_dir(&path))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut tree = self.write_tree()?;
        if tree.files.contains_key(&path) {
            return Err(FsError::NotDirectory(path));
        }
        tree.ensure_dir(&path);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = Self::normalize_path(from);
        let to = Self::normalize_path(to);
        let mut tree = self.write_tree()?;

        if tree.files.contains_key(&to) || tree.is_dir(&to) {
            return Err(FsError::AlreadyExists(to));
        }

        if let Some(content) = tree.files.remove(&from) {
            if let Some(parent) = Self::parent_path(&to) {
                tree.ensure_dir(&parent);
            }
            tree.files.insert(to, content);
            return Ok(());
        }

        if !tree.dirs.contains(&from) {
            return Err(FsError::NotFound(from));
        }

        // Directory move: re-root every entry below `from`
        let old_prefix = format!("{}/", from);
        let moved_files: Vec<String> = tree
            .files
            .keys()
            .filter(|f| f.starts_with(&old_prefix))
            .cloned()
            .collect();
        let moved_dirs: Vec<String> = tree
            .dirs
            .iter()
            .filter(|d| **d == from || d.starts_with(&old_prefix))
            .cloned()
            .collect();

        for dir in &moved_dirs {
            tree.dirs.remove(dir);
        }
        if let Some(parent) = Self::parent_path(&to) {
            tree.ensure_dir(&parent);
        }
        for dir in moved_dirs {
            let renamed = format!("{}{}", to, &dir[from.len()..]);
            tree.dirs.insert(renamed);
        }
        for file in moved_files {
            if let Some(content) = tree.files.remove(&file) {
                let renamed = format!("{}{}", to, &file[from.len()..]);
                tree.files.insert(renamed, content);
            }
        }
        Ok(())
    }
}

// Implement FileSystem for Arc<T> where T: FileSystem
// This lets a test keep a handle on the filesystem the vault owns
#[async_trait]
impl<T: FileSystem + Send + Sync> FileSystem for std::sync::Arc<T> {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        (**self).write(path, content).await
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        (**self).list(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        (**self).mkdir(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        (**self).rename(from, to).await
    }
}
