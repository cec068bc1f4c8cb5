//! File watcher with debouncing for library changes.
//!
//! Uses notify-debouncer-mini for efficient file change detection.

use anyhow::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Quiet period the watcher waits for before reporting a path.
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// File event from the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Path relative to the library root, `/`-separated
    pub path: String,
    pub kind: FileEventKind,
}

/// What the path looked like once the debounce window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// A file was created or modified
    Modified,
    /// A folder appeared (created or moved in)
    Directory,
    /// The path no longer exists
    Deleted,
}

/// Watches the library folder recursively.
pub struct FileWatcher {
    root: PathBuf,
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<FileEvent>,
}

/// Last seen mtime per file, to drop events that changed nothing
type MtimeCache = Arc<Mutex<HashMap<PathBuf, SystemTime>>>;

impl FileWatcher {
    pub fn new(root: PathBuf) -> Result<Self> {
        // FSEvents needs the real path (/var -> /private/var on macOS)
        let root = root.canonicalize().unwrap_or(root);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root_clone = root.clone();
        let mtime_cache: MtimeCache = Arc::new(Mutex::new(HashMap::new()));

        let mut debouncer = new_debouncer(
            WATCH_DEBOUNCE,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(file_event) =
                            Self::process_event(&event, &root_clone, &mtime_cache)
                        {
                            if event_tx.send(file_event).is_err() {
                                // Receiver dropped
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            root,
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Classify one debounced event, or drop it.
    fn process_event(
        event: &DebouncedEvent,
        root: &Path,
        mtime_cache: &MtimeCache,
    ) -> Option<FileEvent> {
        let path = &event.path;
        let relative = path.strip_prefix(root).ok()?;
        let relative_str = relative_key(relative)?;

        if relative_str.is_empty() || is_hidden(&relative_str) {
            return None;
        }

        let kind = if path.is_dir() {
            FileEventKind::Directory
        } else if path.exists() {
            FileEventKind::Modified
        } else {
            FileEventKind::Deleted
        };

        let relative_path = relative.to_path_buf();
        let mut cache = mtime_cache.lock().unwrap_or_else(|e| e.into_inner());
        match kind {
            FileEventKind::Modified => {
                if let Ok(mtime) = std::fs::metadata(path).and_then(|m| m.modified()) {
                    if cache.get(&relative_path) == Some(&mtime) {
                        return None;
                    }
                    cache.insert(relative_path, mtime);
                }
            }
            FileEventKind::Deleted => {
                cache.remove(&relative_path);
            }
            FileEventKind::Directory => {}
        }

        debug!("File event: {:?} - {}", kind, relative_str);
        Some(FileEvent {
            path: relative_str,
            kind,
        })
    }

    pub fn event_rx(&mut self) -> &mut mpsc::UnboundedReceiver<FileEvent> {
        &mut self.event_rx
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Library key of a relative path: UTF-8 components joined with `/`.
fn relative_key(relative: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

/// Dot-prefixed components (`.obsidian`, `.git`, editor swap files) are never library nodes.
pub fn is_hidden(relative: &str) -> bool {
    relative.split('/').any(|part| part.starts_with('.'))
}
