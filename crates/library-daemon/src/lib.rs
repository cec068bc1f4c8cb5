//! library-daemon library: Exposes internal modules for testing.
//!
//! This is a thin library layer over the daemon components,
//! allowing integration tests to access internal types.

pub mod config;
pub mod daemon;
pub mod echo;
pub mod native_fs;
pub mod translate;
pub mod watcher;

// Re-export key types for convenience
pub use config::{ConfigError, LIBRARY_ROOT_ENV, resolve_library_root};
pub use daemon::{DaemonScheduler, DaemonVault, heal_once, open_scheduler, watch};
pub use echo::{EchoFilter, EchoGuardVault};
pub use native_fs::NativeFs;
pub use translate::translate;
pub use watcher::{FileEvent, FileEventKind, FileWatcher};
