//! library-healer: keeps a note library canonical as it is edited.
//!
//! This crate provides:
//! - Dirty tracking of sections touched by user edits
//! - The pure healing pass that turns a dirty batch into rename, status and
//!   codex actions
//! - A debounced scheduler that batches marks and heals to a fixpoint
//! - The `LibraryVault` and `FileSystem` seams, with an in-memory filesystem
//!   for tests

pub mod action;
pub mod config;
pub mod events;
pub mod fs;
pub mod heal;
pub mod mutation;
pub mod scheduler;
pub mod snapshot;
pub mod tracker;
pub mod vault;

pub use action::HealAction;
pub use config::{ConfigError, DEBOUNCE_ENV, HealerConfig};
pub use events::{EventBus, HealEvent, Subscription};
pub use fs::{FileEntry, FileSystem, FsError, InMemoryFs};
pub use heal::{HealError, HealOutcome, MissingNode, heal};
pub use mutation::LibraryEvent;
pub use scheduler::{
    BatchReport, Clock, HealScheduler, LaneState, ManualClock, SchedulerCommand, SchedulerError,
    SystemClock,
};
pub use snapshot::{LibrarySnapshot, NodeSnapshot, TreeView};
pub use tracker::{DirtyNode, DirtyReason, DirtyTracker};
pub use vault::{FsLibraryVault, LibraryVault, VaultError};
