//! Suppresses watcher events caused by the healer's own writes.

use async_trait::async_trait;
use library_healer::action::HealAction;
use library_healer::snapshot::LibrarySnapshot;
use library_healer::vault::{LibraryVault, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use web_time::Instant;

/// Time-to-live for echo flags. Older flags are considered stale.
pub const ECHO_TTL: Duration = Duration::from_secs(5);

/// Paths the healer is about to write.
///
/// A path is flagged BEFORE the write. When the watcher reports it, the flag
/// is consumed and the event dropped. Flags expire after the TTL so a dropped
/// watcher event cannot swallow a later user edit.
#[derive(Clone)]
pub struct EchoFilter {
    written: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self::with_ttl(ECHO_TTL)
    }
}

impl EchoFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            written: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn mark_written(&self, path: &str) {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), Instant::now());
    }

    /// True once for a flagged, unexpired path.
    pub fn consume(&self, path: &str) -> bool {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        written
            .remove(path)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Drop expired flags.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, at| at.elapsed() < ttl);
    }
}

/// A vault that flags every path an action touches before applying it.
pub struct EchoGuardVault<V> {
    inner: V,
    echoes: EchoFilter,
}

impl<V: LibraryVault> EchoGuardVault<V> {
    pub fn new(inner: V, echoes: EchoFilter) -> Self {
        Self { inner, echoes }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

#[async_trait]
impl<V: LibraryVault> LibraryVault for EchoGuardVault<V> {
    async fn snapshot(&self) -> Result<LibrarySnapshot> {
        self.echoes.cleanup_expired();
        self.inner.snapshot().await
    }

    async fn apply(&self, action: &HealAction) -> Result<()> {
        for path in action.touched_paths() {
            self.echoes.mark_written(path);
        }
        debug!("Applying {}", action);
        self.inner.apply(action).await
    }
}
