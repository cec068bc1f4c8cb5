//! Event infrastructure for the healer.
//!
//! Provides `HealEvent` for debug/monitoring and `EventBus` for subscriptions.
//! The bus is `Arc`-shared with `RwLock`-guarded callbacks so a watcher task
//! and the scheduler can both hold it.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events emitted while healing, for real-time monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HealEvent {
    /// A debounce window closed and a batch was flushed.
    BatchStarted {
        /// Number of dirty sections in the batch.
        dirty: usize,
        /// When the batch started, in milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// The vault applied one action.
    ActionApplied {
        /// Human-readable action summary.
        action: String,
        /// Paths written or moved.
        paths: Vec<String>,
        timestamp: f64,
    },
    /// The vault rejected one action; its section is re-marked for retry.
    ActionFailed {
        action: String,
        error: String,
        timestamp: f64,
    },
    /// A dirty section disappeared before it could be healed.
    NodeSkipped {
        chain: String,
        timestamp: f64,
    },
    /// A batch finished.
    BatchHealed {
        applied: usize,
        failed: usize,
        /// Marks carried into the next batch (follow-ups and retries).
        #[serde(rename = "followUps")]
        follow_ups: usize,
        timestamp: f64,
    },
    /// A batch could not be healed at all.
    BatchFailed {
        error: String,
        timestamp: f64,
    },
    /// The scheduler was stopped and pending marks were discarded.
    Stopped {
        discarded: usize,
        timestamp: f64,
    },
}

/// Current time in milliseconds since Unix epoch, for event timestamps.
pub fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(HealEvent) + Send + Sync>;

/// Event bus for publishing heal events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(HealEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: HealEvent) {
        // Clone the list so a callback may subscribe without deadlocking
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}
