//! Debounced single-lane scheduler.
//!
//! Marks accumulate in a [`DirtyTracker`]. The first mark arms a deadline one
//! debounce window away, each further mark pushes it back, and once it passes
//! the tracker is flushed into one healing batch. Follow-up marks and failed
//! actions re-arm a fresh window, so a chain of status changes bubbles up one
//! batch per level until the tree is quiet.

use crate::config::HealerConfig;
use crate::events::{EventBus, HealEvent, now_millis};
use crate::heal::{HealError, heal};
use crate::mutation::LibraryEvent;
use crate::tracker::{DirtyNode, DirtyReason, DirtyTracker};
use crate::vault::{LibraryVault, VaultError};
use library_codec::SegmentIdChain;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use web_time::Instant;

/// Source of "now" for the debounce deadline.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// State of the lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    /// Nothing pending.
    Idle,
    /// Marks pending; a batch runs once `deadline` has passed.
    Armed { deadline: Instant },
    /// A batch is being healed and applied.
    Running,
}

/// Input to [`HealScheduler::run`].
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    Event(LibraryEvent),
    Mark(SegmentIdChain, DirtyReason),
    Stop,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Heal(#[from] HealError),

    #[error("Failed to read library: {0}")]
    Snapshot(#[from] VaultError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// What one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Marks carried into the next batch, retries included.
    pub follow_ups: usize,
}

pub struct HealScheduler<V: LibraryVault, C: Clock = SystemClock> {
    vault: V,
    clock: C,
    config: HealerConfig,
    tracker: DirtyTracker,
    state: LaneState,
    events: Arc<EventBus>,
}

impl<V: LibraryVault, C: Clock> HealScheduler<V, C> {
    pub fn new(vault: V, clock: C, config: HealerConfig, events: Arc<EventBus>) -> Self {
        Self {
            vault,
            clock,
            config,
            tracker: DirtyTracker::new(),
            state: LaneState::Idle,
            events,
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn state(&self) -> LaneState {
        self.state
    }

    /// When the next batch is due, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            LaneState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Number of distinct chains waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    pub fn mark_dirty(&mut self, chain: SegmentIdChain, reason: DirtyReason) {
        self.tracker.mark_dirty(chain, reason);
        self.arm();
    }

    pub fn mark_all_dirty(
        &mut self,
        chains: impl IntoIterator<Item = SegmentIdChain>,
        reason: DirtyReason,
    ) {
        self.tracker.mark_all_dirty(chains, reason);
        if !self.tracker.is_empty() {
            self.arm();
        }
    }

    pub fn on_event(&mut self, event: &LibraryEvent) {
        debug!("Library event: {}", event);
        for (chain, reason) in event.dirty_marks() {
            self.mark_dirty(chain, reason);
        }
    }

    /// Cancel the pending window and discard every unflushed mark.
    pub fn stop(&mut self) {
        let discarded = self.tracker.len();
        self.tracker.clear();
        self.state = LaneState::Idle;
        if discarded > 0 {
            info!(discarded, "Scheduler stopped, discarding pending marks");
        }
        self.events.emit(HealEvent::Stopped {
            discarded,
            timestamp: now_millis(),
        });
    }

    /// Run a batch if the debounce window has closed.
    pub async fn poll(&mut self) -> Result<Option<BatchReport>> {
        match self.state {
            LaneState::Armed { deadline } if self.clock.now() >= deadline => {
                self.run_batch().await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Flush the tracker and heal it now, ignoring the debounce window.
    pub async fn run_batch(&mut self) -> Result<BatchReport> {
        self.state = LaneState::Running;
        let batch = self.tracker.flush();
        self.events.emit(HealEvent::BatchStarted {
            dirty: batch.len(),
            timestamp: now_millis(),
        });

        let snapshot = match self.vault.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.fail_batch(batch, e.into())),
        };
        let outcome = match heal(&batch, &snapshot) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail_batch(batch, e.into())),
        };

        let mut report = BatchReport {
            skipped: outcome.skipped.len(),
            ..BatchReport::default()
        };
        for missing in &outcome.skipped {
            self.events.emit(HealEvent::NodeSkipped {
                chain: missing.chain.to_string(),
                timestamp: now_millis(),
            });
        }

        for action in &outcome.actions {
            match self.vault.apply(action).await {
                Ok(()) => {
                    report.applied += 1;
                    self.events.emit(HealEvent::ActionApplied {
                        action: action.to_string(),
                        paths: action.touched_paths().into_iter().map(String::from).collect(),
                        timestamp: now_millis(),
                    });
                }
                Err(e) => {
                    warn!("Failed to {}: {}", action, e);
                    report.failed += 1;
                    report.follow_ups += 1;
                    let (chain, reason) = action.retry_mark();
                    self.tracker.mark_dirty(chain, reason);
                    self.events.emit(HealEvent::ActionFailed {
                        action: action.to_string(),
                        error: e.to_string(),
                        timestamp: now_millis(),
                    });
                }
            }
        }

        report.follow_ups += outcome.follow_ups.len();
        for (chain, reason) in outcome.follow_ups {
            self.tracker.mark_dirty(chain, reason);
        }

        self.state = LaneState::Idle;
        if !self.tracker.is_empty() {
            self.arm();
        }

        info!(
            applied = report.applied,
            failed = report.failed,
            follow_ups = report.follow_ups,
            "Healed batch of {} sections",
            batch.len()
        );
        self.events.emit(HealEvent::BatchHealed {
            applied: report.applied,
            failed: report.failed,
            follow_ups: report.follow_ups,
            timestamp: now_millis(),
        });
        Ok(report)
    }

    /// Heal back to back until nothing is pending or `max_passes` batches ran.
    ///
    /// Returns the number of batches run.
    pub async fn heal_until_idle(&mut self) -> Result<usize> {
        let mut passes = 0;
        while !self.tracker.is_empty() && passes < self.config.max_passes {
            self.run_batch().await?;
            passes += 1;
        }
        if !self.tracker.is_empty() {
            warn!(
                pending = self.tracker.len(),
                "Library still dirty after {} passes",
                passes
            );
        }
        Ok(passes)
    }

    /// Drive the lane from a command channel until `Stop` or the sender closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<SchedulerCommand>) {
        info!(debounce_ms = self.config.debounce_ms, "Scheduler running");
        loop {
            let wait = self
                .deadline()
                .map(|deadline| deadline.saturating_duration_since(self.clock.now()));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(SchedulerCommand::Event(event)) => self.on_event(&event),
                    Some(SchedulerCommand::Mark(chain, reason)) => self.mark_dirty(chain, reason),
                    Some(SchedulerCommand::Stop) | None => {
                        self.stop();
                        break;
                    }
                },
                _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {
                    // Failures are logged and published by the batch itself
                    let _ = self.poll().await;
                }
            }
        }
        info!("Scheduler stopped");
    }

    fn arm(&mut self) {
        let deadline = self.clock.now() + self.config.debounce();
        self.state = LaneState::Armed { deadline };
    }

    /// Put the batch back without arming, so the next incoming mark retries it.
    fn fail_batch(&mut self, batch: Vec<DirtyNode>, err: SchedulerError) -> SchedulerError {
        for node in batch {
            for reason in node.reasons {
                self.tracker.mark_dirty(node.chain.clone(), reason);
            }
        }
        self.state = LaneState::Idle;
        error!("Healing batch failed: {}", err);
        self.events.emit(HealEvent::BatchFailed {
            error: err.to_string(),
            timestamp: now_millis(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, InMemoryFs};
    use crate::vault::FsLibraryVault;

    type TestScheduler = HealScheduler<FsLibraryVault<Arc<InMemoryFs>>, ManualClock>;

    fn chain(s: &str) -> SegmentIdChain {
        s.parse().unwrap()
    }

    fn scheduler(files: &[(&str, &str)]) -> (Arc<InMemoryFs>, ManualClock, TestScheduler) {
        let fs = Arc::new(InMemoryFs::with_files(files.iter().copied()));
        let clock = ManualClock::new();
        let scheduler = HealScheduler::new(
            FsLibraryVault::new(Arc::clone(&fs)),
            clock.clone(),
            HealerConfig {
                debounce_ms: 100,
                max_passes: 8,
            },
            Arc::new(EventBus::new()),
        );
        (fs, clock, scheduler)
    }

    fn pie_library() -> Vec<(&'static str, &'static str)> {
        vec![
            ("__.md", "- [ ] [[__-Fruit|Fruit]]\n"),
            (
                "Fruit/__-Fruit.md",
                "---\nstatus: not_started\n---\n\n[[__|← Library]]\n\n- [ ] [[__-Pie-Fruit|Pie]]\n",
            ),
            (
                "Fruit/Pie/__-Pie-Fruit.md",
                "---\nstatus: not_started\n---\n\n[[__-Fruit|← Fruit]]\n\n\
                 - [x] [[Apple-Pie-Fruit|Apple]]\n\
                 - [x] [[Cherry-Pie-Fruit|Cherry]]\n\
                 - [x] [[Pear-Pie-Fruit|Pear]]\n",
            ),
            ("Fruit/Pie/Apple-Pie-Fruit.md", "---\nstatus: done\n---\n"),
            ("Fruit/Pie/Cherry-Pie-Fruit.md", "---\nstatus: done\n---\n"),
            ("Fruit/Pie/Pear-Pie-Fruit.md", "---\nstatus: done\n---\n"),
        ]
    }

    #[tokio::test]
    async fn test_mark_arms_and_resets_deadline() {
        let (_fs, clock, mut scheduler) = scheduler(&pie_library());
        assert_eq!(scheduler.state(), LaneState::Idle);

        scheduler.mark_dirty(chain("Fruit/Pie"), DirtyReason::Status);
        let first = scheduler.deadline().unwrap();

        clock.advance(Duration::from_millis(60));
        scheduler.mark_dirty(chain("Fruit/Pie"), DirtyReason::Content);
        let second = scheduler.deadline().unwrap();
        assert_eq!(second - first, Duration::from_millis(60));
        assert_eq!(scheduler.pending(), 1);

        // The first window would have closed by now, the reset one has not
        clock.advance(Duration::from_millis(60));
        assert_eq!(scheduler.poll().await.unwrap(), None);

        clock.advance(Duration::from_millis(40));
        let report = scheduler.poll().await.unwrap().unwrap();
        assert!(report.applied > 0);
    }

    #[tokio::test]
    async fn test_stop_while_armed_discards_marks() {
        let files = pie_library();
        let (fs, clock, mut scheduler) = scheduler(&files);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = scheduler.events.subscribe(move |event| {
            seen_clone.lock().unwrap().push(event);
        });

        scheduler.mark_dirty(chain("Fruit/Pie"), DirtyReason::Status);
        scheduler.stop();
        assert_eq!(scheduler.state(), LaneState::Idle);
        assert_eq!(scheduler.pending(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(scheduler.poll().await.unwrap(), None);
        for (path, content) in files {
            assert_eq!(fs.contents(path).as_deref(), Some(content));
        }
        assert!(matches!(
            seen.lock().unwrap().as_slice(),
            [HealEvent::Stopped { discarded: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn test_status_reaches_fixpoint_within_depth() {
        let (fs, _clock, mut scheduler) = scheduler(&pie_library());
        scheduler.mark_dirty(chain("Fruit/Pie"), DirtyReason::Status);

        // Pie, then Fruit, then the root's line for Fruit
        let passes = scheduler.heal_until_idle().await.unwrap();
        assert!(passes <= 3, "took {} passes", passes);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.state(), LaneState::Idle);

        assert!(
            fs.contents("Fruit/Pie/__-Pie-Fruit.md")
                .unwrap()
                .starts_with("---\nstatus: done\n---\n")
        );
        let fruit = fs.contents("Fruit/__-Fruit.md").unwrap();
        assert!(fruit.starts_with("---\nstatus: done\n---\n"));
        assert!(fruit.contains("- [x] [[__-Pie-Fruit|Pie]]"));
        assert_eq!(
            fs.contents("__.md").as_deref(),
            Some("- [x] [[__-Fruit|Fruit]]\n")
        );

        // Healed: another full pass changes nothing
        scheduler.mark_all_dirty(
            vec![SegmentIdChain::root(), chain("Fruit"), chain("Fruit/Pie")],
            DirtyReason::Suffix,
        );
        let report = scheduler.run_batch().await.unwrap();
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_collision_remarks_without_arming() {
        let (fs, clock, mut scheduler) = scheduler(&[
            ("Fruit/__-Fruit.md", "[[__|← Library]]\n"),
            ("Fruit/Apple-Fruit.md", ""),
            ("Fruit/Apple-Old.md", ""),
        ]);
        let failures = Arc::new(Mutex::new(0));
        let failures_clone = Arc::clone(&failures);
        let _sub = scheduler.events.subscribe(move |event| {
            if matches!(event, HealEvent::BatchFailed { .. }) {
                *failures_clone.lock().unwrap() += 1;
            }
        });

        scheduler.mark_dirty(chain("Fruit"), DirtyReason::Content);
        clock.advance(Duration::from_millis(100));
        let err = scheduler.poll().await.unwrap_err();
        assert!(matches!(err, SchedulerError::Heal(HealError::Collision { .. })));
        assert_eq!(*failures.lock().unwrap(), 1);

        // Kept for retry, but no window is armed
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.state(), LaneState::Idle);
        assert_eq!(fs.contents("Fruit/Apple-Old.md").as_deref(), Some(""));

        // Resolving the collision and marking again heals the retained batch
        fs.delete("Fruit/Apple-Old.md").await.unwrap();
        scheduler.on_event(&LibraryEvent::Delete("Fruit/Apple.md".parse().unwrap()));
        clock.advance(Duration::from_millis(100));
        assert!(scheduler.poll().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_action_is_retried() {
        // The codex name is taken by a directory, so creating it fails
        let (fs, _clock, mut scheduler) = scheduler(&[("Fruit/Apple-Fruit.md", "")]);
        fs.mkdir("Fruit/__-Fruit.md").await.unwrap();

        scheduler.mark_dirty(chain("Fruit"), DirtyReason::Content);
        let report = scheduler.run_batch().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(report.follow_ups >= 1);
        assert!(matches!(scheduler.state(), LaneState::Armed { .. }));
        assert!(scheduler.pending() >= 1);
    }

    #[tokio::test]
    async fn test_run_loop_heals_and_stops() {
        let fs = Arc::new(InMemoryFs::with_files(pie_library()));
        let mut scheduler = HealScheduler::new(
            FsLibraryVault::new(Arc::clone(&fs)),
            SystemClock,
            HealerConfig {
                debounce_ms: 10,
                max_passes: 8,
            },
            Arc::new(EventBus::new()),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SchedulerCommand::Event(LibraryEvent::StatusToggle(
            "Fruit/Pie/Apple.md".parse().unwrap(),
        )))
        .unwrap();

        let handle = tokio::spawn(async move {
            scheduler.run(rx).await;
            scheduler
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(SchedulerCommand::Stop).unwrap();
        let scheduler = handle.await.unwrap();

        assert_eq!(scheduler.state(), LaneState::Idle);
        assert_eq!(
            fs.contents("__.md").as_deref(),
            Some("- [x] [[__-Fruit|Fruit]]\n")
        );
    }
}
