//! Wiring: native filesystem, echo guard, scheduler and watcher.

use crate::echo::{EchoFilter, EchoGuardVault};
use crate::native_fs::NativeFs;
use crate::translate::translate;
use crate::watcher::FileWatcher;
use anyhow::Result;
use library_healer::{
    DirtyReason, EventBus, FsLibraryVault, HealScheduler, HealerConfig, LibraryVault,
    SchedulerCommand, SystemClock,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// The vault the daemon heals through.
pub type DaemonVault = EchoGuardVault<FsLibraryVault<NativeFs>>;

pub type DaemonScheduler = HealScheduler<DaemonVault, SystemClock>;

pub fn open_scheduler(
    root: &Path,
    config: HealerConfig,
    echoes: EchoFilter,
    events: Arc<EventBus>,
) -> DaemonScheduler {
    let vault = EchoGuardVault::new(FsLibraryVault::new(NativeFs::new(root.to_path_buf())), echoes);
    HealScheduler::new(vault, SystemClock, config, events)
}

/// Mark every section so the next batch heals the whole tree.
pub async fn mark_whole_library(scheduler: &mut DaemonScheduler) -> Result<usize> {
    let chains = scheduler.vault().snapshot().await?.all_section_chains();
    let count = chains.len();
    scheduler.mark_all_dirty(chains, DirtyReason::Suffix);
    Ok(count)
}

/// Heal the whole library to a fixpoint and return the number of batches run.
pub async fn heal_once(root: &Path, config: HealerConfig, events: Arc<EventBus>) -> Result<usize> {
    let mut scheduler = open_scheduler(root, config, EchoFilter::new(), events);
    let sections = mark_whole_library(&mut scheduler).await?;
    info!("Healing {} sections under {:?}", sections, root);
    let passes = scheduler.heal_until_idle().await?;
    info!("Library settled after {} passes", passes);
    Ok(passes)
}

/// Watch the library and heal it until `shutdown` resolves.
///
/// The whole tree is healed once on start, then every watcher event that is
/// not an echo of the healer's own writes is fed to the scheduler.
pub async fn watch(
    root: &Path,
    config: HealerConfig,
    events: Arc<EventBus>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let echoes = EchoFilter::new();
    let mut scheduler = open_scheduler(root, config, echoes.clone(), events);
    let sections = mark_whole_library(&mut scheduler).await?;
    debug!("Marked {} sections for initial healing", sections);

    let mut watcher = FileWatcher::new(root.to_path_buf())?;
    info!("Watching {:?}", watcher.root());

    let (commands, command_rx) = mpsc::unbounded_channel();
    let lane = tokio::spawn(async move {
        scheduler.run(command_rx).await;
    });

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(event) = watcher.event_rx().recv() => {
                if echoes.consume(&event.path) {
                    debug!("Skipping {} (own write)", event.path);
                    continue;
                }
                if let Some(library_event) = translate(&event) {
                    if commands.send(SchedulerCommand::Event(library_event)).is_err() {
                        error!("Scheduler exited unexpectedly");
                        break;
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    // The lane may already be gone if it exited on its own
    let _ = commands.send(SchedulerCommand::Stop);
    lane.await?;
    Ok(())
}
