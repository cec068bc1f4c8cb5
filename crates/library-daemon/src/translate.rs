//! Translation of raw file events into library events.

use crate::watcher::{FileEvent, FileEventKind};
use library_codec::{SegmentIdChain, SplitPathTarget, TreeNodeLocator, decode_split_path};
use library_healer::mutation::LibraryEvent;
use tracing::debug;

/// The library event a file event stands for, if any.
///
/// Watchers cannot pair up the two halves of a move, so a moved node shows
/// up as a delete at the old path and a create (or edit) at the new one.
/// Together those mark the same sections a paired rename would.
pub fn translate(event: &FileEvent) -> Option<LibraryEvent> {
    let translated = match event.kind {
        FileEventKind::Directory => {
            let chain: SegmentIdChain = event.path.parse().ok()?;
            TreeNodeLocator::for_section(&chain).map(LibraryEvent::Create)
        }
        FileEventKind::Modified => match decode_split_path(&event.path) {
            Ok(split) => match split.target {
                SplitPathTarget::Codex => Some(LibraryEvent::CodexEdited(split.folders)),
                // A status edit and a new scroll mark the same section
                SplitPathTarget::Scroll(_) => split.to_locator().map(LibraryEvent::StatusToggle),
                SplitPathTarget::File(_) => split.to_locator().map(LibraryEvent::Create),
            },
            Err(e) => {
                debug!("Ignoring {}: {}", event.path, e);
                None
            }
        },
        FileEventKind::Deleted => match decode_split_path(&event.path) {
            // The folder may still be there; if not, the section is skipped
            Ok(split) if split.target == SplitPathTarget::Codex => {
                Some(LibraryEvent::CodexEdited(split.folders))
            }
            Ok(split) => split.to_locator().map(LibraryEvent::Delete),
            // Folder names never contain a dot, so this was a folder
            Err(_) => event
                .path
                .parse::<SegmentIdChain>()
                .ok()
                .and_then(|chain| TreeNodeLocator::for_section(&chain))
                .map(LibraryEvent::Delete),
        },
    };
    if let Some(translated) = &translated {
        debug!("{} -> {}", event.path, translated);
    }
    translated
}
