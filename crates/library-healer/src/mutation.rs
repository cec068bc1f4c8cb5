//! Structural edits reported by the host, and the dirty marks each implies.

use crate::tracker::DirtyReason;
use library_codec::{SegmentIdChain, TreeNodeKind, TreeNodeLocator};
use std::fmt::{self, Display, Formatter};

/// A change to the library observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    Create(TreeNodeLocator),
    Delete(TreeNodeLocator),
    Rename {
        from: TreeNodeLocator,
        to: TreeNodeLocator,
    },
    /// A scroll's (or section's) status was changed by the user.
    StatusToggle(TreeNodeLocator),
    /// A section's codex was edited by hand.
    CodexEdited(SegmentIdChain),
}

impl LibraryEvent {
    /// Dirty marks that make the next batch heal everything this edit could
    /// have invalidated.
    pub fn dirty_marks(&self) -> Vec<(SegmentIdChain, DirtyReason)> {
        match self {
            LibraryEvent::Create(locator) => {
                let mut marks = parent_marks(locator);
                if let Some(own) = locator.section_chain() {
                    marks.push((own, DirtyReason::Suffix));
                }
                marks
            }
            LibraryEvent::Delete(locator) => parent_marks(locator),
            LibraryEvent::Rename { from, to } => {
                let mut marks = LibraryEvent::Delete(from.clone()).dirty_marks();
                marks.extend(LibraryEvent::Create(to.clone()).dirty_marks());
                marks
            }
            LibraryEvent::StatusToggle(locator) => match locator.target_kind() {
                TreeNodeKind::Section => locator
                    .section_chain()
                    .map(|own| vec![(own, DirtyReason::Status)])
                    .unwrap_or_default(),
                TreeNodeKind::Scroll => {
                    vec![(locator.chain_to_parent().clone(), DirtyReason::Status)]
                }
                // Files carry no status; treat as an ordinary edit
                TreeNodeKind::File => {
                    vec![(locator.chain_to_parent().clone(), DirtyReason::Content)]
                }
            },
            LibraryEvent::CodexEdited(chain) => vec![(chain.clone(), DirtyReason::Content)],
        }
    }
}

fn parent_marks(locator: &TreeNodeLocator) -> Vec<(SegmentIdChain, DirtyReason)> {
    let parent = locator.chain_to_parent().clone();
    vec![
        (parent.clone(), DirtyReason::Content),
        (parent, DirtyReason::Status),
    ]
}

impl Display for LibraryEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LibraryEvent::Create(locator) => write!(f, "create {}", locator),
            LibraryEvent::Delete(locator) => write!(f, "delete {}", locator),
            LibraryEvent::Rename { from, to } => write!(f, "rename {} -> {}", from, to),
            LibraryEvent::StatusToggle(locator) => write!(f, "status toggle {}", locator),
            LibraryEvent::CodexEdited(chain) => write!(f, "codex edited in {:?}", chain.to_string()),
        }
    }
}
