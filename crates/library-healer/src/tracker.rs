//! Dirty tracking: which sections need healing, and why.

use library_codec::SegmentIdChain;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

/// Why a section was marked for healing. Each reason widens the healing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DirtyReason {
    /// Children were added, removed or edited: rewrite the codex and child names.
    Content,
    /// The section's own position changed: rename the whole subtree.
    Suffix,
    /// A child's status changed: recompute the section status.
    Status,
}

impl Display for DirtyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DirtyReason::Content => f.write_str("content"),
            DirtyReason::Suffix => f.write_str("suffix"),
            DirtyReason::Status => f.write_str("status"),
        }
    }
}

/// One flushed entry: a section chain and the union of reasons it was marked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyNode {
    pub chain: SegmentIdChain,
    pub reasons: BTreeSet<DirtyReason>,
}

impl DirtyNode {
    pub fn has(&self, reason: DirtyReason) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Accumulates dirty marks between healing passes.
///
/// Marking is an idempotent union, so a burst of events touching the same
/// section collapses into one entry.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    dirty: HashMap<SegmentIdChain, BTreeSet<DirtyReason>>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, chain: SegmentIdChain, reason: DirtyReason) {
        self.dirty.entry(chain).or_default().insert(reason);
    }

    pub fn mark_all_dirty(
        &mut self,
        chains: impl IntoIterator<Item = SegmentIdChain>,
        reason: DirtyReason,
    ) {
        for chain in chains {
            self.mark_dirty(chain, reason);
        }
    }

    /// Take every accumulated entry and leave the tracker empty.
    pub fn flush(&mut self) -> Vec<DirtyNode> {
        self.dirty
            .drain()
            .map(|(chain, reasons)| DirtyNode { chain, reasons })
            .collect()
    }

    /// Drop all marks without healing them.
    pub fn clear(&mut self) {
        self.dirty.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }
}
