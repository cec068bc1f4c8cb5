//! The healing pass: from a batch of dirty sections to the actions that make
//! them canonical again.
//!
//! `heal` is pure. It reads the current tree through a [`TreeView`] and
//! returns actions plus follow-up marks; applying them is the vault's job.
//! Because it always reads current state, any number of intermediate moves
//! collapse into one rename to wherever the node lives now.

use crate::action::HealAction;
use crate::snapshot::{NodeSnapshot, TreeView};
use crate::tracker::{DirtyNode, DirtyReason};
use library_codec::{
    CanonicalSplitPath, CodexEntry, IntendedTreeNode, SegmentId, SegmentIdChain, TreeNodeKind,
    TreeNodeLocator, TreeNodeStatus, decode_split_path, duplicated_entries, format_as_line,
    index_entries, render_codex,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealError {
    #[error("Collision at {path}: {first} and {second} both belong there")]
    Collision {
        path: String,
        first: String,
        second: String,
    },
}

pub type Result<T> = std::result::Result<T, HealError>;

/// A dirty chain that no longer exists in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingNode {
    pub chain: SegmentIdChain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealOutcome {
    /// Ordered: renames, codex creations, status writes, line rewrites.
    pub actions: Vec<HealAction>,
    /// Marks for the next batch (status changes bubbling up).
    pub follow_ups: Vec<(SegmentIdChain, DirtyReason)>,
    pub skipped: Vec<MissingNode>,
}

impl HealOutcome {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty() && self.follow_ups.is_empty()
    }
}

/// Sections touched by one batch.
#[derive(Debug, Default)]
struct Scope {
    /// Codex content and direct leaf names are recomputed.
    codex: BTreeSet<SegmentIdChain>,
    /// Section status is recomputed from the children.
    status: BTreeSet<SegmentIdChain>,
    /// Codex checkboxes are adopted as scroll statuses.
    adopt: BTreeSet<SegmentIdChain>,
}

/// Statuses decided during this pass, read in place of the snapshot.
#[derive(Debug, Default)]
struct StatusOverlay {
    sections: HashMap<SegmentIdChain, TreeNodeStatus>,
    scrolls: HashMap<TreeNodeLocator, TreeNodeStatus>,
}

impl StatusOverlay {
    fn status_of(&self, view: &impl TreeView, locator: &TreeNodeLocator) -> TreeNodeStatus {
        match locator.section_chain() {
            Some(chain) => self
                .sections
                .get(&chain)
                .copied()
                .or_else(|| view.get_section(&chain).map(|s| s.status))
                .unwrap_or_default(),
            None => self
                .scrolls
                .get(locator)
                .copied()
                .or_else(|| view.get_node(locator).map(|n| n.status))
                .unwrap_or_default(),
        }
    }

    fn section_status(&self, chain: &SegmentIdChain, snapshot: &NodeSnapshot) -> TreeNodeStatus {
        self.sections.get(chain).copied().unwrap_or(snapshot.status)
    }
}

/// Heal one batch of dirty sections against the current tree.
pub fn heal(batch: &[DirtyNode], view: &impl TreeView) -> Result<HealOutcome> {
    let mut outcome = HealOutcome::default();
    let scope = expand(batch, view, &mut outcome);
    debug!(
        dirty = batch.len(),
        sections = scope.codex.len(),
        skipped = outcome.skipped.len(),
        "Expanded dirty batch"
    );

    let mut overlay = StatusOverlay::default();
    let mut status_actions = adopt_checkboxes(&scope, view, &mut overlay);
    status_actions.extend(propagate_status(&scope, view, &mut overlay, &mut outcome));

    let renames = rename_to_canonical(&scope, view)?;
    let (creates, rewrites) = diff_codices(&scope, view, &overlay);

    outcome.actions.extend(renames);
    outcome.actions.extend(creates);
    outcome.actions.extend(status_actions);
    outcome.actions.extend(rewrites);
    Ok(outcome)
}

fn expand(batch: &[DirtyNode], view: &impl TreeView, outcome: &mut HealOutcome) -> Scope {
    let mut scope = Scope::default();

    for node in batch {
        if view.get_section(&node.chain).is_none() {
            warn!(chain = %node.chain, "Dirty section no longer exists, skipping");
            outcome.skipped.push(MissingNode {
                chain: node.chain.clone(),
            });
            continue;
        }

        scope.codex.insert(node.chain.clone());
        scope.status.insert(node.chain.clone());
        if node.has(DirtyReason::Content) && !node.has(DirtyReason::Status) {
            scope.adopt.insert(node.chain.clone());
        }

        if node.has(DirtyReason::Status) || node.has(DirtyReason::Suffix) {
            if let Some(parent) = node.chain.parent() {
                if view.get_section(&parent).is_some() {
                    scope.codex.insert(parent);
                }
            }
        }

        if node.has(DirtyReason::Suffix) {
            for descendant in descendant_sections(view, &node.chain) {
                scope.codex.insert(descendant.clone());
                scope.status.insert(descendant);
            }
        }
    }

    scope
}

fn descendant_sections(view: &impl TreeView, chain: &SegmentIdChain) -> Vec<SegmentIdChain> {
    let mut found = Vec::new();
    let mut to_visit = vec![chain.clone()];
    while let Some(current) = to_visit.pop() {
        for child in view.list_children(&current) {
            if let Some(section) = child.section_chain() {
                found.push(section.clone());
                to_visit.push(section);
            }
        }
    }
    found
}

/// Take scroll statuses from codex checkboxes of sections whose codex was
/// edited without any status change.
fn adopt_checkboxes(
    scope: &Scope,
    view: &impl TreeView,
    overlay: &mut StatusOverlay,
) -> Vec<HealAction> {
    let mut actions = Vec::new();

    for chain in &scope.adopt {
        let Some(codex) = view.get_section(chain).and_then(|s| s.codex.as_deref()) else {
            continue;
        };
        for (_, node, _) in index_entries(codex) {
            let IntendedTreeNode::Scroll { id, status, .. } = node else {
                continue;
            };
            let locator = TreeNodeLocator::new(chain.clone(), id);
            let Some(scroll) = view.get_node(&locator) else {
                continue;
            };
            if scroll.status == status || scroll.path.is_none() {
                continue;
            }
            info!(scroll = %locator, %status, "Adopting checkbox from codex");
            overlay.scrolls.insert(locator.clone(), status);
            actions.push(HealAction::SetStatus {
                path: CanonicalSplitPath::for_locator(&locator).to_string(),
                locator,
                status,
            });
        }
    }

    actions
}

/// Recompute section statuses deepest first so parents in the same batch see
/// their children's new values.
fn propagate_status(
    scope: &Scope,
    view: &impl TreeView,
    overlay: &mut StatusOverlay,
    outcome: &mut HealOutcome,
) -> Vec<HealAction> {
    let mut ordered: Vec<&SegmentIdChain> = scope.status.iter().filter(|c| !c.is_root()).collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut actions = Vec::new();
    for chain in ordered {
        let Some(section) = view.get_section(chain) else {
            continue;
        };
        let checkable: Vec<TreeNodeStatus> = view
            .list_children(chain)
            .iter()
            .filter(|child| child.segment_id().is_checkable())
            .map(|child| overlay.status_of(view, child))
            .collect();
        if checkable.is_empty() {
            continue;
        }

        let computed = if checkable.iter().all(|s| *s == TreeNodeStatus::Done) {
            TreeNodeStatus::Done
        } else {
            TreeNodeStatus::NotStarted
        };
        if computed == section.status {
            continue;
        }

        debug!(section = %chain, from = %section.status, to = %computed, "Section status changed");
        overlay.sections.insert(chain.clone(), computed);

        // A missing codex is created with the new status instead
        if section.path.is_some() {
            if let Some(locator) = TreeNodeLocator::for_section(chain) {
                actions.push(HealAction::SetStatus {
                    locator,
                    path: CanonicalSplitPath::for_codex(chain).to_string(),
                    status: computed,
                });
            }
        }

        if let Some(parent) = chain.parent() {
            if !scope.status.contains(&parent) {
                outcome.follow_ups.push((parent, DirtyReason::Status));
            }
        }
    }

    actions
}

fn rename_to_canonical(scope: &Scope, view: &impl TreeView) -> Result<Vec<HealAction>> {
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut actions = Vec::new();

    for chain in &scope.codex {
        let Some(section) = view.get_section(chain) else {
            continue;
        };
        let canonical = CanonicalSplitPath::for_codex(chain).to_string();
        if let Some(action) = rename_node(
            TreeNodeLocator::for_section(chain),
            section,
            canonical,
            &mut claimed,
        )? {
            actions.push(action);
        }

        for child in view.list_children(chain) {
            if child.target_kind() == TreeNodeKind::Section {
                continue;
            }
            let Some(node) = view.get_node(&child) else {
                continue;
            };
            let canonical = CanonicalSplitPath::for_locator(&child).to_string();
            if let Some(action) = rename_node(Some(child), node, canonical, &mut claimed)? {
                if let HealAction::RenameNode { from, to, .. } = &action {
                    if has_foreign_suffix(from) {
                        warn!(
                            "{} reads as a stale suffix and is renamed to {}; text after '-' in a note name is not kept",
                            from, to
                        );
                    }
                }
                actions.push(action);
            }
        }
    }

    Ok(actions)
}

/// The basename suffix names none of the folders the file lives in.
fn has_foreign_suffix(path: &str) -> bool {
    decode_split_path(path).is_ok_and(|split| {
        !split.suffix_chain.is_root()
            && split
                .suffix_chain
                .iter()
                .all(|id| !split.folders.iter().any(|folder| folder == id))
    })
}

fn rename_node(
    locator: Option<TreeNodeLocator>,
    node: &NodeSnapshot,
    canonical: String,
    claimed: &mut HashMap<String, String>,
) -> Result<Option<HealAction>> {
    let Some(path) = &node.path else {
        return Ok(None);
    };
    if let Some(other) = node.conflicting_paths.first() {
        return Err(HealError::Collision {
            path: canonical,
            first: path.clone(),
            second: other.clone(),
        });
    }
    if let Some(previous) = claimed.get(&canonical) {
        if previous != path {
            return Err(HealError::Collision {
                path: canonical,
                first: previous.clone(),
                second: path.clone(),
            });
        }
    }
    claimed.insert(canonical.clone(), path.clone());

    if *path == canonical {
        return Ok(None);
    }
    debug!(from = %path, to = %canonical, "Node needs renaming");
    Ok(Some(HealAction::RenameNode {
        locator,
        from: path.clone(),
        to: canonical,
    }))
}

/// What a section's codex should contain: the backlink first, then one entry
/// per child in listing order.
fn intended_entries(
    chain: &SegmentIdChain,
    view: &impl TreeView,
    overlay: &StatusOverlay,
) -> (Option<IntendedTreeNode>, Vec<IntendedTreeNode>) {
    let parent = chain
        .parent()
        .map(|parent_chain| IntendedTreeNode::ParentSectionCodex { parent_chain });

    let children = view
        .list_children(chain)
        .into_iter()
        .map(|child| {
            let status = overlay.status_of(view, &child);
            let chain_to_parent = child.chain_to_parent().clone();
            match child.segment_id().clone() {
                SegmentId::Section(id) => IntendedTreeNode::ChildSectionCodex {
                    chain_to_parent,
                    id,
                    status,
                },
                SegmentId::Scroll(id) => IntendedTreeNode::Scroll {
                    chain_to_parent,
                    id,
                    status,
                },
                SegmentId::File(id) => IntendedTreeNode::File {
                    chain_to_parent,
                    id,
                },
            }
        })
        .collect();

    (parent, children)
}

fn diff_codices(
    scope: &Scope,
    view: &impl TreeView,
    overlay: &StatusOverlay,
) -> (Vec<HealAction>, Vec<HealAction>) {
    let mut creates = Vec::new();
    let mut rewrites = Vec::new();

    for chain in &scope.codex {
        let Some(section) = view.get_section(chain) else {
            continue;
        };
        let codex_path = CanonicalSplitPath::for_codex(chain).to_string();
        let (parent, children) = intended_entries(chain, view, overlay);

        let Some(content) = section.codex.as_deref() else {
            let parent_line = parent.as_ref().map(format_as_line);
            let child_lines: Vec<_> = children.iter().map(format_as_line).collect();
            creates.push(HealAction::CreateCodex {
                section: chain.clone(),
                path: codex_path,
                content: render_codex(
                    overlay.section_status(chain, section),
                    parent_line.as_ref(),
                    &child_lines,
                ),
            });
            continue;
        };

        let existing = index_entries(content);
        let duplicated = duplicated_entries(content);
        let existing_lines: HashMap<&CodexEntry, &str> = existing
            .iter()
            .map(|(entry, _, line)| (entry, line.as_str()))
            .collect();

        let mut intended: HashSet<CodexEntry> = HashSet::new();
        for node in parent.iter().chain(children.iter()) {
            let entry = node.entry();
            let line = format_as_line(node);
            if existing_lines.get(&entry).copied() != Some(line.as_str())
                || duplicated.contains(&entry)
            {
                rewrites.push(HealAction::RewriteCodexLine {
                    in_section: chain.clone(),
                    codex_path: codex_path.clone(),
                    entry: entry.clone(),
                    new_line: Some(line),
                });
            }
            intended.insert(entry);
        }

        for (entry, _, _) in &existing {
            if !intended.contains(entry) {
                rewrites.push(HealAction::RewriteCodexLine {
                    in_section: chain.clone(),
                    codex_path: codex_path.clone(),
                    entry: entry.clone(),
                    new_line: None,
                });
            }
        }
    }

    (creates, rewrites)
}
