//! Actions the healer asks the vault to perform.

use crate::tracker::DirtyReason;
use library_codec::{CodexEntry, CodexLine, SegmentIdChain, TreeNodeKind, TreeNodeLocator, TreeNodeStatus};
use std::fmt::{self, Display, Formatter};

/// One write against the vault.
///
/// Paths are library-relative and already final: anything written after a
/// rename in the same batch addresses the post-rename path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealAction {
    /// Move a node's file to its canonical path. `locator` is `None` for the
    /// root codex.
    RenameNode {
        locator: Option<TreeNodeLocator>,
        from: String,
        to: String,
    },
    /// Write a fresh codex for a section that has none.
    CreateCodex {
        section: SegmentIdChain,
        path: String,
        content: String,
    },
    /// Store a status in the frontmatter of a scroll or section codex.
    SetStatus {
        locator: TreeNodeLocator,
        path: String,
        status: TreeNodeStatus,
    },
    /// Replace, insert, or (with `new_line = None`) remove one codex entry.
    RewriteCodexLine {
        in_section: SegmentIdChain,
        codex_path: String,
        entry: CodexEntry,
        new_line: Option<CodexLine>,
    },
}

impl HealAction {
    /// Position in the apply order: renames, codex creations, status writes, line rewrites.
    pub fn phase(&self) -> u8 {
        match self {
            HealAction::RenameNode { .. } => 0,
            HealAction::CreateCodex { .. } => 1,
            HealAction::SetStatus { .. } => 2,
            HealAction::RewriteCodexLine { .. } => 3,
        }
    }

    /// Section whose healing reproduces this action.
    pub fn affected_chain(&self) -> SegmentIdChain {
        match self {
            HealAction::RenameNode { locator, .. } => locator
                .as_ref()
                .map(SegmentIdChain::from)
                .unwrap_or_default(),
            HealAction::CreateCodex { section, .. } => section.clone(),
            HealAction::SetStatus { locator, .. } => SegmentIdChain::from(locator),
            HealAction::RewriteCodexLine { in_section, .. } => in_section.clone(),
        }
    }

    /// Mark that makes the next batch retry this action after a failed apply.
    ///
    /// Only a scroll status adopted from a codex checkbox is retried as a
    /// content edit; everything else is retried as a status change so that
    /// the frontmatter stays authoritative.
    pub fn retry_mark(&self) -> (SegmentIdChain, DirtyReason) {
        let reason = match self {
            HealAction::SetStatus { locator, .. } if locator.target_kind() == TreeNodeKind::Scroll => {
                DirtyReason::Content
            }
            _ => DirtyReason::Status,
        };
        (self.affected_chain(), reason)
    }

    /// Paths written or moved by this action.
    pub fn touched_paths(&self) -> Vec<&str> {
        match self {
            HealAction::RenameNode { from, to, .. } => vec![from.as_str(), to.as_str()],
            HealAction::CreateCodex { path, .. } | HealAction::SetStatus { path, .. } => {
                vec![path.as_str()]
            }
            HealAction::RewriteCodexLine { codex_path, .. } => vec![codex_path.as_str()],
        }
    }
}

impl Display for HealAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HealAction::RenameNode { from, to, .. } => write!(f, "rename {} -> {}", from, to),
            HealAction::CreateCodex { path, .. } => write!(f, "create codex {}", path),
            HealAction::SetStatus { path, status, .. } => write!(f, "set status {} on {}", status, path),
            HealAction::RewriteCodexLine {
                codex_path,
                entry,
                new_line,
                ..
            } => match new_line {
                Some(line) => write!(f, "rewrite {} in {}: {}", entry, codex_path, line),
                None => write!(f, "remove {} from {}", entry, codex_path),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(s: &str) -> TreeNodeLocator {
        s.parse().unwrap()
    }

    #[test]
    fn test_affected_chain_and_retry_mark() {
        let rename = HealAction::RenameNode {
            locator: Some(locator("Fruit/Apple.md")),
            from: "Fruit/Apple.md".into(),
            to: "Fruit/Apple-Fruit.md".into(),
        };
        assert_eq!(
            rename.retry_mark(),
            ("Fruit".parse().unwrap(), DirtyReason::Status)
        );

        let root_codex = HealAction::RenameNode {
            locator: None,
            from: "__-Old.md".into(),
            to: "__.md".into(),
        };
        assert!(root_codex.affected_chain().is_root());

        let section_status = HealAction::SetStatus {
            locator: locator("Fruit/Pie/"),
            path: "Fruit/Pie/__-Pie-Fruit.md".into(),
            status: TreeNodeStatus::Done,
        };
        assert_eq!(
            section_status.retry_mark(),
            ("Fruit/Pie".parse().unwrap(), DirtyReason::Status)
        );

        let adopted = HealAction::SetStatus {
            locator: locator("Fruit/Pie/Apple.md"),
            path: "Fruit/Pie/Apple-Pie-Fruit.md".into(),
            status: TreeNodeStatus::Done,
        };
        assert_eq!(
            adopted.retry_mark(),
            ("Fruit/Pie".parse().unwrap(), DirtyReason::Content)
        );
    }

    #[test]
    fn test_touched_paths_and_display() {
        let rename = HealAction::RenameNode {
            locator: Some(locator("Fruit/Apple.md")),
            from: "Fruit/Apple.md".into(),
            to: "Fruit/Apple-Fruit.md".into(),
        };
        assert_eq!(rename.touched_paths(), vec!["Fruit/Apple.md", "Fruit/Apple-Fruit.md"]);
        assert_eq!(rename.to_string(), "rename Fruit/Apple.md -> Fruit/Apple-Fruit.md");
        assert!(rename.phase() < HealAction::CreateCodex {
            section: SegmentIdChain::root(),
            path: "__.md".into(),
            content: String::new(),
        }
        .phase());
    }
}
