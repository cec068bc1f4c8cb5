//! Codex line codec.
//!
//! A codex is the index file of a section. Each entry is one line:
//!
//! ```text
//! [[__-Fruit|← Fruit]]                  backlink to the parent section
//! - [x] [[__-Sweet-Pie-Fruit|Sweet]]    child section
//! - [ ] [[Apple-Pie-Fruit|Apple]]       scroll
//! - [[photo-Pie-Fruit.png|photo]]       file (not checkable)
//! ```
//!
//! Every line carries enough information (suffix chain, codex marker,
//! extension, checkbox) to be parsed back without knowing which codex it came
//! from. Any other text in a codex is left alone.

use crate::chain::SegmentIdChain;
use crate::error::{ParseError, Result};
use crate::frontmatter;
use crate::link::WikiLink;
use crate::locator::TreeNodeLocator;
use crate::segment::{CODEX_MARKER, FileId, MARKDOWN_EXTENSION, ScrollId, SectionId, SegmentId};
use crate::suffix::{CanonicalSplitPath, split_basename};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Alias prefix that marks the backlink to the parent section.
pub const BACKLINK_ARROW: &str = "←";

/// Display name of the library root in backlinks.
pub const ROOT_DISPLAY_NAME: &str = "Library";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNodeStatus {
    Done,
    #[default]
    NotStarted,
}

impl TreeNodeStatus {
    pub fn checkbox(&self) -> &'static str {
        match self {
            TreeNodeStatus::Done => "[x]",
            TreeNodeStatus::NotStarted => "[ ]",
        }
    }

    /// Frontmatter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeNodeStatus::Done => "done",
            TreeNodeStatus::NotStarted => "not_started",
        }
    }

    /// Lenient frontmatter decoding: anything but `done` is not started.
    pub fn from_frontmatter(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("done") {
            TreeNodeStatus::Done
        } else {
            TreeNodeStatus::NotStarted
        }
    }
}

impl Display for TreeNodeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a codex line describes. Children are never embedded: a section's own
/// entries live in its own codex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntendedTreeNode {
    Scroll {
        chain_to_parent: SegmentIdChain,
        id: ScrollId,
        status: TreeNodeStatus,
    },
    File {
        chain_to_parent: SegmentIdChain,
        id: FileId,
    },
    ChildSectionCodex {
        chain_to_parent: SegmentIdChain,
        id: SectionId,
        status: TreeNodeStatus,
    },
    ParentSectionCodex {
        parent_chain: SegmentIdChain,
    },
}

/// Identity of a line within one codex.
///
/// Children are keyed by segment id only, so a line whose suffix went stale
/// after a move still matches the entry it should be rewritten to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CodexEntry {
    Parent,
    Child(SegmentId),
}

impl Display for CodexEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodexEntry::Parent => f.write_str("parent backlink"),
            CodexEntry::Child(id) => write!(f, "{} {}", id.kind(), id.name()),
        }
    }
}

impl IntendedTreeNode {
    pub fn entry(&self) -> CodexEntry {
        match self {
            IntendedTreeNode::Scroll { id, .. } => CodexEntry::Child(id.clone().into()),
            IntendedTreeNode::File { id, .. } => CodexEntry::Child(id.clone().into()),
            IntendedTreeNode::ChildSectionCodex { id, .. } => CodexEntry::Child(id.clone().into()),
            IntendedTreeNode::ParentSectionCodex { .. } => CodexEntry::Parent,
        }
    }

    /// Locator of the node the line points at (`None` for a backlink to the root).
    pub fn locator(&self) -> Option<TreeNodeLocator> {
        match self {
            IntendedTreeNode::Scroll {
                chain_to_parent,
                id,
                ..
            } => Some(TreeNodeLocator::new(chain_to_parent.clone(), id.clone())),
            IntendedTreeNode::File {
                chain_to_parent,
                id,
            } => Some(TreeNodeLocator::new(chain_to_parent.clone(), id.clone())),
            IntendedTreeNode::ChildSectionCodex {
                chain_to_parent,
                id,
                ..
            } => Some(TreeNodeLocator::new(chain_to_parent.clone(), id.clone())),
            IntendedTreeNode::ParentSectionCodex { parent_chain } => {
                TreeNodeLocator::for_section(parent_chain)
            }
        }
    }

    pub fn status(&self) -> Option<TreeNodeStatus> {
        match self {
            IntendedTreeNode::Scroll { status, .. }
            | IntendedTreeNode::ChildSectionCodex { status, .. } => Some(*status),
            IntendedTreeNode::File { .. } | IntendedTreeNode::ParentSectionCodex { .. } => None,
        }
    }
}

/// One formatted codex line (no trailing newline).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodexLine(String);

impl CodexLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn parse(&self) -> Result<IntendedTreeNode> {
        try_parse_as_intended_tree_node(&self.0)
    }
}

impl Display for CodexLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize an intended node as a codex line.
pub fn format_as_line(node: &IntendedTreeNode) -> CodexLine {
    let line = match node {
        IntendedTreeNode::Scroll {
            chain_to_parent,
            id,
            status,
        } => {
            let path = CanonicalSplitPath::for_locator(&TreeNodeLocator::new(
                chain_to_parent.clone(),
                id.clone(),
            ));
            let link = WikiLink::new(path.basename(), None, id.as_str());
            format!("- {} {}", status.checkbox(), link)
        }
        IntendedTreeNode::File {
            chain_to_parent,
            id,
        } => {
            let path = CanonicalSplitPath::for_locator(&TreeNodeLocator::new(
                chain_to_parent.clone(),
                id.clone(),
            ));
            let link = WikiLink::new(path.basename(), Some(id.extension()), id.name());
            format!("- {}", link)
        }
        IntendedTreeNode::ChildSectionCodex {
            chain_to_parent,
            id,
            status,
        } => {
            let path = CanonicalSplitPath::for_codex(&chain_to_parent.child(id.clone()));
            let link = WikiLink::new(path.basename(), None, id.as_str());
            format!("- {} {}", status.checkbox(), link)
        }
        IntendedTreeNode::ParentSectionCodex { parent_chain } => {
            let path = CanonicalSplitPath::for_codex(parent_chain);
            let name = parent_chain
                .last()
                .map(|id| id.as_str())
                .unwrap_or(ROOT_DISPLAY_NAME);
            let link = WikiLink::new(path.basename(), None, format!("{} {}", BACKLINK_ARROW, name));
            link.to_string()
        }
    };
    CodexLine(line)
}

fn split_checkbox(text: &str) -> (Option<TreeNodeStatus>, &str) {
    for (marker, status) in [
        ("[ ]", TreeNodeStatus::NotStarted),
        ("[x]", TreeNodeStatus::Done),
        ("[X]", TreeNodeStatus::Done),
    ] {
        if let Some(rest) = text.strip_prefix(marker) {
            if rest.starts_with(char::is_whitespace) {
                return (Some(status), rest.trim_start());
            }
        }
    }
    (None, text)
}

/// Parse a codex line back into the node it describes.
///
/// Fails with `MalformedLine` when the line has none of the four shapes and
/// with `KindMismatch` when its discriminator (checkbox or backlink arrow)
/// disagrees with the linked target.
pub fn try_parse_as_intended_tree_node(line: &str) -> Result<IntendedTreeNode> {
    let trimmed = line.trim();
    let (listed, rest) = match trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let (status, rest) = if listed {
        split_checkbox(rest)
    } else {
        (None, rest)
    };

    let link = WikiLink::parse_exact(rest)
        .ok_or_else(|| ParseError::malformed_line(line, "expected a single wiki link"))?;
    if link.is_embed || link.fragment.is_some() {
        return Err(ParseError::malformed_line(
            line,
            "embeds and fragment links are not codex entries",
        ));
    }

    let (core, suffix) = split_basename(&link.name)?;
    let is_codex = core == CODEX_MARKER;
    let is_markdown = link
        .extension
        .as_deref()
        .is_none_or(|ext| ext == MARKDOWN_EXTENSION);
    let is_backlink = link
        .alias
        .as_deref()
        .is_some_and(|alias| alias.starts_with(BACKLINK_ARROW));

    match (listed, status) {
        (false, _) => {
            if !is_backlink {
                return Err(ParseError::malformed_line(
                    line,
                    "bare link without a backlink alias",
                ));
            }
            if !is_codex || !is_markdown {
                return Err(ParseError::kind_mismatch(
                    line,
                    "backlink must point at a section codex",
                ));
            }
            Ok(IntendedTreeNode::ParentSectionCodex {
                parent_chain: suffix,
            })
        }
        (true, Some(status)) => {
            if !is_markdown {
                return Err(ParseError::kind_mismatch(
                    line,
                    "checkbox on a file entry",
                ));
            }
            if is_codex {
                let (Some(id), Some(chain_to_parent)) = (suffix.last().cloned(), suffix.parent())
                else {
                    return Err(ParseError::kind_mismatch(
                        line,
                        "the root codex cannot be a child entry",
                    ));
                };
                Ok(IntendedTreeNode::ChildSectionCodex {
                    chain_to_parent,
                    id,
                    status,
                })
            } else {
                Ok(IntendedTreeNode::Scroll {
                    chain_to_parent: suffix,
                    id: ScrollId::new(core)?,
                    status,
                })
            }
        }
        (true, None) => {
            let extension = match link.extension.as_deref() {
                Some(ext) if !is_codex && !is_markdown => ext,
                _ => {
                    return Err(ParseError::kind_mismatch(
                        line,
                        "section and scroll entries need a checkbox",
                    ));
                }
            };
            Ok(IntendedTreeNode::File {
                chain_to_parent: suffix,
                id: FileId::new(core, extension)?,
            })
        }
    }
}

/// Render a new codex: status frontmatter, backlink, then one line per child.
pub fn render_codex(
    status: TreeNodeStatus,
    parent: Option<&CodexLine>,
    children: &[CodexLine],
) -> String {
    let mut body = String::new();
    if let Some(parent) = parent {
        body.push_str(parent.as_str());
        body.push_str("\n\n");
    }
    for line in children {
        body.push_str(line.as_str());
        body.push('\n');
    }
    frontmatter::write_status(&body, status)
}

/// Index every parseable entry of a codex to its line text.
///
/// When an entry appears more than once, the first occurrence wins.
pub fn index_entries(content: &str) -> Vec<(CodexEntry, IntendedTreeNode, String)> {
    let mut seen = HashSet::new();
    content
        .lines()
        .filter_map(|line| {
            let node = try_parse_as_intended_tree_node(line).ok()?;
            let entry = node.entry();
            seen.insert(entry.clone())
                .then(|| (entry, node, line.trim().to_string()))
        })
        .collect()
}

/// Entries listed on more than one line of a codex.
pub fn duplicated_entries(content: &str) -> HashSet<CodexEntry> {
    let mut seen = HashSet::new();
    content
        .lines()
        .filter_map(|line| try_parse_as_intended_tree_node(line).ok())
        .map(|node| node.entry())
        .filter(|entry| !seen.insert(entry.clone()))
        .collect()
}

/// Replace, insert, or (with `new_line = None`) remove one entry of a codex,
/// leaving every other line byte-for-byte unchanged.
///
/// An entry listed more than once collapses to its first line.
pub fn edit_entry(content: &str, entry: &CodexEntry, new_line: Option<&CodexLine>) -> String {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let positions: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            try_parse_as_intended_tree_node(line)
                .map(|node| &node.entry() == entry)
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect();

    match (positions.split_first(), new_line) {
        (Some((&first, later)), Some(new_line)) => {
            for &i in later.iter().rev() {
                lines.remove(i);
            }
            lines[first] = new_line.to_string();
        }
        (Some(_), None) => {
            for &i in positions.iter().rev() {
                lines.remove(i);
            }
        }
        (None, Some(new_line)) => insert_entry(&mut lines, entry, new_line),
        (None, None) => {}
    }

    lines.join("\n")
}

fn insert_entry(lines: &mut Vec<String>, entry: &CodexEntry, new_line: &CodexLine) {
    // Keep a trailing newline trailing
    let end = if lines.last().is_some_and(|l| l.is_empty()) {
        lines.len() - 1
    } else {
        lines.len()
    };
    let body_start = frontmatter_end(lines);

    match entry {
        CodexEntry::Parent => {
            let at = (body_start..end)
                .find(|&i| !lines[i].trim().is_empty())
                .unwrap_or(end);
            lines.insert(at, new_line.to_string());
            if at + 1 < lines.len() && !lines[at + 1].trim().is_empty() {
                lines.insert(at + 1, String::new());
            }
        }
        CodexEntry::Child(_) => {
            let last_child = (body_start..end).rev().find(|&i| {
                try_parse_as_intended_tree_node(&lines[i])
                    .map(|node| matches!(node.entry(), CodexEntry::Child(_)))
                    .unwrap_or(false)
            });
            match last_child {
                Some(i) => lines.insert(i + 1, new_line.to_string()),
                None => {
                    let mut at = end;
                    if at > body_start && !lines[at - 1].trim().is_empty() {
                        lines.insert(at, String::new());
                        at += 1;
                    }
                    lines.insert(at, new_line.to_string());
                }
            }
        }
    }
}

/// Index of the first line after a leading frontmatter block (0 when absent).
fn frontmatter_end(lines: &[String]) -> usize {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return 0;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim_end() == "---")
        .map(|(i, _)| i + 1)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(s: &str) -> SegmentIdChain {
        s.parse().unwrap()
    }

    fn scroll(parent: &str, name: &str, status: TreeNodeStatus) -> IntendedTreeNode {
        IntendedTreeNode::Scroll {
            chain_to_parent: chain(parent),
            id: ScrollId::new(name).unwrap(),
            status,
        }
    }

    fn child_section(parent: &str, name: &str, status: TreeNodeStatus) -> IntendedTreeNode {
        IntendedTreeNode::ChildSectionCodex {
            chain_to_parent: chain(parent),
            id: SectionId::new(name).unwrap(),
            status,
        }
    }

    fn file(parent: &str, name: &str, ext: &str) -> IntendedTreeNode {
        IntendedTreeNode::File {
            chain_to_parent: chain(parent),
            id: FileId::new(name, ext).unwrap(),
        }
    }

    fn backlink(parent: &str) -> IntendedTreeNode {
        IntendedTreeNode::ParentSectionCodex {
            parent_chain: chain(parent),
        }
    }

    // ==================== Formatting ====================

    #[test]
    fn test_format_each_shape() {
        assert_eq!(
            format_as_line(&scroll("Fruit/Pie", "Apple", TreeNodeStatus::NotStarted)).as_str(),
            "- [ ] [[Apple-Pie-Fruit|Apple]]"
        );
        assert_eq!(
            format_as_line(&child_section("Fruit", "Pie", TreeNodeStatus::Done)).as_str(),
            "- [x] [[__-Pie-Fruit|Pie]]"
        );
        assert_eq!(
            format_as_line(&file("Fruit/Pie", "photo", "png")).as_str(),
            "- [[photo-Pie-Fruit.png|photo]]"
        );
        assert_eq!(
            format_as_line(&backlink("Fruit")).as_str(),
            "[[__-Fruit|← Fruit]]"
        );
        assert_eq!(format_as_line(&backlink("")).as_str(), "[[__|← Library]]");
    }

    // ==================== Roundtrip ====================

    #[test]
    fn test_roundtrip_all_shapes() {
        let nodes = [
            scroll("", "Readme", TreeNodeStatus::Done),
            scroll("Fruit/Pie", "Apple", TreeNodeStatus::NotStarted),
            child_section("", "Fruit", TreeNodeStatus::NotStarted),
            child_section("Fruit/Pie", "Sweet", TreeNodeStatus::Done),
            file("", "scan", "pdf"),
            file("Fruit/Pie", "photo", "png"),
            backlink(""),
            backlink("Fruit/Pie"),
        ];
        for node in nodes {
            let line = format_as_line(&node);
            assert_eq!(line.parse().unwrap(), node, "roundtrip of {}", line);
        }
    }

    // ==================== Lenient parsing ====================

    #[test]
    fn test_parse_accepts_variants() {
        let node = try_parse_as_intended_tree_node("  * [X]   [[Apple-Pie-Fruit.md|whatever]]  ").unwrap();
        assert_eq!(node, scroll("Fruit/Pie", "Apple", TreeNodeStatus::Done));
    }

    #[test]
    fn test_parse_ignores_alias_text() {
        // A hand-edited alias still identifies the same child
        let node = try_parse_as_intended_tree_node("- [ ] [[Apple-Pie-Fruit|Granny Smith]]").unwrap();
        assert_eq!(node.entry(), scroll("Fruit/Pie", "Apple", TreeNodeStatus::NotStarted).entry());
    }

    // ==================== Errors ====================

    #[test]
    fn test_parse_rejects_unrelated_text() {
        for line in [
            "",
            "# Pie",
            "Some notes about pies",
            "- [ ] buy flour",
            "- [ ] see [[Apple-Pie-Fruit]] later",
            "[[Apple-Pie-Fruit|Apple]]",
            "- [ ] ![[Apple-Pie-Fruit]]",
            "- [ ] [[Apple-Pie-Fruit#Steps|Apple]]",
        ] {
            assert!(
                matches!(
                    try_parse_as_intended_tree_node(line),
                    Err(ParseError::MalformedLine { .. })
                ),
                "{:?} should be malformed",
                line
            );
        }
    }

    #[test]
    fn test_parse_detects_kind_mismatch() {
        for line in [
            "- [x] [[photo-Pie-Fruit.png|photo]]",
            "- [[Apple-Pie-Fruit|Apple]]",
            "- [[__-Pie-Fruit|Pie]]",
            "- [ ] [[__|Library]]",
            "[[Apple-Fruit|← Fruit]]",
        ] {
            assert!(
                matches!(
                    try_parse_as_intended_tree_node(line),
                    Err(ParseError::KindMismatch { .. })
                ),
                "{:?} should be a kind mismatch",
                line
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_suffix() {
        assert!(matches!(
            try_parse_as_intended_tree_node("- [ ] [[Apple--Fruit|Apple]]"),
            Err(ParseError::MalformedSuffix { .. })
        ));
    }

    // ==================== Codex documents ====================

    #[test]
    fn test_render_codex_layout() {
        let parent = format_as_line(&backlink("Fruit"));
        let children = [
            format_as_line(&scroll("Fruit/Pie", "Apple", TreeNodeStatus::Done)),
            format_as_line(&file("Fruit/Pie", "photo", "png")),
        ];
        let content = render_codex(TreeNodeStatus::Done, Some(&parent), &children);
        assert_eq!(
            content,
            "---\nstatus: done\n---\n\n[[__-Fruit|← Fruit]]\n\n- [x] [[Apple-Pie-Fruit|Apple]]\n- [[photo-Pie-Fruit.png|photo]]\n"
        );
        assert_eq!(index_entries(&content).len(), 3);
    }

    #[test]
    fn test_edit_entry_replaces_in_place() {
        let content = "# Pie\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\nmy own note\n";
        let line = format_as_line(&scroll("Fruit/Pie", "Apple", TreeNodeStatus::Done));
        let entry = CodexEntry::Child(SegmentId::Scroll(ScrollId::new("Apple").unwrap()));
        let edited = edit_entry(content, &entry, Some(&line));
        assert_eq!(edited, "# Pie\n\n- [x] [[Apple-Pie-Fruit|Apple]]\nmy own note\n");
    }

    #[test]
    fn test_edit_entry_collapses_duplicate_lines() {
        let content = "# Pie\n\n- [ ] [[Apple-Old|Apple]]\nmy own note\n- [ ] [[Apple-Pie-Fruit|Apple]]\n";
        let apple = CodexEntry::Child(SegmentId::Scroll(ScrollId::new("Apple").unwrap()));
        assert_eq!(duplicated_entries(content), HashSet::from([apple.clone()]));

        let line = format_as_line(&scroll("Fruit/Pie", "Apple", TreeNodeStatus::NotStarted));
        let edited = edit_entry(content, &apple, Some(&line));
        assert_eq!(edited, "# Pie\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\nmy own note\n");
        assert!(duplicated_entries(&edited).is_empty());

        assert_eq!(edit_entry(content, &apple, None), "# Pie\n\nmy own note\n");
    }

    #[test]
    fn test_edit_entry_removes_and_appends() {
        let content = "[[__-Fruit|← Fruit]]\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\n";
        let apple = CodexEntry::Child(SegmentId::Scroll(ScrollId::new("Apple").unwrap()));
        let removed = edit_entry(content, &apple, None);
        assert_eq!(removed, "[[__-Fruit|← Fruit]]\n\n");

        let pear = format_as_line(&scroll("Fruit/Pie", "Pear", TreeNodeStatus::NotStarted));
        let pear_entry = CodexEntry::Child(SegmentId::Scroll(ScrollId::new("Pear").unwrap()));
        let appended = edit_entry(content, &pear_entry, Some(&pear));
        assert_eq!(
            appended,
            "[[__-Fruit|← Fruit]]\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\n- [ ] [[Pear-Pie-Fruit|Pear]]\n"
        );
    }

    #[test]
    fn test_edit_entry_inserts_backlink_after_frontmatter() {
        let content = "---\nstatus: done\n---\n\n- [x] [[Apple-Pie-Fruit|Apple]]\n";
        let parent = format_as_line(&backlink("Fruit"));
        let edited = edit_entry(content, &CodexEntry::Parent, Some(&parent));
        assert_eq!(
            edited,
            "---\nstatus: done\n---\n\n[[__-Fruit|← Fruit]]\n\n- [x] [[Apple-Pie-Fruit|Apple]]\n"
        );
    }

    #[test]
    fn test_edit_entry_first_child_gets_blank_separator() {
        let content = "[[__-Fruit|← Fruit]]\n";
        let line = format_as_line(&scroll("Fruit/Pie", "Apple", TreeNodeStatus::NotStarted));
        let entry = CodexEntry::Child(SegmentId::Scroll(ScrollId::new("Apple").unwrap()));
        assert_eq!(
            edit_entry(content, &entry, Some(&line)),
            "[[__-Fruit|← Fruit]]\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\n"
        );
    }
}
