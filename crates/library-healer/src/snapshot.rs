//! Read-only view of a library tree, as the healer sees it.
//!
//! The folder a file lives in decides which node it belongs to; the basename
//! suffix is only checked against it. Two files that decode to the same node
//! are both kept so the healer can report the collision instead of silently
//! picking one.

use library_codec::{
    CanonicalSplitPath, SegmentId, SegmentIdChain, SplitPathTarget, TreeNodeKind, TreeNodeLocator,
    TreeNodeStatus, decode_split_path, read_status,
};
use std::collections::{BTreeSet, HashMap};

/// What the vault currently stores for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub kind: TreeNodeKind,
    /// On-disk path of the node's file. For sections this is the codex, and
    /// `None` when the section folder has no codex.
    pub path: Option<String>,
    /// Frontmatter status (scrolls and codex files; files are always `NotStarted`).
    pub status: TreeNodeStatus,
    /// Full codex text, for sections that have one.
    pub codex: Option<String>,
    /// Further paths that decode to this same node.
    pub conflicting_paths: Vec<String>,
}

impl NodeSnapshot {
    pub fn new(kind: TreeNodeKind) -> Self {
        Self {
            kind,
            path: None,
            status: TreeNodeStatus::default(),
            codex: None,
            conflicting_paths: Vec::new(),
        }
    }
}

/// Read access the healer needs.
pub trait TreeView {
    /// Section by full chain (the empty chain is the library root).
    fn get_section(&self, chain: &SegmentIdChain) -> Option<&NodeSnapshot>;

    /// Any node by locator.
    fn get_node(&self, locator: &TreeNodeLocator) -> Option<&NodeSnapshot>;

    /// Direct children of a section: sections, then scrolls, then files, each by name.
    fn list_children(&self, chain: &SegmentIdChain) -> Vec<TreeNodeLocator>;
}

/// A scanned library. The root section always exists.
#[derive(Debug, Clone)]
pub struct LibrarySnapshot {
    sections: HashMap<SegmentIdChain, NodeSnapshot>,
    leaves: HashMap<TreeNodeLocator, NodeSnapshot>,
    children: HashMap<SegmentIdChain, BTreeSet<SegmentId>>,
}

impl Default for LibrarySnapshot {
    fn default() -> Self {
        let mut sections = HashMap::new();
        sections.insert(
            SegmentIdChain::root(),
            NodeSnapshot::new(TreeNodeKind::Section),
        );
        Self {
            sections,
            leaves: HashMap::new(),
            children: HashMap::new(),
        }
    }
}

impl LibrarySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a section folder (and any missing ancestors).
    pub fn insert_section(&mut self, chain: &SegmentIdChain) {
        let mut current = SegmentIdChain::root();
        for id in chain {
            let parent = current.clone();
            current = current.child(id.clone());
            if !self.sections.contains_key(&current) {
                self.sections
                    .insert(current.clone(), NodeSnapshot::new(TreeNodeKind::Section));
                self.children
                    .entry(parent)
                    .or_default()
                    .insert(SegmentId::Section(id.clone()));
            }
        }
    }

    /// Register a file by its library-relative path.
    ///
    /// `content` is the text of scrolls and codex files; it is ignored for
    /// other files. Paths that do not decode as a library node are rejected
    /// with the parse error and leave the snapshot unchanged.
    pub fn insert_file(
        &mut self,
        path: &str,
        content: Option<&str>,
    ) -> library_codec::Result<TreeNodeKind> {
        let split = decode_split_path(path)?;
        let path = split_path_string(path);
        self.insert_section(&split.folders);

        match &split.target {
            SplitPathTarget::Codex => {
                if let Some(section) = self.sections.get_mut(&split.folders) {
                    record(section, path, content, true);
                }
                Ok(TreeNodeKind::Section)
            }
            SplitPathTarget::Scroll(_) | SplitPathTarget::File(_) => {
                let Some(locator) = split.to_locator() else {
                    return Ok(split.kind());
                };
                let kind = split.kind();
                let is_scroll = kind == TreeNodeKind::Scroll;
                self.children
                    .entry(split.folders.clone())
                    .or_default()
                    .insert(locator.segment_id().clone());
                let leaf = self
                    .leaves
                    .entry(locator)
                    .or_insert_with(|| NodeSnapshot::new(kind));
                record(leaf, path, content.filter(|_| is_scroll), false);
                Ok(kind)
            }
        }
    }

    /// Every section chain, parents before children.
    pub fn all_section_chains(&self) -> Vec<SegmentIdChain> {
        let mut chains: Vec<_> = self.sections.keys().cloned().collect();
        chains.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        chains
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Canonical path of every node (codex files for sections), for tests and reports.
    pub fn canonical_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .sections
            .iter()
            .filter(|(_, s)| s.path.is_some())
            .map(|(chain, _)| CanonicalSplitPath::for_codex(chain).to_string())
            .chain(
                self.leaves
                    .keys()
                    .map(|l| CanonicalSplitPath::for_locator(l).to_string()),
            )
            .collect();
        paths.sort();
        paths
    }
}

fn split_path_string(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Attach a file to a node, keeping the smallest path as primary.
fn record(node: &mut NodeSnapshot, path: String, content: Option<&str>, is_codex: bool) {
    let take_primary = match &node.path {
        None => true,
        Some(existing) if path < *existing => {
            node.conflicting_paths.push(existing.clone());
            true
        }
        Some(_) => {
            node.conflicting_paths.push(path.clone());
            false
        }
    };
    node.conflicting_paths.sort();
    if take_primary {
        node.path = Some(path);
        if let Some(content) = content {
            node.status = read_status(content);
            if is_codex {
                node.codex = Some(content.to_string());
            }
        }
    }
}

impl TreeView for LibrarySnapshot {
    fn get_section(&self, chain: &SegmentIdChain) -> Option<&NodeSnapshot> {
        self.sections.get(chain)
    }

    fn get_node(&self, locator: &TreeNodeLocator) -> Option<&NodeSnapshot> {
        match locator.section_chain() {
            Some(chain) => self.sections.get(&chain),
            None => self.leaves.get(locator),
        }
    }

    fn list_children(&self, chain: &SegmentIdChain) -> Vec<TreeNodeLocator> {
        self.children
            .get(chain)
            .map(|ids| {
                ids.iter()
                    .map(|id| TreeNodeLocator::new(chain.clone(), id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
