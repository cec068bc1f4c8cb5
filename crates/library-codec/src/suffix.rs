//! Suffix chains and canonical split paths.
//!
//! A node's on-disk basename is its core name followed by the names of its
//! ancestors, nearest first, each joined with `-`:
//!
//! ```text
//! Fruit/Pie/Apple-Pie-Fruit.md     scroll "Apple" in [Fruit, Pie]
//! Fruit/Pie/photo-Pie-Fruit.png    file "photo.png" in [Fruit, Pie]
//! Fruit/Pie/__-Pie-Fruit.md        codex of section [Fruit, Pie]
//! __.md                            codex of the library root
//! ```
//!
//! The folder a file lives in is the source of truth for its position; the
//! suffix is derived data that the healer rewrites when it drifts.

use crate::chain::{CHAIN_SEPARATOR, SegmentIdChain};
use crate::error::{ParseError, Result};
use crate::locator::TreeNodeLocator;
use crate::segment::{
    CODEX_MARKER, FileId, MARKDOWN_EXTENSION, ScrollId, SectionId, SegmentId, SUFFIX_DELIMITER,
    TreeNodeKind,
};
use std::fmt::{self, Display, Formatter};

/// Encode a chain as a filename suffix (nearest ancestor first).
///
/// Injective over valid chains: segment names can neither be empty nor contain
/// the delimiter, so the joined string splits back into exactly one chain.
pub fn encode_suffix(chain: &SegmentIdChain) -> String {
    chain
        .segments()
        .iter()
        .rev()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(&SUFFIX_DELIMITER.to_string())
}

/// Inverse of [`encode_suffix`].
pub fn decode_suffix(suffix: &str) -> Result<SegmentIdChain> {
    if suffix.is_empty() {
        return Ok(SegmentIdChain::root());
    }
    let mut segments = suffix
        .split(SUFFIX_DELIMITER)
        .map(SectionId::new)
        .collect::<Result<Vec<_>>>()
        .map_err(|_| ParseError::MalformedSuffix {
            suffix: suffix.to_string(),
        })?;
    segments.reverse();
    Ok(SegmentIdChain::new(segments))
}

/// Split a basename into its core name and decoded suffix chain.
pub fn split_basename(basename: &str) -> Result<(&str, SegmentIdChain)> {
    match basename.split_once(SUFFIX_DELIMITER) {
        Some((core, suffix)) => {
            if core.is_empty() {
                return Err(ParseError::MalformedSuffix {
                    suffix: basename.to_string(),
                });
            }
            Ok((core, decode_suffix(suffix)?))
        }
        None => Ok((basename, SegmentIdChain::root())),
    }
}

/// Join a core name and a suffix chain into a basename.
pub fn join_basename(core: &str, suffix: &SegmentIdChain) -> String {
    if suffix.is_root() {
        core.to_string()
    } else {
        format!("{}{}{}", core, SUFFIX_DELIMITER, encode_suffix(suffix))
    }
}

/// What the basename of a split path names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SplitPathTarget {
    /// Index file of the section the path's folder chain points at.
    Codex,
    Scroll(ScrollId),
    File(FileId),
}

/// A library path decomposed into folders, target, and suffix chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalSplitPath {
    /// Folders the file lives in, root first.
    pub folders: SegmentIdChain,
    pub target: SplitPathTarget,
    /// Chain decoded from the basename suffix, root first.
    pub suffix_chain: SegmentIdChain,
}

impl CanonicalSplitPath {
    /// Canonical path of a node. Sections map to their codex file.
    pub fn for_locator(locator: &TreeNodeLocator) -> Self {
        let folders = locator.chain_to_parent().clone();
        match locator.segment_id() {
            SegmentId::Section(id) => Self::for_codex(&folders.child(id.clone())),
            SegmentId::Scroll(id) => Self {
                suffix_chain: folders.clone(),
                folders,
                target: SplitPathTarget::Scroll(id.clone()),
            },
            SegmentId::File(id) => Self {
                suffix_chain: folders.clone(),
                folders,
                target: SplitPathTarget::File(id.clone()),
            },
        }
    }

    /// Canonical path of a section's codex (`__.md` for the root).
    pub fn for_codex(section: &SegmentIdChain) -> Self {
        Self {
            folders: section.clone(),
            target: SplitPathTarget::Codex,
            suffix_chain: section.clone(),
        }
    }

    pub fn kind(&self) -> TreeNodeKind {
        match self.target {
            SplitPathTarget::Codex => TreeNodeKind::Section,
            SplitPathTarget::Scroll(_) => TreeNodeKind::Scroll,
            SplitPathTarget::File(_) => TreeNodeKind::File,
        }
    }

    /// True when the suffix agrees with the folder location.
    pub fn is_canonical(&self) -> bool {
        self.suffix_chain == self.folders
    }

    /// The same target with its suffix rewritten to match its folders.
    pub fn canonicalized(&self) -> Self {
        Self {
            folders: self.folders.clone(),
            target: self.target.clone(),
            suffix_chain: self.folders.clone(),
        }
    }

    pub fn core_name(&self) -> &str {
        match &self.target {
            SplitPathTarget::Codex => CODEX_MARKER,
            SplitPathTarget::Scroll(id) => id.as_str(),
            SplitPathTarget::File(id) => id.name(),
        }
    }

    pub fn extension(&self) -> &str {
        match &self.target {
            SplitPathTarget::Codex | SplitPathTarget::Scroll(_) => MARKDOWN_EXTENSION,
            SplitPathTarget::File(id) => id.extension(),
        }
    }

    /// Basename without extension (`Apple-Pie-Fruit`).
    pub fn basename(&self) -> String {
        join_basename(self.core_name(), &self.suffix_chain)
    }

    /// File name with extension (`Apple-Pie-Fruit.md`).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.basename(), self.extension())
    }

    /// Address of the node this path stores, decoded from its folder location.
    ///
    /// Returns `None` for the root codex, which has no locator.
    pub fn to_locator(&self) -> Option<TreeNodeLocator> {
        match &self.target {
            SplitPathTarget::Codex => TreeNodeLocator::for_section(&self.folders),
            SplitPathTarget::Scroll(id) => {
                Some(TreeNodeLocator::new(self.folders.clone(), id.clone()))
            }
            SplitPathTarget::File(id) => {
                Some(TreeNodeLocator::new(self.folders.clone(), id.clone()))
            }
        }
    }
}

impl Display for CanonicalSplitPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.folders.is_root() {
            write!(f, "{}{}", self.folders, CHAIN_SEPARATOR)?;
        }
        f.write_str(&self.file_name())
    }
}

/// Decode a library-relative path.
///
/// Fails with [`ParseError::MalformedSuffix`] when the basename suffix cannot be
/// tokenized, [`ParseError::UnknownTargetKind`] when the file name does not have
/// the shape of any node kind, and [`ParseError::InvalidSegment`] when a folder
/// or core name is not a valid segment.
pub fn decode_split_path(path: &str) -> Result<CanonicalSplitPath> {
    let path = path.trim_matches(CHAIN_SEPARATOR);
    let unknown = || ParseError::UnknownTargetKind {
        path: path.to_string(),
    };

    let (folder_part, file_name) = match path.rsplit_once(CHAIN_SEPARATOR) {
        Some((folders, file_name)) => (folders, file_name),
        None => ("", path),
    };
    if file_name.is_empty() || file_name.starts_with('.') {
        return Err(unknown());
    }
    let (basename, extension) = file_name.rsplit_once('.').ok_or_else(unknown)?;
    if extension.is_empty() {
        return Err(unknown());
    }

    let folders: SegmentIdChain = folder_part.parse()?;
    let (core, suffix_chain) = split_basename(basename)?;

    let target = if core == CODEX_MARKER {
        if extension != MARKDOWN_EXTENSION {
            return Err(unknown());
        }
        SplitPathTarget::Codex
    } else if extension == MARKDOWN_EXTENSION {
        SplitPathTarget::Scroll(ScrollId::new(core)?)
    } else {
        SplitPathTarget::File(FileId::new(core, extension).map_err(|_| unknown())?)
    };

    Ok(CanonicalSplitPath {
        folders,
        target,
        suffix_chain,
    })
}
