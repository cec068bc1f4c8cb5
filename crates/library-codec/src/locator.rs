//! TreeNodeLocator: the complete, kind-discriminated address of a node.
//!
//! String key form (used by caches, logs and events):
//! - section: `Fruit/Pie/`
//! - scroll: `Fruit/Pie/Apple.md`
//! - file: `Fruit/Pie/photo.png`

use crate::chain::{CHAIN_SEPARATOR, SegmentIdChain};
use crate::error::{ParseError, Result};
use crate::segment::{FileId, MARKDOWN_EXTENSION, ScrollId, SegmentId, TreeNodeKind};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeNodeLocator {
    chain_to_parent: SegmentIdChain,
    segment_id: SegmentId,
}

impl TreeNodeLocator {
    pub fn new(chain_to_parent: SegmentIdChain, segment_id: impl Into<SegmentId>) -> Self {
        Self {
            chain_to_parent,
            segment_id: segment_id.into(),
        }
    }

    /// Locator of the section a full chain points at (`None` for the root).
    pub fn for_section(chain: &SegmentIdChain) -> Option<Self> {
        let id = chain.last()?.clone();
        let parent = chain.parent()?;
        Some(Self::new(parent, id))
    }

    pub fn chain_to_parent(&self) -> &SegmentIdChain {
        &self.chain_to_parent
    }

    pub fn segment_id(&self) -> &SegmentId {
        &self.segment_id
    }

    pub fn target_kind(&self) -> TreeNodeKind {
        self.segment_id.kind()
    }

    pub fn name(&self) -> &str {
        self.segment_id.name()
    }

    /// Full chain of a section locator, including the section itself.
    pub fn section_chain(&self) -> Option<SegmentIdChain> {
        match &self.segment_id {
            SegmentId::Section(id) => Some(self.chain_to_parent.child(id.clone())),
            SegmentId::Scroll(_) | SegmentId::File(_) => None,
        }
    }
}

/// Format a locator as its string key. Same as `to_string()`.
pub fn format_locator(locator: &TreeNodeLocator) -> String {
    locator.to_string()
}

/// Parse a string key produced by [`format_locator`].
pub fn parse_locator(key: &str) -> Result<TreeNodeLocator> {
    key.parse()
}

impl Display for TreeNodeLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.chain_to_parent.is_root() {
            write!(f, "{}{}", self.chain_to_parent, CHAIN_SEPARATOR)?;
        }
        match &self.segment_id {
            SegmentId::Section(id) => write!(f, "{}{}", id, CHAIN_SEPARATOR),
            SegmentId::Scroll(id) => write!(f, "{}.{}", id, MARKDOWN_EXTENSION),
            SegmentId::File(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for TreeNodeLocator {
    type Err = ParseError;

    fn from_str(key: &str) -> Result<Self> {
        let malformed = || ParseError::MalformedLocator(key.to_string());

        if let Some(section_path) = key.strip_suffix(CHAIN_SEPARATOR) {
            let chain: SegmentIdChain = section_path.parse().map_err(|_| malformed())?;
            return TreeNodeLocator::for_section(&chain).ok_or_else(malformed);
        }

        let (parent, leaf) = match key.rsplit_once(CHAIN_SEPARATOR) {
            Some((parent, leaf)) => (parent, leaf),
            None => ("", key),
        };
        let chain_to_parent: SegmentIdChain = parent.parse().map_err(|_| malformed())?;

        let (name, extension) = leaf.rsplit_once('.').ok_or_else(|| {
            ParseError::UnknownTargetKind {
                path: key.to_string(),
            }
        })?;
        let segment_id = if extension == MARKDOWN_EXTENSION {
            SegmentId::Scroll(ScrollId::new(name)?)
        } else {
            SegmentId::File(FileId::new(name, extension)?)
        };

        Ok(Self {
            chain_to_parent,
            segment_id,
        })
    }
}

impl serde::Serialize for TreeNodeLocator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for TreeNodeLocator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<&TreeNodeLocator> for SegmentIdChain {
    /// Chain a locator contributes to dirty tracking: the section itself for
    /// sections, the enclosing section for leaves.
    fn from(locator: &TreeNodeLocator) -> Self {
        locator
            .section_chain()
            .unwrap_or_else(|| locator.chain_to_parent.clone())
    }
}
