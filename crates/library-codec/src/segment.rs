//! Segment identifiers: the validated name of one node inside its parent section.
//!
//! A segment name ends up verbatim in folder names, filename suffixes and codex
//! links, so the rules here are what make every encoding in this crate lossless:
//! - non-empty, no leading/trailing whitespace
//! - no path separators, wiki-link syntax (`| [ ] # ^`), dots, control characters
//! - no suffix delimiter (`-`), so joined suffixes split back unambiguously
//! - must not start with the codex marker (`__`)

use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Joins a node's core name to its ancestor suffix tokens.
pub const SUFFIX_DELIMITER: char = '-';

/// Core name of every codex (section index) file.
pub const CODEX_MARKER: &str = "__";

/// Extension of scrolls and codex files.
pub const MARKDOWN_EXTENSION: &str = "md";

const FORBIDDEN_CHARS: &[char] = &['/', '\\', '|', '[', ']', '#', '^', '.', SUFFIX_DELIMITER];

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ParseError::invalid_segment(name, "empty name"));
    }
    if name.trim() != name {
        return Err(ParseError::invalid_segment(
            name,
            "leading or trailing whitespace",
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(ParseError::invalid_segment(
            name,
            format!("forbidden character {:?}", c),
        ));
    }
    if name.starts_with(CODEX_MARKER) {
        return Err(ParseError::invalid_segment(name, "reserved codex marker prefix"));
    }
    Ok(())
}

fn validate_extension(name: &str, extension: &str) -> Result<()> {
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ParseError::invalid_segment(
            name,
            format!("invalid extension {:?}", extension),
        ));
    }
    if extension.eq_ignore_ascii_case(MARKDOWN_EXTENSION) {
        return Err(ParseError::invalid_segment(
            name,
            "markdown files are scrolls, not files",
        ));
    }
    Ok(())
}

macro_rules! name_id {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $ty(String);

        impl $ty {
            /// Validate and wrap a node name.
            pub fn new(name: impl Into<String>) -> Result<Self> {
                let name = name.into();
                validate_name(&name)?;
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

name_id!(
    /// Name of a section (a branch node, stored as a folder).
    SectionId
);

name_id!(
    /// Name of a scroll (a markdown leaf document).
    ScrollId
);

/// Name plus extension of a non-markdown leaf (image, pdf, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    name: String,
    extension: String,
}

impl FileId {
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let extension = extension.into();
        validate_name(&name)?;
        validate_extension(&name, &extension)?;
        Ok(Self { name, extension })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.extension)
    }
}

/// Discriminates the three node kinds of a library tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeKind {
    Section,
    Scroll,
    File,
}

impl Display for TreeNodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TreeNodeKind::Section => f.write_str("section"),
            TreeNodeKind::Scroll => f.write_str("scroll"),
            TreeNodeKind::File => f.write_str("file"),
        }
    }
}

/// Kind-discriminated identifier of a node within its parent section.
///
/// Ordering puts sections first, then scrolls, then files, each by name,
/// which is the order children are listed in a codex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Section(SectionId),
    Scroll(ScrollId),
    File(FileId),
}

impl SegmentId {
    pub fn kind(&self) -> TreeNodeKind {
        match self {
            SegmentId::Section(_) => TreeNodeKind::Section,
            SegmentId::Scroll(_) => TreeNodeKind::Scroll,
            SegmentId::File(_) => TreeNodeKind::File,
        }
    }

    /// Node name without any extension.
    pub fn name(&self) -> &str {
        match self {
            SegmentId::Section(id) => id.as_str(),
            SegmentId::Scroll(id) => id.as_str(),
            SegmentId::File(id) => id.name(),
        }
    }

    /// On-disk extension of the node's own file (`None` for sections).
    pub fn extension(&self) -> Option<&str> {
        match self {
            SegmentId::Section(_) => None,
            SegmentId::Scroll(_) => Some(MARKDOWN_EXTENSION),
            SegmentId::File(id) => Some(id.extension()),
        }
    }

    /// Whether the node carries a status checkbox in its parent's codex.
    pub fn is_checkable(&self) -> bool {
        !matches!(self, SegmentId::File(_))
    }
}

impl From<SectionId> for SegmentId {
    fn from(id: SectionId) -> Self {
        SegmentId::Section(id)
    }
}

impl From<ScrollId> for SegmentId {
    fn from(id: ScrollId) -> Self {
        SegmentId::Scroll(id)
    }
}

impl From<FileId> for SegmentId {
    fn from(id: FileId) -> Self {
        SegmentId::File(id)
    }
}
