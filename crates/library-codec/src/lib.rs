//! Codecs for a self-healing note library.
//!
//! A library is a tree of sections (folders), scrolls (markdown notes) and
//! files (any other attachment). Every node's position is encoded three
//! ways, and this crate converts between them without loss:
//!
//! - structurally, as a [`TreeNodeLocator`] (used in memory and as map keys)
//! - on disk, as a [`CanonicalSplitPath`] whose basename repeats the ancestor
//!   chain as a suffix (`Fruit/Pie/Apple-Pie-Fruit.md`)
//! - in a section's codex, as one wiki-link line
//!   (`- [ ] [[Apple-Pie-Fruit|Apple]]`)
//!
//! Nothing here touches the filesystem; all functions are pure.

pub mod chain;
pub mod codex;
pub mod error;
pub mod frontmatter;
pub mod link;
pub mod locator;
pub mod segment;
pub mod suffix;

pub use chain::{CHAIN_SEPARATOR, SegmentIdChain};
pub use codex::{
    BACKLINK_ARROW, CodexEntry, CodexLine, IntendedTreeNode, ROOT_DISPLAY_NAME, TreeNodeStatus,
    duplicated_entries, edit_entry, format_as_line, index_entries, render_codex, try_parse_as_intended_tree_node,
};
pub use error::{ParseError, Result};
pub use frontmatter::{read_status, write_status};
pub use link::WikiLink;
pub use locator::{TreeNodeLocator, format_locator, parse_locator};
pub use segment::{
    CODEX_MARKER, FileId, MARKDOWN_EXTENSION, SUFFIX_DELIMITER, ScrollId, SectionId, SegmentId,
    TreeNodeKind,
};
pub use suffix::{
    CanonicalSplitPath, SplitPathTarget, decode_split_path, decode_suffix, encode_suffix,
    join_basename, split_basename,
};
