//! SegmentIdChain: the address of a node, as the sections leading to it.

use crate::error::{ParseError, Result};
use crate::segment::SectionId;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Separator of the canonical string form (`Fruit/Pie`).
pub const CHAIN_SEPARATOR: char = '/';

/// Ordered sections from the library root down to (not including) a target.
///
/// The empty chain is the library root. Chains compare structurally; the
/// `Display`/`FromStr` form is only for map keys at serialization boundaries
/// and for logs.
///
/// # Examples
/// ```
/// use library_codec::SegmentIdChain;
///
/// let chain: SegmentIdChain = "Fruit/Pie".parse().unwrap();
/// assert_eq!(chain.len(), 2);
/// assert_eq!(chain.to_string(), "Fruit/Pie");
/// assert!("".parse::<SegmentIdChain>().unwrap().is_root());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentIdChain(Vec<SectionId>);

impl SegmentIdChain {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<SectionId>) -> Self {
        Self(segments)
    }

    /// Build a chain from raw names, validating each one.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(SectionId::new)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn segments(&self) -> &[SectionId] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SectionId> {
        self.0.iter()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Depth below the library root.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Innermost section of the chain (`None` for the root).
    pub fn last(&self) -> Option<&SectionId> {
        self.0.last()
    }

    /// Chain of the enclosing section (`None` for the root).
    pub fn parent(&self) -> Option<SegmentIdChain> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Chain of a direct child section.
    pub fn child(&self, id: SectionId) -> SegmentIdChain {
        let mut segments = self.0.clone();
        segments.push(id);
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &SegmentIdChain) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Display for SegmentIdChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", CHAIN_SEPARATOR)?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for SegmentIdChain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        Self::from_names(s.split(CHAIN_SEPARATOR))
    }
}

impl<'a> IntoIterator for &'a SegmentIdChain {
    type Item = &'a SectionId;
    type IntoIter = std::slice::Iter<'a, SectionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// Serialize as the canonical string form, like other identifiers in logs and events
impl serde::Serialize for SegmentIdChain {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SegmentIdChain {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
