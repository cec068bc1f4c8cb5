//! Parse errors shared by every codec in this crate.

use thiserror::Error;

/// A value could not be decoded from its textual form.
///
/// Every codec returns these as values; nothing in this crate panics on
/// malformed input. Callers recover by skipping the offending node or line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("Malformed suffix: {suffix:?}")]
    MalformedSuffix { suffix: String },

    #[error("Unknown target kind for {path:?}")]
    UnknownTargetKind { path: String },

    #[error("Malformed locator: {0:?}")]
    MalformedLocator(String),

    #[error("Malformed codex line {line:?}: {reason}")]
    MalformedLine { line: String, reason: String },

    #[error("Kind mismatch in codex line {line:?}: {reason}")]
    KindMismatch { line: String, reason: String },
}

impl ParseError {
    pub(crate) fn invalid_segment(segment: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSegment {
            segment: segment.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_line(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn kind_mismatch(line: &str, reason: impl Into<String>) -> Self {
        Self::KindMismatch {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
