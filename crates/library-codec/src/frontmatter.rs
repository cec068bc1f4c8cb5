//! YAML frontmatter of scrolls and codex files.
//!
//! Only the `status` key is owned by the healer. Every other key is kept, in
//! its original order, when the status is rewritten.

use crate::codex::TreeNodeStatus;
use serde_yaml::{Mapping, Value};

/// Frontmatter key holding a node's status.
pub const STATUS_KEY: &str = "status";

/// Parsed markdown document
#[derive(Debug, Clone)]
pub struct ParsedMarkdown {
    /// Frontmatter mapping (None if absent, empty, or not a YAML mapping)
    pub frontmatter: Option<Mapping>,
    /// Markdown body (everything after frontmatter)
    pub body: String,
    /// The file opens with a `---` block that is not a YAML mapping.
    /// `body` is then the whole content.
    pub malformed: bool,
}

impl ParsedMarkdown {
    fn plain(content: &str, malformed: bool) -> Self {
        Self {
            frontmatter: None,
            body: content.to_string(),
            malformed,
        }
    }
}

/// Parse a markdown file into frontmatter and body.
///
/// Frontmatter must be delimited by `---` at the start of the file:
/// ```markdown
/// ---
/// status: done
/// ---
///
/// # Content here
/// ```
pub fn parse(content: &str) -> ParsedMarkdown {
    let Some(rest) = content.strip_prefix("---") else {
        return ParsedMarkdown::plain(content, false);
    };
    // The opening fence is a line of its own
    if !(rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n")) {
        return ParsedMarkdown::plain(content, false);
    }

    let Some(pos) = rest.find("\n---") else {
        return ParsedMarkdown::plain(content, true);
    };
    let yaml_content = rest[..pos].trim();
    let after = &rest[pos + 4..];
    // Rest of the closing delimiter line, then any blank lines
    let after = after.split_once('\n').map(|(_, b)| b).unwrap_or("");
    let body = after.trim_start_matches('\n').to_string();

    if yaml_content.is_empty() {
        return ParsedMarkdown {
            frontmatter: None,
            body,
            malformed: false,
        };
    }
    match serde_yaml::from_str::<Mapping>(yaml_content) {
        Ok(fm) => ParsedMarkdown {
            frontmatter: (!fm.is_empty()).then_some(fm),
            body,
            malformed: false,
        },
        Err(_) => ParsedMarkdown::plain(content, true),
    }
}

/// Serialize frontmatter and body back to markdown.
pub fn serialize(frontmatter: Option<&Mapping>, body: &str) -> String {
    match frontmatter {
        Some(fm) if !fm.is_empty() => {
            let yaml = serde_yaml::to_string(fm).unwrap_or_default();
            format!("---\n{}---\n\n{}", yaml, body)
        }
        _ => body.to_string(),
    }
}

/// Status stored in a document's frontmatter. Missing means not started.
pub fn read_status(content: &str) -> TreeNodeStatus {
    parse(content)
        .frontmatter
        .as_ref()
        .and_then(|fm| fm.get(STATUS_KEY))
        .and_then(Value::as_str)
        .map(TreeNodeStatus::from_frontmatter)
        .unwrap_or_default()
}

/// Set the frontmatter status, keeping all other keys and the body.
///
/// Returns the content unchanged when it already stores `status`. A leading
/// `---` block that is not a mapping stays in place, byte for byte, below a
/// fresh frontmatter block.
pub fn write_status(content: &str, status: TreeNodeStatus) -> String {
    let parsed = parse(content);
    let current = parsed
        .frontmatter
        .as_ref()
        .and_then(|fm| fm.get(STATUS_KEY))
        .and_then(Value::as_str);
    if current == Some(status.as_str()) {
        return content.to_string();
    }
    let body = if parsed.malformed {
        content
    } else {
        &parsed.body
    };

    let mut frontmatter = parsed.frontmatter.unwrap_or_default();
    frontmatter.insert(
        Value::String(STATUS_KEY.to_string()),
        Value::String(status.as_str().to_string()),
    );
    serialize(Some(&frontmatter), body)
}
