//! Obsidian-style wiki links as they appear in codex lines.
//!
//! Supports:
//! - Basic links: `[[Apple-Pie-Fruit]]`
//! - Aliases: `[[Apple-Pie-Fruit|Apple]]`
//! - Extensions: `[[photo-Pie-Fruit.png|photo]]`
//! - Folder-qualified targets: `[[Fruit/Pie/Apple-Pie-Fruit]]` (folders are ignored by the codex)
//! - Fragments and embeds are recognized so callers can reject them

use std::fmt::{self, Display, Formatter};

/// A parsed wiki link.
///
/// Field naming follows `std::path::Path` conventions where applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Target name without folders or extension: "Apple-Pie-Fruit" (like `Path::file_stem()`)
    pub name: String,
    /// Folder part of the target, if written out: "Fruit/Pie"
    pub parent: Option<String>,
    /// Extension without the dot: "png", or None when omitted
    pub extension: Option<String>,
    /// Header or block fragment after `#`, if present
    pub fragment: Option<String>,
    /// Display alias after `|`, if present
    pub alias: Option<String>,
    /// Whether this is an embed (`![[...]]`)
    pub is_embed: bool,
}

impl WikiLink {
    /// Link to `name` (plus optional extension) displayed as `alias`.
    pub fn new(name: impl Into<String>, extension: Option<&str>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            extension: extension.map(str::to_string),
            fragment: None,
            alias: Some(alias.into()),
            is_embed: false,
        }
    }

    /// Parse text that must consist of exactly one wiki link (surrounding
    /// whitespace allowed). Returns `None` for anything else.
    pub fn parse_exact(text: &str) -> Option<WikiLink> {
        let text = text.trim();
        let (is_embed, rest) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let inner = rest.strip_prefix("[[")?.strip_suffix("]]")?;
        if inner.is_empty() || inner.contains("[[") || inner.contains("]]") {
            return None;
        }
        Some(parse_link_content(inner, is_embed))
    }

    /// Returns alias if present, otherwise the name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl Display for WikiLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_embed {
            f.write_str("!")?;
        }
        f.write_str("[[")?;
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        }
        f.write_str(&self.name)?;
        if let Some(ext) = &self.extension {
            write!(f, ".{}", ext)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        if let Some(alias) = &self.alias {
            write!(f, "|{}", alias)?;
        }
        f.write_str("]]")
    }
}

/// Parse the content inside [[ ]] into a WikiLink
fn parse_link_content(content: &str, is_embed: bool) -> WikiLink {
    let (target, alias) = match content.split_once('|') {
        Some((target, alias)) => (target, Some(alias.to_string())),
        None => (content, None),
    };

    let (path, fragment) = match target.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment.to_string())),
        None => (target, None),
    };

    let (parent, name, extension) = parse_path(path);

    WikiLink {
        name,
        parent,
        extension,
        fragment,
        alias,
        is_embed,
    }
}

/// Parse a path string into (parent, name, extension)
fn parse_path(path: &str) -> (Option<String>, String, Option<String>) {
    let path = path.trim();

    let (parent, file_name) = match path.rsplit_once('/') {
        Some((parent, file_name)) => (Some(parent.to_string()), file_name),
        None => (None, path),
    };

    // Split at the last dot; segment names never contain one
    match file_name.rsplit_once('.') {
        Some((name, ext)) => (parent, name.to_string(), Some(ext.to_string())),
        None => (parent, file_name.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_link_with_alias() {
        let link = WikiLink::parse_exact("[[Apple-Pie-Fruit|Apple]]").unwrap();
        assert_eq!(link.name, "Apple-Pie-Fruit");
        assert_eq!(link.alias.as_deref(), Some("Apple"));
        assert_eq!(link.extension, None);
        assert_eq!(link.display_name(), "Apple");
        assert!(!link.is_embed);
    }

    #[test]
    fn parse_link_with_extension() {
        let link = WikiLink::parse_exact("[[photo-Pie-Fruit.png|photo]]").unwrap();
        assert_eq!(link.name, "photo-Pie-Fruit");
        assert_eq!(link.extension.as_deref(), Some("png"));
    }

    #[test]
    fn parse_link_with_folders() {
        let link = WikiLink::parse_exact("[[Fruit/Pie/Apple-Pie-Fruit.md]]").unwrap();
        assert_eq!(link.parent.as_deref(), Some("Fruit/Pie"));
        assert_eq!(link.name, "Apple-Pie-Fruit");
        assert_eq!(link.extension.as_deref(), Some("md"));
        assert_eq!(link.display_name(), "Apple-Pie-Fruit");
    }

    #[test]
    fn parse_fragment_and_embed() {
        let link = WikiLink::parse_exact("![[Apple-Fruit#Steps]]").unwrap();
        assert!(link.is_embed);
        assert_eq!(link.fragment.as_deref(), Some("Steps"));
    }

    #[test]
    fn parse_exact_rejects_surrounding_text() {
        assert!(WikiLink::parse_exact("see [[Apple]]").is_none());
        assert!(WikiLink::parse_exact("[[Apple]] and [[Pear]]").is_none());
        assert!(WikiLink::parse_exact("[[]]").is_none());
        assert!(WikiLink::parse_exact("[[Apple").is_none());
        assert!(WikiLink::parse_exact("plain text").is_none());
    }

    #[test]
    fn display_matches_parse() {
        let link = WikiLink::new("photo-Pie-Fruit", Some("png"), "photo");
        assert_eq!(link.to_string(), "[[photo-Pie-Fruit.png|photo]]");
        assert_eq!(WikiLink::parse_exact(&link.to_string()), Some(link));
    }
}
