//! The vault collaborator: reads the library into a snapshot and applies
//! heal actions to storage.

use crate::action::HealAction;
use crate::fs::{FileSystem, FsError};
use crate::snapshot::LibrarySnapshot;
use async_trait::async_trait;
use library_codec::{
    MARKDOWN_EXTENSION, ParseError, SectionId, edit_entry, frontmatter, write_status,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Target already occupied: {0}")]
    Occupied(String),

    #[error("Not valid UTF-8: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Storage seam of the healer.
#[async_trait]
pub trait LibraryVault: Send + Sync {
    /// Read the whole library as it is now.
    async fn snapshot(&self) -> Result<LibrarySnapshot>;

    /// Perform one action.
    async fn apply(&self, action: &HealAction) -> Result<()>;
}

/// A library stored as folders and files on a [`FileSystem`].
pub struct FsLibraryVault<F: FileSystem> {
    fs: F,
}

impl<F: FileSystem> FsLibraryVault<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.fs.read(path).await?;
        String::from_utf8(bytes).map_err(|_| VaultError::Encoding(path.to_string()))
    }

    async fn rewrite(&self, path: &str, edit: impl FnOnce(&str) -> String) -> Result<()> {
        let content = self.read_text(path).await?;
        let edited = edit(&content);
        if edited != content {
            self.fs.write(path, edited.as_bytes()).await?;
        }
        Ok(())
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[async_trait]
impl<F: FileSystem> LibraryVault for FsLibraryVault<F> {
    async fn snapshot(&self) -> Result<LibrarySnapshot> {
        let mut snapshot = LibrarySnapshot::new();
        let mut dirs_to_visit = vec![String::new()]; // Start with root

        while let Some(dir) = dirs_to_visit.pop() {
            let entries = self.fs.list(&dir).await?;

            for entry in entries {
                if is_hidden(&entry.name) {
                    continue;
                }
                let path = if dir.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{}/{}", dir, entry.name)
                };

                if entry.is_dir {
                    // Folders that cannot be sections are not part of the library
                    if let Err(e) = SectionId::new(entry.name.as_str()) {
                        debug!("Ignoring folder {}: {}", path, e);
                        continue;
                    }
                    snapshot.insert_section(&path.parse()?);
                    dirs_to_visit.push(path);
                    continue;
                }

                let is_markdown = entry
                    .name
                    .rsplit_once('.')
                    .is_some_and(|(_, ext)| ext == MARKDOWN_EXTENSION);
                let content = if is_markdown {
                    match self.read_text(&path).await {
                        Ok(content) => Some(content),
                        Err(e) => {
                            debug!("Ignoring {}: {}", path, e);
                            continue;
                        }
                    }
                } else {
                    None
                };

                if let Err(e) = snapshot.insert_file(&path, content.as_deref()) {
                    debug!("Ignoring {}: {}", path, e);
                }
            }
        }

        debug!(
            sections = snapshot.section_count(),
            leaves = snapshot.leaf_count(),
            "Scanned library"
        );
        Ok(snapshot)
    }

    async fn apply(&self, action: &HealAction) -> Result<()> {
        match action {
            HealAction::RenameNode { from, to, .. } => {
                if self.fs.exists(to).await? {
                    return Err(VaultError::Occupied(to.clone()));
                }
                self.fs.rename(from, to).await?;
                info!("Renamed {} -> {}", from, to);
            }
            HealAction::CreateCodex { path, content, .. } => {
                if self.fs.exists(path).await? {
                    return Err(VaultError::Occupied(path.clone()));
                }
                self.fs.write(path, content.as_bytes()).await?;
                info!("Created codex {}", path);
            }
            HealAction::SetStatus { path, status, .. } => {
                let status = *status;
                self.rewrite(path, |content| {
                    if frontmatter::parse(content).malformed {
                        warn!(
                            "{} opens with a block that is not frontmatter, keeping it below the status",
                            path
                        );
                    }
                    write_status(content, status)
                })
                .await?;
                debug!("Set status {} on {}", status, path);
            }
            HealAction::RewriteCodexLine {
                codex_path,
                entry,
                new_line,
                ..
            } => {
                self.rewrite(codex_path, |content| {
                    edit_entry(content, entry, new_line.as_ref())
                })
                .await?;
                debug!("Rewrote {} in {}", entry, codex_path);
            }
        }
        Ok(())
    }
}
