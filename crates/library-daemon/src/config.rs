use std::path::PathBuf;

/// Environment variable naming the library folder when `--library` is absent.
pub const LIBRARY_ROOT_ENV: &str = "LIBRARY_ROOT";

/// Resolve the library folder from the command line, falling back to
/// `LIBRARY_ROOT`. Supports `~` for the home directory.
pub fn resolve_library_root(
    arg: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    let raw = match arg {
        Some(path) => path.to_string(),
        None => lookup(LIBRARY_ROOT_ENV).ok_or(ConfigError::MissingLibraryRoot)?,
    };
    let root = expand_tilde(raw.trim());
    if !root.is_dir() {
        return Err(ConfigError::NotADirectory(root));
    }
    Ok(root)
}

/// Expand ~ or ~/ prefix to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No library given: pass --library or set {LIBRARY_ROOT_ENV}")]
    MissingLibraryRoot,

    #[error("Library root {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/srv/library"), PathBuf::from("/srv/library"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/notes"), home.join("notes"));
        }
    }

    #[test]
    fn test_argument_beats_environment() {
        let dir = tempfile::tempdir().unwrap();
        let arg = dir.path().to_str().unwrap();
        let root = resolve_library_root(Some(arg), |_| Some("/nonexistent".into())).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_environment_fallback_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().to_str().unwrap().to_string();
        let root = resolve_library_root(None, |name| {
            (name == LIBRARY_ROOT_ENV).then(|| env.clone())
        })
        .unwrap();
        assert_eq!(root, dir.path());

        assert!(matches!(
            resolve_library_root(None, |_| None),
            Err(ConfigError::MissingLibraryRoot)
        ));
        assert!(matches!(
            resolve_library_root(Some("/definitely/not/here"), |_| None),
            Err(ConfigError::NotADirectory(_))
        ));
    }
}
