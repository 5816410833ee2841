use crate::error::{DotupError, Result};
use std::path::{Path, PathBuf};

/// Path helpers for repository locations and user-supplied config paths.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises a repository path handed to git.
    pub fn validate_repo_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        if !path.is_absolute() {
            return Err(DotupError::GitOperation(format!(
                "Repository path '{}' must be absolute",
                path.display()
            )));
        }

        let canonical = path.canonicalize().map_err(|e| {
            DotupError::GitOperation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(DotupError::GitOperation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            if canonical.starts_with(forbidden) {
                return Err(DotupError::GitOperation(format!(
                    "Refusing to run git inside system directory '{}'",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Expands a leading `~` to the user's home directory.
    pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let Ok(rest) = path.strip_prefix("~") else {
            return path.to_path_buf();
        };

        match dirs::home_dir() {
            Some(home) if rest.as_os_str().is_empty() => home,
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn validate_repo_path_accepts_directory() {
        let dir = tempdir().unwrap();
        let validated = PathValidator::validate_repo_path(dir.path()).unwrap();
        assert_eq!(validated, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn validate_repo_path_rejects_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "test").unwrap();
        let err = PathValidator::validate_repo_path(&file_path).unwrap_err();
        assert!(matches!(err, DotupError::GitOperation(_)));
    }

    #[test]
    fn validate_repo_path_rejects_relative_paths() {
        assert!(PathValidator::validate_repo_path("relative/dir").is_err());
    }

    #[test]
    fn validate_repo_path_rejects_system_directory() {
        if Path::new("/proc").is_dir() {
            assert!(PathValidator::validate_repo_path("/proc").is_err());
        }
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let plain = PathBuf::from("/opt/dotfiles");
        assert_eq!(PathValidator::expand_home(&plain), plain);

        let embedded = PathBuf::from("/opt/~dotfiles");
        assert_eq!(PathValidator::expand_home(&embedded), embedded);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(PathValidator::expand_home("~"), home);
            assert_eq!(
                PathValidator::expand_home("~/.dotfiles"),
                home.join(".dotfiles")
            );
        }
    }
}
