//! Path management for balancebook
//!
//! A book is one directory holding the CSV tables, the settings file, the
//! audit log and any pending import.
//!
//! ## Path Resolution Order
//!
//! 1. `BALANCEBOOK_DIR` environment variable (if set)
//! 2. The platform data directory from `directories::ProjectDirs`

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::error::BookError;

/// Environment variable overriding the book directory
pub const BOOK_DIR_ENV: &str = "BALANCEBOOK_DIR";

/// Manages all paths used by balancebook
#[derive(Debug, Clone)]
pub struct BookPaths {
    /// Directory holding the whole book
    base_dir: PathBuf,
}

impl BookPaths {
    /// Resolve the book directory from the environment or the platform default
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, BookError> {
        let base_dir = match std::env::var_os(BOOK_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create BookPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("balancebook.yaml")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Proposal waiting for review decisions
    pub fn pending_import(&self) -> PathBuf {
        self.base_dir.join("pending_import.json")
    }

    /// A data table named in the settings
    pub fn table(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    pub fn ensure_directories(&self) -> Result<(), BookError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| BookError::Io(format!("Failed to create book directory: {}", e)))
    }

    /// Check if the book has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> Result<PathBuf, BookError> {
    ProjectDirs::from("", "", "balancebook")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| BookError::Config("Could not determine a home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BookPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("balancebook.yaml"));
        assert_eq!(paths.table("accounts.csv"), temp_dir.path().join("accounts.csv"));
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();

        std::env::set_var(BOOK_DIR_ENV, temp_dir.path());
        let paths = BookPaths::new().unwrap();
        std::env::remove_var(BOOK_DIR_ENV);

        assert_eq!(paths.base_dir(), temp_dir.path());
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BookPaths::with_base_dir(temp_dir.path().join("book"));

        paths.ensure_directories().unwrap();
        assert!(temp_dir.path().join("book").exists());
    }
}
