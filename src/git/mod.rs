//! Repository access: read-only collection plus a few guarded writes.

pub mod branches;
pub mod diff;
pub mod log;
pub mod ops;

use std::path::Path;

use git2::Repository;

use crate::error::CollectError;

pub use diff::{ChangedFile, DiffSummary, FileChunk, FileStatus};
pub use log::{LogEntry, LogQuery};

/// Open the repository containing the current directory.
pub fn open_repository() -> Result<Repository, CollectError> {
    open_at(".")
}

/// Open the repository containing `path`, searching parent directories.
pub fn open_at(path: impl AsRef<Path>) -> Result<Repository, CollectError> {
    Repository::discover(path).map_err(CollectError::NotAGitRepository)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_outside_repository_fails() {
        let dir = TempDir::new().unwrap();
        // TempDir may itself live inside a repository on some machines.
        if Repository::discover(dir.path()).is_ok() {
            return;
        }
        assert!(matches!(open_at(dir.path()), Err(CollectError::NotAGitRepository(_))));
    }

    #[test]
    fn test_open_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert!(open_at(&nested).is_ok());
    }
}
