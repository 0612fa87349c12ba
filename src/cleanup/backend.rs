//! Repository operations the cleanup engine needs, behind a trait.

use std::path::PathBuf;

use git2::{BranchType, Repository};
use tracing::debug;

use super::BranchScope;
use crate::error::{CleanupError, GitWriteError};
use crate::git::{branches, ops};

/// Branch queries and deletions against one repository.
pub trait BranchBackend {
    /// The checked-out branch, or `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, CleanupError>;

    fn local_branch_exists(&self, name: &str) -> bool;

    fn remote_exists(&self, remote: &str) -> bool;

    /// Bring the local primary branch up to date with `remote`.
    /// `checked_out` says whether the primary is the current branch.
    fn refresh_primary(
        &self,
        remote: &str,
        primary: &str,
        checked_out: bool,
    ) -> Result<(), CleanupError>;

    fn local_branches(&self) -> Result<Vec<String>, CleanupError>;

    /// Remote-tracking branches under `remote`, without the prefix and
    /// without `remote/HEAD`.
    fn remote_branches(&self, remote: &str) -> Result<Vec<String>, CleanupError>;

    /// Whether `branch` is merged into `primary`. Remote scope compares
    /// `remote/branch` against `remote/primary`.
    fn is_merged(
        &self,
        branch: &str,
        scope: BranchScope,
        primary: &str,
        remote: &str,
    ) -> Result<bool, CleanupError>;

    fn delete(&self, branch: &str, scope: BranchScope, remote: &str) -> Result<(), CleanupError>;
}

/// `git2` for local refs, the system `git` for anything touching the remote.
pub struct GitBranchBackend<'r> {
    repo: &'r Repository,
    workdir: PathBuf,
}

impl<'r> GitBranchBackend<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        let workdir = repo
            .workdir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| repo.path().to_path_buf());
        Self { repo, workdir }
    }

    fn cli(&self) -> Result<ops::GitCli, GitWriteError> {
        ops::GitCli::locate(&self.workdir)
    }
}

impl BranchBackend for GitBranchBackend<'_> {
    fn current_branch(&self) -> Result<Option<String>, CleanupError> {
        Ok(branches::current_branch(self.repo)?)
    }

    fn local_branch_exists(&self, name: &str) -> bool {
        branches::local_branch_exists(self.repo, name)
    }

    fn remote_exists(&self, remote: &str) -> bool {
        branches::remote_exists(self.repo, remote)
    }

    fn refresh_primary(
        &self,
        remote: &str,
        primary: &str,
        checked_out: bool,
    ) -> Result<(), CleanupError> {
        let refresh_err = |e: GitWriteError| CleanupError::Refresh {
            branch: primary.to_string(),
            reason: e.to_string(),
        };
        let git = self.cli().map_err(refresh_err)?;
        if checked_out {
            git.pull_fast_forward(remote, primary).map_err(refresh_err)?;
        } else {
            git.fetch_into(remote, primary).map_err(refresh_err)?;
        }
        git.fetch_prune(remote).map_err(refresh_err)
    }

    fn local_branches(&self) -> Result<Vec<String>, CleanupError> {
        Ok(branches::local_branches(self.repo)?)
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<String>, CleanupError> {
        Ok(branches::remote_branches(self.repo, remote)?)
    }

    fn is_merged(
        &self,
        branch: &str,
        scope: BranchScope,
        primary: &str,
        remote: &str,
    ) -> Result<bool, CleanupError> {
        let (tip, into) = match scope {
            BranchScope::Local => (
                branches::branch_tip(self.repo, branch, BranchType::Local)?,
                branches::branch_tip(self.repo, primary, BranchType::Local)?,
            ),
            BranchScope::Remote => (
                branches::branch_tip(self.repo, &format!("{}/{}", remote, branch), BranchType::Remote)?,
                branches::branch_tip(self.repo, &format!("{}/{}", remote, primary), BranchType::Remote)?,
            ),
        };
        Ok(branches::is_merged(self.repo, tip, into)?)
    }

    fn delete(&self, branch: &str, scope: BranchScope, remote: &str) -> Result<(), CleanupError> {
        debug!("Deleting {} branch {}", scope, branch);
        let conflict = |reason: String| CleanupError::BranchDeletionConflict {
            branch: branch.to_string(),
            reason,
        };
        match scope {
            BranchScope::Local => {
                ops::delete_local_branch(self.repo, branch).map_err(|e| conflict(e.message().to_string()))
            }
            BranchScope::Remote => self
                .cli()
                .and_then(|git| git.delete_remote_branch(remote, branch))
                .map_err(|e| conflict(e.to_string())),
        }
    }
}
