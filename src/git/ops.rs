//! Guarded write operations: commit, branch creation, staging, deletion.
//!
//! Local writes use git2. Operations that talk to a remote shell out to the
//! system `git` binary so they inherit the user's git config, SSH agent and
//! credential helpers.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{BranchType, ErrorCode, IndexAddOption, Oid, Repository, Status, StatusOptions};
use tracing::{debug, info};

use crate::error::GitWriteError;

/// Commit the staged index on HEAD.
///
/// The message is the accepted text with trailing whitespace removed. On an
/// unborn branch this creates the root commit.
pub fn commit_staged(repo: &Repository, message: &str) -> Result<Oid, GitWriteError> {
    let message = message.trim_end();

    let mut index = repo.index().map_err(GitWriteError::StagingFailed)?;
    let tree_id = index.write_tree().map_err(GitWriteError::StagingFailed)?;
    let tree = repo.find_tree(tree_id).map_err(GitWriteError::CommitFailed)?;

    let sig = repo.signature().map_err(GitWriteError::Signature)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().map_err(GitWriteError::CommitFailed)?),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(GitWriteError::CommitFailed(e)),
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .map_err(GitWriteError::CommitFailed)?;

    info!("Created commit {}", oid);
    Ok(oid)
}

/// Create `name` at HEAD and switch to it.
///
/// HEAD moves without touching the working tree or index; both already match
/// the new branch because it starts at the current commit.
pub fn create_branch(repo: &Repository, name: &str) -> Result<(), GitWriteError> {
    if !git2::Branch::name_is_valid(name).unwrap_or(false) {
        return Err(GitWriteError::InvalidBranchName(name.to_string()));
    }
    if repo.find_branch(name, BranchType::Local).is_ok() {
        return Err(GitWriteError::BranchExists(name.to_string()));
    }

    let checkout_err = |source| GitWriteError::Checkout {
        branch: name.to_string(),
        source,
    };

    let head = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(checkout_err)?;
    repo.branch(name, &head, false).map_err(checkout_err)?;
    repo.set_head(&format!("refs/heads/{}", name))
        .map_err(checkout_err)?;

    info!("Created and switched to branch {}", name);
    Ok(())
}

/// Stage the given paths. Paths deleted from the working tree are removed
/// from the index.
pub fn stage_paths(repo: &Repository, paths: &[String]) -> Result<(), GitWriteError> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| GitWriteError::StagingFailed(git2::Error::from_str("bare repository")))?
        .to_path_buf();

    let mut index = repo.index().map_err(GitWriteError::StagingFailed)?;
    for path in paths {
        let relative = Path::new(path);
        if workdir.join(relative).exists() {
            index
                .add_path(relative)
                .map_err(GitWriteError::StagingFailed)?;
        } else {
            index
                .remove_path(relative)
                .map_err(GitWriteError::StagingFailed)?;
        }
        debug!("Staged {}", path);
    }
    index.write().map_err(GitWriteError::StagingFailed)?;
    Ok(())
}

/// Stage every change, including deletions and untracked files (`git add -A`).
pub fn stage_all(repo: &Repository) -> Result<(), GitWriteError> {
    let mut index = repo.index().map_err(GitWriteError::StagingFailed)?;
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .map_err(GitWriteError::StagingFailed)?;
    index
        .update_all(["*"].iter(), None)
        .map_err(GitWriteError::StagingFailed)?;
    index.write().map_err(GitWriteError::StagingFailed)?;
    Ok(())
}

/// Whether the working tree has anything `stage_all` would pick up.
pub fn has_unstaged_changes(repo: &Repository) -> Result<bool, git2::Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    let unstaged = Status::WT_NEW
        | Status::WT_MODIFIED
        | Status::WT_DELETED
        | Status::WT_RENAMED
        | Status::WT_TYPECHANGE;
    Ok(statuses.iter().any(|s| s.status().intersects(unstaged)))
}

/// Delete a local branch.
pub fn delete_local_branch(repo: &Repository, name: &str) -> Result<(), git2::Error> {
    let mut branch = repo.find_branch(name, BranchType::Local)?;
    branch.delete()?;
    info!("Deleted local branch {}", name);
    Ok(())
}

/// The system `git` binary, run inside a repository's working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    workdir: PathBuf,
}

impl GitCli {
    /// Locate `git` on PATH.
    pub fn locate(workdir: impl Into<PathBuf>) -> Result<Self, GitWriteError> {
        let program = which::which("git").map_err(|_| GitWriteError::GitNotInstalled)?;
        Ok(Self {
            program,
            workdir: workdir.into(),
        })
    }

    /// `git push <remote> --delete <branch>`
    pub fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<(), GitWriteError> {
        self.run(&["push", remote, "--delete", branch], "push --delete")?;
        info!("Deleted remote branch {}/{}", remote, branch);
        Ok(())
    }

    /// `git pull --ff-only <remote> <branch>`, for the checked-out branch.
    pub fn pull_fast_forward(&self, remote: &str, branch: &str) -> Result<(), GitWriteError> {
        self.run(&["pull", "--ff-only", remote, branch], "pull")
            .map(|_| ())
    }

    /// `git fetch <remote> <branch>:<branch>`, updating a branch that is not
    /// checked out.
    pub fn fetch_into(&self, remote: &str, branch: &str) -> Result<(), GitWriteError> {
        let refspec = format!("{}:{}", branch, branch);
        self.run(&["fetch", remote, &refspec], "fetch").map(|_| ())
    }

    /// `git fetch --prune <remote>`, refreshing remote-tracking branches.
    pub fn fetch_prune(&self, remote: &str) -> Result<(), GitWriteError> {
        self.run(&["fetch", "--prune", remote], "fetch --prune")
            .map(|_| ())
    }

    /// Run git and return stdout, or stderr on failure.
    fn run(&self, args: &[&str], operation: &str) -> Result<String, GitWriteError> {
        debug!("git {}", args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| GitWriteError::GitCommand {
                operation: operation.to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitWriteError::GitCommand {
                operation: operation.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
