//! Diff collection using git2.

use std::fmt;

use git2::{Delta, Diff, DiffFormat, DiffOptions, ErrorCode, Repository, Tree};
use tracing::warn;

use crate::error::CollectError;

/// Hard cap on collected diff text, in bytes. The generation engine applies
/// its own, smaller ceiling; this only bounds memory on huge diffs.
pub const MAX_COLLECT_LENGTH: usize = 1_000_000;

/// Status of a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// Old path for renames.
    pub old_path: Option<String>,
}

/// Unified diff text plus what it touches.
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub text: String,
    pub files: Vec<ChangedFile>,
    pub truncated: bool,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.text.trim().is_empty()
    }
}

/// Unified diff for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub path: String,
    pub status: FileStatus,
    pub text: String,
}

/// Resolve the HEAD tree. `Ok(None)` for a repository with no commits yet.
pub(crate) fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, CollectError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(CollectError::Git(e)),
    };

    let tree = head_ref.peel_to_tree()?;
    Ok(Some(tree))
}

/// Changes staged for the next commit (HEAD tree to index), like `git diff --cached`.
///
/// An empty result is not an error here; callers decide what "nothing staged" means.
pub fn staged_diff(repo: &Repository) -> Result<DiffSummary, CollectError> {
    let head_tree = resolve_head_tree(repo)?;
    let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
    summarize(&diff)
}

/// Unstaged changes to tracked files (index to working tree), like `git diff`.
pub fn working_diff(repo: &Repository) -> Result<DiffSummary, CollectError> {
    let diff = repo.diff_index_to_workdir(None, None)?;
    summarize(&diff)
}

/// Unstaged changes to one path.
pub fn file_diff(repo: &Repository, path: &str) -> Result<DiffSummary, CollectError> {
    let mut opts = DiffOptions::new();
    opts.pathspec(path);
    let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;
    summarize(&diff)
}

/// Changes introduced by one commit (against its first parent, or the empty
/// tree for a root commit), like `git show --format= <rev>`.
pub fn commit_diff(repo: &Repository, rev: &str) -> Result<DiffSummary, CollectError> {
    let commit = repo
        .revparse_single(rev)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|e| CollectError::ReferenceNotFound(rev.to_string(), e))?;

    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(e) if e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    summarize(&diff)
}

/// Unstaged changes split per file, untracked files included.
pub fn working_chunks(repo: &Repository) -> Result<Vec<FileChunk>, CollectError> {
    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);
    let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;

    let mut chunks: Vec<FileChunk> = Vec::new();
    diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        let path = delta_path(&delta);
        let starts_new = chunks.last().is_none_or(|c| c.path != path);
        if starts_new {
            chunks.push(FileChunk {
                path,
                status: delta_status(delta.status()),
                text: String::new(),
            });
        }
        if let Some(chunk) = chunks.last_mut() {
            push_line(&mut chunk.text, line.origin(), line.content());
        }
        true
    })?;

    chunks.retain(|c| !c.path.is_empty());
    Ok(chunks)
}

fn summarize(diff: &Diff<'_>) -> Result<DiffSummary, CollectError> {
    let mut summary = DiffSummary {
        files: changed_files(diff),
        ..DiffSummary::default()
    };
    append_diff_text(diff, &mut summary);
    Ok(summary)
}

fn changed_files(diff: &Diff<'_>) -> Vec<ChangedFile> {
    let mut files: Vec<ChangedFile> = diff
        .deltas()
        .filter_map(|delta| {
            let status = delta_status(delta.status());
            let path = delta_path(&delta);
            if path.is_empty() {
                return None;
            }
            let old_path = match status {
                FileStatus::Renamed => delta
                    .old_file()
                    .path()
                    .map(|p| p.to_string_lossy().to_string()),
                _ => None,
            };
            Some(ChangedFile {
                path,
                status,
                old_path,
            })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    files
}

fn delta_status(delta: Delta) -> FileStatus {
    match delta {
        Delta::Added | Delta::Untracked => FileStatus::Added,
        Delta::Deleted => FileStatus::Deleted,
        Delta::Renamed => FileStatus::Renamed,
        _ => FileStatus::Modified,
    }
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> String {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Append unified diff text, counting additions and deletions.
fn append_diff_text(diff: &Diff<'_>, summary: &mut DiffSummary) {
    let result = diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if summary.truncated {
            return true;
        }

        match line.origin() {
            '+' => summary.additions += 1,
            '-' => summary.deletions += 1,
            _ => {}
        }

        if summary.text.len() + line.content().len() + 2 > MAX_COLLECT_LENGTH {
            summary.truncated = true;
            return true;
        }

        push_line(&mut summary.text, line.origin(), line.content());
        true
    });

    if let Err(e) = result {
        warn!("Failed to collect diff text: {e}");
        summary.truncated = true;
    }
}

fn push_line(text: &mut String, origin: char, content: &[u8]) {
    // Keep the origin character for context lines so the text reads like `git diff`.
    if matches!(origin, '+' | '-' | ' ') {
        text.push(origin);
    }
    text.push_str(&String::from_utf8_lossy(content));
}
