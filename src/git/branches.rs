//! Branch enumeration and merge checks.

use git2::{BranchType, ErrorCode, Oid, Repository};

/// Name of the checked-out branch. `None` when HEAD is detached.
///
/// An unborn branch (fresh repository) still reports its name.
pub fn current_branch(repo: &Repository) -> Result<Option<String>, git2::Error> {
    match repo.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
        Ok(_) => Ok(None),
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .map(str::to_string))
        }
        Err(e) => Err(e),
    }
}

pub fn local_branch_exists(repo: &Repository, name: &str) -> bool {
    repo.find_branch(name, BranchType::Local).is_ok()
}

/// Local branch names, sorted.
pub fn local_branches(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let mut names = Vec::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Remote-tracking branch names under `remote`, without the `remote/` prefix.
/// The symbolic `remote/HEAD` is skipped.
pub fn remote_branches(repo: &Repository, remote: &str) -> Result<Vec<String>, git2::Error> {
    let prefix = format!("{}/", remote);
    let mut names = Vec::new();
    for branch in repo.branches(Some(BranchType::Remote))? {
        let (branch, _) = branch?;
        if branch.get().symbolic_target().is_some() {
            continue;
        }
        if let Some(name) = branch.name()?
            && let Some(short) = name.strip_prefix(&prefix)
            && short != "HEAD"
        {
            names.push(short.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn remote_exists(repo: &Repository, remote: &str) -> bool {
    repo.find_remote(remote).is_ok()
}

/// Tip commit of a local or remote-tracking branch.
pub fn branch_tip(repo: &Repository, name: &str, kind: BranchType) -> Result<Oid, git2::Error> {
    let branch = repo.find_branch(name, kind)?;
    branch.get().peel_to_commit().map(|c| c.id())
}

/// Whether `tip` is reachable from `into` (an ancestor of, or equal to, it).
pub fn is_merged(repo: &Repository, tip: Oid, into: Oid) -> Result<bool, git2::Error> {
    if tip == into {
        return Ok(true);
    }
    repo.graph_descendant_of(into, tip)
}
