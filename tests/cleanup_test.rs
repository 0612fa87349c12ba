//! Integration tests for merged-branch cleanup against real repositories.

mod common;

use common::TestRepo;
use git2::Repository;
use gitbro::cleanup::{self, BranchScope, CleanupOptions, DeletionOutcome, GitBranchBackend};
use gitbro::error::CleanupError;

fn never(_: &[&gitbro::cleanup::BranchCandidate]) -> bool {
    panic!("confirmation should not be requested")
}

/// main with two commits, `done` merged, `wip` ahead of main.
fn repo_with_branches() -> TestRepo {
    let repo = TestRepo::new();
    let base = repo.commit("chore: base");
    repo.branch("done", base);
    repo.commit("feat: on main");

    repo.branch("wip", base);
    repo.checkout("wip");
    repo.commit("feat: unfinished");
    repo.checkout("main");
    repo
}

// =============================================================================
// LOCAL CLEANUP
// =============================================================================

#[test]
fn test_deletes_only_merged_branches() {
    let repo = repo_with_branches();
    let backend = GitBranchBackend::new(&repo.repo);

    let report = cleanup::clean_branches(&backend, &CleanupOptions::default(), never).unwrap();

    assert_eq!(report.primary.name(), "main");
    assert_eq!(report.deleted_count(), 1);
    assert_eq!(repo.branch_names(), vec!["main", "wip"]);
}

#[test]
fn test_current_branch_is_never_deleted() {
    let repo = repo_with_branches();
    repo.checkout("done");
    let backend = GitBranchBackend::new(&repo.repo);

    let report = cleanup::clean_branches(&backend, &CleanupOptions::default(), never).unwrap();

    assert!(report.candidates.iter().all(|c| c.name != "done" && c.name != "main"));
    assert_eq!(repo.branch_names(), vec!["done", "main", "wip"]);
}

#[test]
fn test_dry_run_leaves_branches_alone() {
    let repo = repo_with_branches();
    let before = repo.branch_names();
    let backend = GitBranchBackend::new(&repo.repo);
    let options = CleanupOptions {
        dry_run: true,
        ..CleanupOptions::default()
    };

    let report = cleanup::clean_branches(&backend, &options, never).unwrap();

    assert_eq!(repo.branch_names(), before);
    let done = report.candidates.iter().find(|c| c.name == "done").unwrap();
    assert!(done.merged);
    assert_eq!(done.outcome, DeletionOutcome::Pending);
}

#[test]
fn test_master_is_used_when_main_is_missing() {
    let repo = TestRepo::new();
    let base = repo.commit("chore: base");
    repo.branch("master", base);
    repo.branch("old", base);
    repo.checkout("master");
    repo.repo
        .find_branch("main", git2::BranchType::Local)
        .unwrap()
        .delete()
        .unwrap();

    let backend = GitBranchBackend::new(&repo.repo);
    let report = cleanup::clean_branches(&backend, &CleanupOptions::default(), never).unwrap();
    assert_eq!(report.primary.name(), "master");
    assert_eq!(repo.branch_names(), vec!["master"]);
}

#[test]
fn test_no_primary_branch_fails_fast() {
    let repo = TestRepo::new();
    let base = repo.commit("chore: base");
    repo.branch("trunk", base);
    repo.checkout("trunk");
    repo.repo
        .find_branch("main", git2::BranchType::Local)
        .unwrap()
        .delete()
        .unwrap();

    let backend = GitBranchBackend::new(&repo.repo);
    assert!(matches!(
        cleanup::clean_branches(&backend, &CleanupOptions::default(), never),
        Err(CleanupError::NoPrimaryBranch)
    ));
}

// =============================================================================
// REMOTE CLEANUP (needs the git binary)
// =============================================================================

/// Push main and the given branches to a bare `origin` and fetch them back.
fn with_origin(repo: &TestRepo, branches: &[&str]) -> tempfile::TempDir {
    let origin_dir = tempfile::tempdir().unwrap();
    Repository::init_bare(origin_dir.path()).unwrap();
    let url = origin_dir.path().to_str().unwrap().to_string();

    let mut remote = repo.repo.remote("origin", &url).unwrap();
    let mut refspecs = vec!["refs/heads/main:refs/heads/main".to_string()];
    refspecs.extend(branches.iter().map(|b| format!("refs/heads/{b}:refs/heads/{b}")));
    remote.push(&refspecs, None).unwrap();
    remote
        .fetch(&["+refs/heads/*:refs/remotes/origin/*"], None, None)
        .unwrap();
    origin_dir
}

fn git_available() -> bool {
    which::which("git").is_ok()
}

#[test]
fn test_remote_merged_branch_deleted_with_force() {
    if !git_available() {
        return;
    }
    let repo = repo_with_branches();
    let origin = with_origin(&repo, &["done", "wip"]);
    let backend = GitBranchBackend::new(&repo.repo);
    let options = CleanupOptions {
        include_remote: true,
        force: true,
        ..CleanupOptions::default()
    };

    let report = cleanup::clean_branches(&backend, &options, never).unwrap();

    let remote_done = report
        .candidates
        .iter()
        .find(|c| c.scope == BranchScope::Remote && c.name == "done")
        .unwrap();
    assert_eq!(remote_done.outcome, DeletionOutcome::Deleted);

    let bare = Repository::open_bare(origin.path()).unwrap();
    assert!(bare.find_branch("done", git2::BranchType::Local).is_err());
    assert!(bare.find_branch("wip", git2::BranchType::Local).is_ok());
    assert!(bare.find_branch("main", git2::BranchType::Local).is_ok());
}

#[test]
fn test_declined_remote_deletion_is_skipped() {
    if !git_available() {
        return;
    }
    let repo = repo_with_branches();
    let origin = with_origin(&repo, &["done"]);
    let backend = GitBranchBackend::new(&repo.repo);
    let options = CleanupOptions {
        include_remote: true,
        ..CleanupOptions::default()
    };

    let mut asked = 0;
    let report = cleanup::clean_branches(&backend, &options, |set| {
        asked += 1;
        assert_eq!(set.len(), 1);
        false
    })
    .unwrap();

    assert_eq!(asked, 1);
    assert!(
        report
            .merged_in(BranchScope::Remote)
            .all(|c| c.outcome == DeletionOutcome::Skipped)
    );
    let bare = Repository::open_bare(origin.path()).unwrap();
    assert!(bare.find_branch("done", git2::BranchType::Local).is_ok());
}
