//! Merged-branch cleanup.
//!
//! Finds local (and optionally remote) branches already merged into the
//! primary branch and deletes them. The primary and checked-out branches are
//! never candidates. Candidates are computed fresh on every run.

pub mod backend;

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::CleanupError;

pub use backend::{BranchBackend, GitBranchBackend};

/// Branch names probed, in order, for the primary branch.
pub const PRIMARY_CANDIDATES: [&str; 2] = ["main", "master"];

pub const DEFAULT_REMOTE: &str = "origin";

/// The repository's integration branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBranchRef {
    name: String,
}

impl PrimaryBranchRef {
    /// Probe `main`, then `master`.
    pub fn resolve<B: BranchBackend + ?Sized>(backend: &B) -> Result<Self, CleanupError> {
        PRIMARY_CANDIDATES
            .iter()
            .find(|name| backend.local_branch_exists(name))
            .map(|name| Self {
                name: name.to_string(),
            })
            .ok_or(CleanupError::NoPrimaryBranch)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PrimaryBranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchScope {
    Local,
    Remote,
}

impl fmt::Display for BranchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchScope::Local => write!(f, "local"),
            BranchScope::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Pending,
    Deleted,
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCandidate {
    pub name: String,
    pub scope: BranchScope,
    pub merged: bool,
    pub outcome: DeletionOutcome,
}

impl BranchCandidate {
    fn new(name: String, scope: BranchScope, merged: bool) -> Self {
        let outcome = if merged {
            DeletionOutcome::Pending
        } else {
            DeletionOutcome::Skipped
        };
        Self {
            name,
            scope,
            merged,
            outcome,
        }
    }

    /// `name` for local branches, `remote/name` for remote ones.
    pub fn display_name(&self, remote: &str) -> String {
        match self.scope {
            BranchScope::Local => self.name.clone(),
            BranchScope::Remote => format!("{}/{}", remote, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    pub include_remote: bool,
    pub dry_run: bool,
    /// Delete remote branches without asking.
    pub force: bool,
    pub remote: String,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            include_remote: false,
            dry_run: false,
            force: false,
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct CleanupReport {
    pub primary: PrimaryBranchRef,
    pub current: String,
    pub dry_run: bool,
    /// Whether the primary branch was refreshed from the remote.
    pub refreshed: bool,
    /// Why remote branches were not examined, when requested but unavailable.
    pub remote_unavailable: Option<String>,
    pub candidates: Vec<BranchCandidate>,
}

impl CleanupReport {
    /// Merged candidates, in the order they were found.
    pub fn merged(&self) -> impl Iterator<Item = &BranchCandidate> {
        self.candidates.iter().filter(|c| c.merged)
    }

    pub fn merged_in(&self, scope: BranchScope) -> impl Iterator<Item = &BranchCandidate> {
        self.merged().filter(move |c| c.scope == scope)
    }

    pub fn deleted_count(&self) -> usize {
        self.count(|o| *o == DeletionOutcome::Deleted)
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Failed { .. }))
    }

    /// Merged candidates left alone (declined or dry-run).
    pub fn kept_count(&self) -> usize {
        self.merged()
            .filter(|c| matches!(c.outcome, DeletionOutcome::Pending | DeletionOutcome::Skipped))
            .count()
    }

    fn count(&self, pred: impl Fn(&DeletionOutcome) -> bool) -> usize {
        self.candidates.iter().filter(|c| pred(&c.outcome)).count()
    }
}

/// Run a cleanup pass.
///
/// Local merged branches are deleted without asking. Remote deletions need
/// `options.force` or `confirm` returning true for the merged remote set;
/// declining marks them all skipped. In dry-run nothing is refreshed or
/// deleted and merged candidates stay pending. A failed deletion is recorded
/// on its candidate and the batch continues.
pub fn clean_branches<B, F>(
    backend: &B,
    options: &CleanupOptions,
    mut confirm: F,
) -> Result<CleanupReport, CleanupError>
where
    B: BranchBackend + ?Sized,
    F: FnMut(&[&BranchCandidate]) -> bool,
{
    let primary = PrimaryBranchRef::resolve(backend)?;
    let current = backend.current_branch()?.ok_or(CleanupError::DetachedHead)?;
    debug!("Primary branch {}, current branch {}", primary, current);

    let remote = options.remote.as_str();
    let has_remote = backend.remote_exists(remote);

    let refreshed = if options.dry_run || !has_remote {
        false
    } else {
        match backend.refresh_primary(remote, primary.name(), current == primary.name()) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}; merge status may be stale", e);
                false
            }
        }
    };

    let excluded = |name: &str| {
        name == primary.name() || name == current || PRIMARY_CANDIDATES.contains(&name)
    };

    let mut candidates = Vec::new();
    for name in backend.local_branches()? {
        if excluded(&name) {
            continue;
        }
        let merged = merge_status(backend, &name, BranchScope::Local, &primary, remote);
        candidates.push(BranchCandidate::new(name, BranchScope::Local, merged));
    }

    let mut remote_unavailable = None;
    if options.include_remote {
        if !has_remote {
            remote_unavailable = Some(format!("remote '{}' does not exist", remote));
        } else {
            let names = backend.remote_branches(remote)?;
            if !names.iter().any(|n| n == primary.name()) {
                remote_unavailable = Some(format!("'{}/{}' not found", remote, primary));
            } else {
                for name in names {
                    if name == "HEAD" || excluded(&name) {
                        continue;
                    }
                    let merged = merge_status(backend, &name, BranchScope::Remote, &primary, remote);
                    candidates.push(BranchCandidate::new(name, BranchScope::Remote, merged));
                }
            }
        }
        if let Some(reason) = &remote_unavailable {
            warn!("Skipping remote branches: {}", reason);
        }
    }

    let mut report = CleanupReport {
        primary,
        current,
        dry_run: options.dry_run,
        refreshed,
        remote_unavailable,
        candidates,
    };

    if options.dry_run {
        info!("Dry run: {} merged branch(es) found", report.merged().count());
        return Ok(report);
    }

    delete_scope(backend, &mut report.candidates, BranchScope::Local, remote);

    let approved = {
        let remote_set: Vec<&BranchCandidate> = report.merged_in(BranchScope::Remote).collect();
        if remote_set.is_empty() {
            None
        } else {
            Some(options.force || confirm(&remote_set))
        }
    };
    if let Some(approved) = approved {
        if approved {
            delete_scope(backend, &mut report.candidates, BranchScope::Remote, remote);
        } else {
            info!("Remote branch deletion declined");
            for candidate in report
                .candidates
                .iter_mut()
                .filter(|c| c.merged && c.scope == BranchScope::Remote)
            {
                candidate.outcome = DeletionOutcome::Skipped;
            }
        }
    }

    Ok(report)
}

/// Merge status, treating a failed check as not merged.
fn merge_status<B: BranchBackend + ?Sized>(
    backend: &B,
    name: &str,
    scope: BranchScope,
    primary: &PrimaryBranchRef,
    remote: &str,
) -> bool {
    match backend.is_merged(name, scope, primary.name(), remote) {
        Ok(merged) => merged,
        Err(e) => {
            warn!("Could not check {} branch {}: {}", scope, name, e);
            false
        }
    }
}

fn delete_scope<B: BranchBackend + ?Sized>(
    backend: &B,
    candidates: &mut [BranchCandidate],
    scope: BranchScope,
    remote: &str,
) {
    for candidate in candidates
        .iter_mut()
        .filter(|c| c.merged && c.scope == scope && c.outcome == DeletionOutcome::Pending)
    {
        candidate.outcome = match backend.delete(&candidate.name, scope, remote) {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => {
                warn!("{}", e);
                DeletionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// In-memory repository: branch name -> merged into primary.
    #[derive(Default)]
    struct FakeBackend {
        current: Option<String>,
        locals: Vec<(String, bool)>,
        remotes: Vec<(String, bool)>,
        has_remote: bool,
        refresh_fails: bool,
        fail_delete: HashSet<String>,
        refreshed: RefCell<Vec<(String, bool)>>,
        deleted: RefCell<Vec<(String, BranchScope)>>,
    }

    impl FakeBackend {
        fn new(current: &str, locals: &[(&str, bool)]) -> Self {
            Self {
                current: Some(current.to_string()),
                locals: locals.iter().map(|(n, m)| (n.to_string(), *m)).collect(),
                ..Self::default()
            }
        }

        fn with_remote(mut self, remotes: &[(&str, bool)]) -> Self {
            self.has_remote = true;
            self.remotes = remotes.iter().map(|(n, m)| (n.to_string(), *m)).collect();
            self
        }

        fn deleted(&self) -> Vec<(String, BranchScope)> {
            self.deleted.borrow().clone()
        }
    }

    impl BranchBackend for FakeBackend {
        fn current_branch(&self) -> Result<Option<String>, CleanupError> {
            Ok(self.current.clone())
        }

        fn local_branch_exists(&self, name: &str) -> bool {
            self.locals.iter().any(|(n, _)| n == name)
        }

        fn remote_exists(&self, _remote: &str) -> bool {
            self.has_remote
        }

        fn refresh_primary(
            &self,
            _remote: &str,
            primary: &str,
            checked_out: bool,
        ) -> Result<(), CleanupError> {
            if self.refresh_fails {
                return Err(CleanupError::Refresh {
                    branch: primary.to_string(),
                    reason: "offline".into(),
                });
            }
            self.refreshed
                .borrow_mut()
                .push((primary.to_string(), checked_out));
            Ok(())
        }

        fn local_branches(&self) -> Result<Vec<String>, CleanupError> {
            Ok(self.locals.iter().map(|(n, _)| n.clone()).collect())
        }

        fn remote_branches(&self, _remote: &str) -> Result<Vec<String>, CleanupError> {
            Ok(self.remotes.iter().map(|(n, _)| n.clone()).collect())
        }

        fn is_merged(
            &self,
            branch: &str,
            scope: BranchScope,
            _primary: &str,
            _remote: &str,
        ) -> Result<bool, CleanupError> {
            let list = match scope {
                BranchScope::Local => &self.locals,
                BranchScope::Remote => &self.remotes,
            };
            Ok(list.iter().any(|(n, m)| n == branch && *m))
        }

        fn delete(&self, branch: &str, scope: BranchScope, _remote: &str) -> Result<(), CleanupError> {
            if self.fail_delete.contains(branch) {
                return Err(CleanupError::BranchDeletionConflict {
                    branch: branch.to_string(),
                    reason: "already gone".into(),
                });
            }
            self.deleted.borrow_mut().push((branch.to_string(), scope));
            Ok(())
        }
    }

    fn never(_: &[&BranchCandidate]) -> bool {
        panic!("confirmation should not be requested")
    }

    #[test]
    fn test_primary_probe_order() {
        let both = FakeBackend::new("main", &[("master", true), ("main", true)]);
        assert_eq!(PrimaryBranchRef::resolve(&both).unwrap().name(), "main");

        let master = FakeBackend::new("master", &[("master", true)]);
        assert_eq!(PrimaryBranchRef::resolve(&master).unwrap().name(), "master");

        let neither = FakeBackend::new("trunk", &[("trunk", true)]);
        assert!(matches!(
            clean_branches(&neither, &CleanupOptions::default(), never),
            Err(CleanupError::NoPrimaryBranch)
        ));
    }

    #[test]
    fn test_primary_and_current_never_candidates() {
        let backend = FakeBackend::new(
            "feat/current",
            &[("main", true), ("feat/current", true), ("feat/done", true)],
        );
        let report = clean_branches(&backend, &CleanupOptions::default(), never).unwrap();

        let names: Vec<&str> = report.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["feat/done"]);
        assert_eq!(backend.deleted(), vec![("feat/done".to_string(), BranchScope::Local)]);
    }

    #[test]
    fn test_unmerged_branches_are_kept() {
        let backend = FakeBackend::new("main", &[("main", true), ("wip", false), ("old", true)]);
        let report = clean_branches(&backend, &CleanupOptions::default(), never).unwrap();

        let wip = report.candidates.iter().find(|c| c.name == "wip").unwrap();
        assert!(!wip.merged);
        assert_eq!(wip.outcome, DeletionOutcome::Skipped);
        assert_eq!(report.deleted_count(), 1);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let backend = FakeBackend::new("main", &[("main", true), ("a", true), ("b", true)])
            .with_remote(&[("main", true), ("a", true)]);
        let options = CleanupOptions {
            include_remote: true,
            dry_run: true,
            ..CleanupOptions::default()
        };
        let report = clean_branches(&backend, &options, never).unwrap();

        assert!(backend.deleted().is_empty());
        assert!(backend.refreshed.borrow().is_empty());
        assert!(!report.refreshed);
        assert_eq!(report.merged().count(), 3);
        assert!(report.merged().all(|c| c.outcome == DeletionOutcome::Pending));
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let mut backend = FakeBackend::new("main", &[("main", true), ("a", true), ("b", true)]);
        backend.fail_delete.insert("a".to_string());
        let report = clean_branches(&backend, &CleanupOptions::default(), never).unwrap();

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.deleted_count(), 1);
        assert_eq!(backend.deleted(), vec![("b".to_string(), BranchScope::Local)]);
    }

    #[test]
    fn test_remote_requires_confirmation() {
        let backend = FakeBackend::new("main", &[("main", true)])
            .with_remote(&[("main", true), ("HEAD", true), ("feat/x", true), ("open", false)]);
        let options = CleanupOptions {
            include_remote: true,
            ..CleanupOptions::default()
        };

        let mut asked = Vec::new();
        let report = clean_branches(&backend, &options, |set| {
            asked = set.iter().map(|c| c.name.clone()).collect();
            false
        })
        .unwrap();

        assert_eq!(asked, vec!["feat/x"]);
        assert!(backend.deleted().is_empty());
        let feat = report.candidates.iter().find(|c| c.name == "feat/x").unwrap();
        assert_eq!(feat.outcome, DeletionOutcome::Skipped);
        assert_eq!(feat.display_name("origin"), "origin/feat/x");
    }

    #[test]
    fn test_force_deletes_remote_without_asking() {
        let backend = FakeBackend::new("main", &[("main", true)])
            .with_remote(&[("main", true), ("feat/x", true)]);
        let options = CleanupOptions {
            include_remote: true,
            force: true,
            ..CleanupOptions::default()
        };
        clean_branches(&backend, &options, never).unwrap();
        assert_eq!(backend.deleted(), vec![("feat/x".to_string(), BranchScope::Remote)]);
    }

    #[test]
    fn test_refresh_failure_is_only_a_warning() {
        let mut backend = FakeBackend::new("feat/a", &[("main", true), ("feat/a", false), ("old", true)])
            .with_remote(&[]);
        backend.refresh_fails = true;
        let report = clean_branches(&backend, &CleanupOptions::default(), never).unwrap();
        assert!(!report.refreshed);
        assert_eq!(report.deleted_count(), 1);
    }

    #[test]
    fn test_refresh_knows_whether_primary_is_checked_out() {
        let backend = FakeBackend::new("feat/a", &[("main", true), ("feat/a", false)]).with_remote(&[]);
        clean_branches(&backend, &CleanupOptions::default(), never).unwrap();
        assert_eq!(*backend.refreshed.borrow(), vec![("main".to_string(), false)]);
    }

    #[test]
    fn test_missing_remote_skips_remote_scope() {
        let backend = FakeBackend::new("main", &[("main", true)]);
        let options = CleanupOptions {
            include_remote: true,
            ..CleanupOptions::default()
        };
        let report = clean_branches(&backend, &options, never).unwrap();
        assert!(report.remote_unavailable.is_some());
        assert!(!report.refreshed);
    }

    #[test]
    fn test_detached_head_fails() {
        let mut backend = FakeBackend::new("main", &[("main", true)]);
        backend.current = None;
        assert!(matches!(
            clean_branches(&backend, &CleanupOptions::default(), never),
            Err(CleanupError::DetachedHead)
        ));
    }
}
