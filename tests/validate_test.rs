//! Integration tests for commit validation over real history.

mod common;

use common::{StubTransport, TestRepo, stub_generator};
use gitbro::git::log;
use gitbro::validate::{self, FixOutcome, SubjectIssue, ValidationOptions, Verdict};

fn conventional() -> ValidationOptions {
    ValidationOptions {
        conventional: true,
        ..ValidationOptions::default()
    }
}

#[test]
fn test_mixed_history_verdicts() {
    let repo = TestRepo::new();
    repo.commit("feat(auth): add login form");
    repo.commit("added login form");
    repo.commit("Fix: typo");
    repo.commit("chore(deps)!: bump git2");

    let entries = log::recent_commits(&repo.repo, 10).unwrap();
    let report = validate::validate_entries(&entries, &conventional());

    let by_subject = |s: &str| report.verdicts.iter().find(|v| v.subject == s).unwrap();
    assert_eq!(by_subject("feat(auth): add login form").verdict, Verdict::Valid);
    assert_eq!(by_subject("chore(deps)!: bump git2").verdict, Verdict::Valid);
    assert_eq!(
        by_subject("added login form").issues,
        vec![SubjectIssue::MissingType]
    );
    assert_eq!(
        by_subject("Fix: typo").issues,
        vec![SubjectIssue::UnknownType("Fix".into())]
    );
    assert_eq!(report.invalid_count(), 2);
}

#[test]
fn test_range_validation_only_sees_range() {
    let repo = TestRepo::new();
    let base = repo.commit("not conventional at all");
    repo.commit("feat: add thing");

    let entries = log::commits_in_range(&repo.repo, &format!("{}..HEAD", base)).unwrap();
    let report = validate::validate_entries(&entries, &conventional());
    assert_eq!(report.verdicts.len(), 1);
    assert!(!report.has_invalid());
}

#[tokio::test]
async fn test_fix_suggestions_use_commit_context() {
    let repo = TestRepo::new();
    repo.commit("feat: fine");
    repo.write_staged("src/login.rs", "fn login() {}\n");
    repo.commit_index("Test User", "added login");

    let entries = log::recent_commits(&repo.repo, 10).unwrap();
    let mut report = validate::validate_entries(&entries, &conventional());

    let stub = StubTransport::new().reply("feat(login): add login handler");
    let generator = stub_generator(&stub);
    validate::suggest_fixes(&mut report, &generator, 0.7, |verdict| {
        let changes = gitbro::git::diff::commit_diff(&repo.repo, &verdict.hash).ok()?;
        Some(
            changes
                .files
                .iter()
                .map(|f| f.path.clone())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })
    .await;

    assert_eq!(stub.calls(), 1);
    let prompt = stub.bodies()[0]["prompt"].as_str().unwrap().to_string();
    assert!(prompt.contains("added login"));
    assert!(prompt.contains("src/login.rs"));

    let fixed = report.invalid().next().unwrap();
    assert!(matches!(
        &fixed.fix,
        Some(FixOutcome::Suggested(r)) if r.text() == "feat(login): add login handler"
    ));
}

#[tokio::test]
async fn test_one_failed_fix_does_not_stop_others() {
    let repo = TestRepo::new();
    repo.commit("first bad");
    repo.commit("second bad");

    let entries = log::recent_commits(&repo.repo, 10).unwrap();
    let mut report = validate::validate_entries(&entries, &conventional());

    let stub = StubTransport::new().unreachable().reply("fix: second");
    validate::suggest_fixes(&mut report, &stub_generator(&stub), 0.7, |_| None).await;

    assert_eq!(stub.calls(), 2);
    assert!(matches!(report.verdicts[0].fix, Some(FixOutcome::Failed(_))));
    assert!(matches!(report.verdicts[1].fix, Some(FixOutcome::Suggested(_))));
}
