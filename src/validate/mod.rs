//! Commit validation: classify commit subjects and optionally suggest fixes.
//!
//! Every commit gets its own verdict. Fix suggestions are advisory and are
//! never written back to history.

pub mod subject;

use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::generate::{GenerationResult, Generator};
use crate::git::LogEntry;
use crate::provider::Transport;

pub use subject::{ParsedSubject, StyleFlag, SubjectIssue};

/// Accepted Conventional Commits types.
pub const CONVENTIONAL_TYPES: [&str; 11] = [
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

/// Result of asking for a replacement subject.
#[derive(Debug)]
pub enum FixOutcome {
    Suggested(GenerationResult),
    Failed(GenerationError),
}

/// The outcome for one commit.
#[derive(Debug)]
pub struct ValidationVerdict {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub verdict: Verdict,
    pub issues: Vec<SubjectIssue>,
    pub style_flags: Vec<StyleFlag>,
    pub fix: Option<FixOutcome>,
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Check the Conventional Commits grammar. Without it only length is flagged.
    pub conventional: bool,
    pub max_subject_length: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            conventional: false,
            max_subject_length: crate::config::DEFAULT_MAX_SUBJECT_LENGTH,
        }
    }
}

/// Verdicts for a list of commits, in input order.
#[derive(Debug)]
pub struct ValidationReport {
    pub verdicts: Vec<ValidationVerdict>,
}

impl ValidationReport {
    pub fn invalid_count(&self) -> usize {
        self.verdicts.iter().filter(|v| !v.is_valid()).count()
    }

    pub fn flagged_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| !v.style_flags.is_empty())
            .count()
    }

    pub fn has_invalid(&self) -> bool {
        self.invalid_count() > 0
    }

    pub fn invalid(&self) -> impl Iterator<Item = &ValidationVerdict> {
        self.verdicts.iter().filter(|v| !v.is_valid())
    }
}

/// Classify a single subject.
pub fn validate_subject(
    hash: &str,
    subject: &str,
    options: &ValidationOptions,
) -> ValidationVerdict {
    let issues = if options.conventional {
        subject::conventional_issues(subject)
    } else {
        Vec::new()
    };
    let style_flags = subject::style_flags(subject, options.max_subject_length);
    let verdict = if issues.is_empty() {
        Verdict::Valid
    } else {
        Verdict::Invalid
    };

    ValidationVerdict {
        hash: hash.to_string(),
        short_hash: hash.chars().take(8).collect(),
        subject: subject.to_string(),
        verdict,
        issues,
        style_flags,
        fix: None,
    }
}

/// Classify each commit independently.
pub fn validate_entries(entries: &[LogEntry], options: &ValidationOptions) -> ValidationReport {
    let verdicts = entries
        .iter()
        .map(|e| validate_subject(&e.hash, &e.subject, options))
        .collect();
    ValidationReport { verdicts }
}

/// One validate-fix generation per invalid verdict.
///
/// `context` may supply extra text about a commit (for example its changed
/// files). A failed suggestion is recorded on its verdict and the rest continue.
pub async fn suggest_fixes<T, C>(
    report: &mut ValidationReport,
    generator: &Generator<T>,
    creativity: f32,
    mut context: C,
) where
    T: Transport,
    C: FnMut(&ValidationVerdict) -> Option<String>,
{
    for verdict in report.verdicts.iter_mut().filter(|v| !v.is_valid()) {
        let extra = context(verdict);
        debug!("Requesting fix for {}", verdict.short_hash);
        let outcome = match generator
            .validate_fix(&verdict.subject, extra.as_deref(), creativity)
            .await
        {
            Ok(result) => FixOutcome::Suggested(result),
            Err(e) => {
                warn!("Fix suggestion for {} failed: {}", verdict.short_hash, e);
                FixOutcome::Failed(e)
            }
        };
        verdict.fix = Some(outcome);
    }
}
