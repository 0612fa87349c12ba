//! Commit history: recent commits, ranges, and filtered logs.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use git2::{Commit, ErrorCode, Oid, Repository, Sort};
use tracing::{debug, warn};

use crate::error::CollectError;

/// Commits shown when no count is given.
pub const DEFAULT_LOG_LIMIT: usize = 10;

/// One commit as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl LogEntry {
    fn from_commit(commit: &Commit<'_>) -> Self {
        let hash = commit.id().to_string();
        let short_hash = hash.chars().take(8).collect();
        let subject = commit
            .summary()
            .map(str::to_string)
            .unwrap_or_else(|| first_line(commit.message().unwrap_or("")));
        let author = commit.author().name().unwrap_or("unknown").to_string();
        let date = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            hash,
            short_hash,
            subject,
            author,
            date,
        }
    }

    pub fn date_rfc3339(&self) -> String {
        self.date.to_rfc3339()
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}

/// What to walk and how to filter it.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// `A..B`, `..B`, `A..`, or a single revision.
    pub range: Option<String>,
    /// Start from this branch instead of HEAD (ignored with `range`).
    pub branch: Option<String>,
    pub limit: Option<usize>,
    /// A revision, `YYYY-MM-DD`, or `<n> <unit> ago`.
    pub since: Option<String>,
    /// Case-insensitive substring of the author name or email.
    pub author: Option<String>,
}

impl LogQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn range(range: impl Into<String>) -> Self {
        Self {
            range: Some(range.into()),
            ..Self::default()
        }
    }
}

/// Lower bound for `since`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Since {
    Date(DateTime<Utc>),
    Revision(Oid),
}

/// Walk history newest first and apply the query's filters.
pub fn query(repo: &Repository, query: &LogQuery) -> Result<Vec<LogEntry>, CollectError> {
    let mut revwalk = repo.revwalk()?;
    // Topological first so same-second commits still come out child before parent.
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    match query.range.as_deref() {
        Some(range) => {
            let (from, to) = parse_range(repo, range)?;
            revwalk.push(to)?;
            if let Some(from) = from {
                revwalk.hide(from)?;
            }
        }
        None => {
            let start = query.branch.as_deref().unwrap_or("HEAD");
            match resolve_commit(repo, start) {
                Ok(oid) => revwalk.push(oid)?,
                // No commits yet: empty history.
                Err(e) if start == "HEAD" && is_unborn(repo) => {
                    debug!("HEAD is unborn: {}", e);
                    return Ok(Vec::new());
                }
                Err(e) => return Err(CollectError::ReferenceNotFound(start.to_string(), e)),
            }
        }
    }

    let since = query
        .since
        .as_deref()
        .map(|s| parse_since(repo, s, Utc::now()))
        .transpose()?;
    if let Some(Since::Revision(oid)) = since {
        revwalk.hide(oid)?;
    }
    let author = query.author.as_deref().map(str::to_lowercase);

    let mut entries = Vec::new();
    for oid_result in revwalk {
        let oid = match oid_result {
            Ok(oid) => oid,
            Err(e) => {
                warn!("Skipping commit during revwalk: {}", e);
                continue;
            }
        };
        let commit = repo.find_commit(oid)?;

        if let Some(Since::Date(cutoff)) = since
            && commit.time().seconds() < cutoff.timestamp()
        {
            continue;
        }
        if let Some(needle) = author.as_deref()
            && !author_matches(&commit, needle)
        {
            continue;
        }

        entries.push(LogEntry::from_commit(&commit));
        if query.limit.is_some_and(|limit| entries.len() >= limit) {
            break;
        }
    }

    Ok(entries)
}

/// The `n` most recent commits reachable from HEAD.
pub fn recent_commits(repo: &Repository, n: usize) -> Result<Vec<LogEntry>, CollectError> {
    query(repo, &LogQuery::recent(n))
}

/// Commits in `range`.
pub fn commits_in_range(repo: &Repository, range: &str) -> Result<Vec<LogEntry>, CollectError> {
    query(repo, &LogQuery::range(range))
}

/// Resolve a range into (excluded, included) commits.
///
/// Symmetric-difference ranges (`A...B`) are rejected, as are ends that do not
/// resolve to exactly one commit. An empty side means HEAD.
pub fn parse_range(repo: &Repository, range: &str) -> Result<(Option<Oid>, Oid), CollectError> {
    let range = range.trim();
    let ambiguous = |reason: String| CollectError::AmbiguousCommitRange {
        range: range.to_string(),
        reason,
    };

    if range.is_empty() {
        return Err(ambiguous("empty range".into()));
    }
    if range.contains("...") {
        return Err(ambiguous(
            "symmetric ranges (A...B) are not supported; use A..B".into(),
        ));
    }

    let parts: Vec<&str> = range.split("..").collect();
    let resolve = |rev: &str| {
        let rev = if rev.is_empty() { "HEAD" } else { rev };
        resolve_commit(repo, rev).map_err(|e| {
            let reason = if e.code() == ErrorCode::Ambiguous {
                format!("'{}' matches more than one object", rev)
            } else {
                format!("'{}' does not name a commit ({})", rev, e.message())
            };
            ambiguous(reason)
        })
    };

    match parts.as_slice() {
        [single] => Ok((None, resolve(single)?)),
        [from, to] => Ok((Some(resolve(from)?), resolve(to)?)),
        _ => Err(ambiguous("expected A..B".into())),
    }
}

/// Interpret a `since` value relative to `now`.
pub fn parse_since(repo: &Repository, value: &str, now: DateTime<Utc>) -> Result<Since, CollectError> {
    let value = value.trim();

    if let Some(relative) = parse_relative(value, now) {
        return relative
            .map(Since::Date)
            .ok_or_else(|| CollectError::InvalidSince(value.to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(Since::Date(Utc.from_utc_datetime(&midnight)));
    }

    resolve_commit(repo, value)
        .map(Since::Revision)
        .map_err(|_| CollectError::InvalidSince(value.to_string()))
}

/// `"3 days ago"`, `"1 week ago"`, `"2 hours ago"`, `"6 months ago"`.
///
/// `None` when the value is not in this form; `Some(None)` when it is but the
/// date falls outside the representable range.
fn parse_relative(value: &str, now: DateTime<Utc>) -> Option<Option<DateTime<Utc>>> {
    let words: Vec<&str> = value.split_whitespace().collect();
    let [count, unit, "ago"] = words.as_slice() else {
        return None;
    };
    let count: u32 = count.parse().ok()?;
    let count = i64::from(count);
    let span = match unit.trim_end_matches('s') {
        "minute" => Duration::try_minutes(count),
        "hour" => Duration::try_hours(count),
        "day" => Duration::try_days(count),
        "week" => Duration::try_weeks(count),
        "month" => count.checked_mul(30).and_then(Duration::try_days),
        "year" => count.checked_mul(365).and_then(Duration::try_days),
        _ => return None,
    };
    Some(span.and_then(|span| now.checked_sub_signed(span)))
}

fn resolve_commit(repo: &Repository, rev: &str) -> Result<Oid, git2::Error> {
    repo.revparse_single(rev)?.peel_to_commit().map(|c| c.id())
}

fn is_unborn(repo: &Repository) -> bool {
    matches!(repo.head(), Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound)
}

fn author_matches(commit: &Commit<'_>, needle: &str) -> bool {
    let author = commit.author();
    let name = author.name().unwrap_or("").to_lowercase();
    let email = author.email().unwrap_or("").to_lowercase();
    name.contains(needle) || email.contains(needle)
}

/// `<short hash> <subject>` per line, as `git log --oneline` prints it.
pub fn format_oneline(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{} {}", e.short_hash, e.subject))
        .collect::<Vec<_>>()
        .join("\n")
}
