//! Conventional Commits subject grammar: `type(scope)!: description`.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

use super::CONVENTIONAL_TYPES;

// type, optional (scope), optional !, colon, rest.
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)(?:\(([^)]*)\))?(!)?\s*:\s*(.*)$").expect("subject pattern is valid")
});

/// A subject split into its Conventional Commits parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    pub kind: String,
    pub scope: Option<String>,
    pub breaking: bool,
    pub description: String,
}

/// Something that makes a subject invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectIssue {
    MissingType,
    UnknownType(String),
    EmptyScope,
    EmptyDescription,
    TrailingPeriod,
}

impl fmt::Display for SubjectIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectIssue::MissingType => write!(f, "Missing type and colon (expected 'type(scope): description')"),
            SubjectIssue::UnknownType(t) => write!(
                f,
                "Invalid type '{}' (expected one of: {})",
                t,
                CONVENTIONAL_TYPES.join(", ")
            ),
            SubjectIssue::EmptyScope => write!(f, "Scope is empty; drop the parentheses or name a scope"),
            SubjectIssue::EmptyDescription => write!(f, "Description is empty"),
            SubjectIssue::TrailingPeriod => write!(f, "Description ends with a period"),
        }
    }
}

/// Style problems that do not make a subject invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleFlag {
    TooLong { length: usize, max: usize },
}

impl fmt::Display for StyleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleFlag::TooLong { length, max } => {
                write!(f, "Message too long: {} chars (limit {})", length, max)
            }
        }
    }
}

/// Split a subject into its parts, or `None` if it has no `type:` prefix.
pub fn parse(subject: &str) -> Option<ParsedSubject> {
    let caps = SUBJECT_RE.captures(subject.trim())?;
    Some(ParsedSubject {
        kind: caps.get(1)?.as_str().to_string(),
        scope: caps.get(2).map(|m| m.as_str().to_string()),
        breaking: caps.get(3).is_some(),
        description: caps.get(4).map_or("", |m| m.as_str()).trim().to_string(),
    })
}

/// Grammar issues for a subject. Empty means valid.
pub fn conventional_issues(subject: &str) -> Vec<SubjectIssue> {
    let Some(parsed) = parse(subject) else {
        return vec![SubjectIssue::MissingType];
    };

    let mut issues = Vec::new();
    if !CONVENTIONAL_TYPES.contains(&parsed.kind.as_str()) {
        issues.push(SubjectIssue::UnknownType(parsed.kind.clone()));
    }
    if parsed.scope.as_deref().is_some_and(|s| s.trim().is_empty()) {
        issues.push(SubjectIssue::EmptyScope);
    }
    if parsed.description.is_empty() {
        issues.push(SubjectIssue::EmptyDescription);
    } else if parsed.description.ends_with('.') {
        issues.push(SubjectIssue::TrailingPeriod);
    }
    issues
}

/// Length style flags for a subject.
pub fn style_flags(subject: &str, max_length: usize) -> Vec<StyleFlag> {
    let length = subject.chars().count();
    if length > max_length {
        vec![StyleFlag::TooLong {
            length,
            max: max_length,
        }]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_subject() {
        let parsed = parse("feat(auth)!: drop legacy tokens").unwrap();
        assert_eq!(parsed.kind, "feat");
        assert_eq!(parsed.scope.as_deref(), Some("auth"));
        assert!(parsed.breaking);
        assert_eq!(parsed.description, "drop legacy tokens");
    }

    #[test]
    fn test_valid_subjects() {
        for subject in [
            "feat(auth): add login form",
            "fix: handle empty input",
            "chore(deps)!: bump git2",
            "revert: undo cache change",
            "ci: run clippy on PRs",
        ] {
            assert!(conventional_issues(subject).is_empty(), "{subject}");
        }
    }

    #[test]
    fn test_missing_prefix_is_invalid() {
        assert_eq!(
            conventional_issues("added login form"),
            vec![SubjectIssue::MissingType]
        );
        assert_eq!(
            conventional_issues("Merge branch 'main' into feat/x"),
            vec![SubjectIssue::MissingType]
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            conventional_issues("feature: add login"),
            vec![SubjectIssue::UnknownType("feature".into())]
        );
        // Types are lowercase.
        assert_eq!(
            conventional_issues("Feat: add login"),
            vec![SubjectIssue::UnknownType("Feat".into())]
        );
    }

    #[test]
    fn test_scope_and_description_rules() {
        assert_eq!(conventional_issues("fix(): typo"), vec![SubjectIssue::EmptyScope]);
        assert_eq!(conventional_issues("fix:   "), vec![SubjectIssue::EmptyDescription]);
        assert_eq!(
            conventional_issues("docs: update readme."),
            vec![SubjectIssue::TrailingPeriod]
        );
    }

    #[test]
    fn test_length_is_a_style_flag_only() {
        let subject = format!("feat: {}", "a".repeat(80));
        assert!(conventional_issues(&subject).is_empty());
        assert_eq!(
            style_flags(&subject, 72),
            vec![StyleFlag::TooLong { length: 86, max: 72 }]
        );
        assert!(style_flags("fix: short", 72).is_empty());
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let subject = "fix: ".to_string() + &"é".repeat(67);
        assert_eq!(subject.chars().count(), 72);
        assert!(style_flags(&subject, 72).is_empty());
    }
}
