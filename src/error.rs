//! Error types for gitbro modules using thiserror.

use thiserror::Error;

use crate::provider::ProviderKind;
use crate::session::SessionState;

/// Errors from AI provider calls.
///
/// Each variant carries the provider that produced it so the frontend can say
/// which backend to fix. Variants are cheap to clone because the confirmation
/// loop keeps the last failure around for display.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider} is unreachable: {reason}. Check the endpoint or your network and retry.")]
    Unreachable { provider: ProviderKind, reason: String },

    #[error("{provider} rejected the credentials: {reason}. Run 'gitbro setup {}' to configure an API key.", .provider.id())]
    Auth { provider: ProviderKind, reason: String },

    #[error("{provider} returned an unusable response: {reason}")]
    Response { provider: ProviderKind, reason: String },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderError::Unreachable { provider, .. }
            | ProviderError::Auth { provider, .. }
            | ProviderError::Response { provider, .. } => *provider,
        }
    }

    /// Whether trying again later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unreachable { .. })
    }
}

/// Errors from reading repository state.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Not a git repository (or any parent directory): {0}")]
    NotAGitRepository(#[source] git2::Error),

    #[error("No staged changes. Stage files with `git add` first (or pass --all).")]
    NoStagedChanges,

    #[error("No changes found to {0}.")]
    NoChanges(&'static str),

    #[error("Commit range '{range}' is ambiguous or invalid: {reason}")]
    AmbiguousCommitRange { range: String, reason: String },

    #[error("Failed to find reference '{0}': {1}")]
    ReferenceNotFound(String, #[source] git2::Error),

    #[error("Could not interpret '{0}' as a revision, a YYYY-MM-DD date, or '<n> <unit> ago'")]
    InvalidSince(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Errors from the generation engine.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors from driving a confirmation session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already finished ({0:?}); start a new one")]
    Finished(SessionState),

    #[error("No proposal is awaiting a decision (session is {0:?})")]
    NotProposed(SessionState),

    #[error("Applying the accepted result failed: {0}")]
    SideEffect(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the merged-branch cleanup engine.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Neither 'main' nor 'master' branch found. Create one of them before cleaning branches.")]
    NoPrimaryBranch,

    #[error("HEAD is detached. Check out a branch before cleaning branches.")]
    DetachedHead,

    #[error("Could not delete branch '{branch}': {reason}")]
    BranchDeletionConflict { branch: String, reason: String },

    #[error("Failed to refresh '{branch}': {reason}")]
    Refresh { branch: String, reason: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Errors from guarded write operations (commit, branch creation, staging).
#[derive(Error, Debug)]
pub enum GitWriteError {
    #[error("Failed to stage changes: {0}")]
    StagingFailed(#[source] git2::Error),

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    Signature(#[source] git2::Error),

    #[error("'{0}' is not a valid branch name")]
    InvalidBranchName(String),

    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    #[error("Failed to switch to branch '{branch}': {source}")]
    Checkout {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("git executable not found in PATH")]
    GitNotInstalled,

    #[error("git {operation} failed: {stderr}")]
    GitCommand { operation: String, stderr: String },
}

/// Errors from the configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the home directory; set GITBRO_CONFIG to a config file path")]
    NoHomeDir,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No provider configured. Run 'gitbro setup' first.")]
    NoProvider,

    #[error("Unknown provider '{0}'. Must be one of: ollama, openai, gemini, anthropic")]
    UnknownProvider(String),
}
