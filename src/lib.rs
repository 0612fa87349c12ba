//! gitbro - AI-assisted git workflows.
//!
//! # Overview
//!
//! gitbro reads diffs and history from the current repository, asks a
//! configured model (Ollama, OpenAI, Gemini or Anthropic) for commit
//! messages, branch names, explanations and summaries, and lets the user
//! accept, regenerate or cancel each proposal. It also validates commit
//! subjects against Conventional Commits and cleans up merged branches.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod generate;
pub mod git;
pub mod provider;
pub mod session;
pub mod stage;
pub mod validate;

// Re-export commonly used types
pub use cleanup::{BranchCandidate, BranchScope, CleanupOptions, CleanupReport, DeletionOutcome};
pub use config::{ConfigStore, Settings};
pub use error::{
    CleanupError, CollectError, ConfigError, GenerationError, GitWriteError, ProviderError,
    SessionError,
};
pub use generate::{GenerationRequest, GenerationResult, Generator, SummaryFormat, TaskKind};
pub use provider::{ProviderConfig, ProviderKind};
pub use session::{ConfirmationSession, CreativityPolicy, SessionState};
pub use validate::{ValidationReport, ValidationVerdict, Verdict};
