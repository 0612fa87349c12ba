//! Generation engine: git text + task kind + creativity in, shaped text out.
//!
//! The engine never retries. A provider failure is returned unchanged so
//! the caller (usually a confirmation session) can decide what to do.

pub mod normalize;
pub mod prompt;

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{DEFAULT_TEMPERATURE, clamp_creativity};
use crate::error::{CollectError, GenerationError, ProviderError};
use crate::provider::{HttpTransport, ProviderAdapter, ProviderConfig, ProviderKind, Transport};

/// Output format for history summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryFormat {
    #[default]
    Summary,
    Changelog,
    ReleaseNotes,
}

impl SummaryFormat {
    pub fn title(&self) -> &'static str {
        match self {
            SummaryFormat::Summary => "Summary",
            SummaryFormat::Changelog => "Changelog",
            SummaryFormat::ReleaseNotes => "Release Notes",
        }
    }
}

/// What the generated text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Commit,
    BranchName,
    Explain,
    Summarize(SummaryFormat),
    ValidateFix,
    /// Per-file staging recommendation.
    StageAdvice,
}

impl TaskKind {
    /// Tasks whose answer is a single line.
    pub fn is_single_line(&self) -> bool {
        matches!(
            self,
            TaskKind::Commit | TaskKind::BranchName | TaskKind::ValidateFix
        )
    }

    /// Verb used in "No changes found to ..." messages.
    fn verb(&self) -> &'static str {
        match self {
            TaskKind::Commit => "commit",
            TaskKind::BranchName => "name a branch after",
            TaskKind::Explain => "explain",
            TaskKind::Summarize(_) => "summarize",
            TaskKind::ValidateFix => "fix",
            TaskKind::StageAdvice => "analyze",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Commit => f.write_str("commit message"),
            TaskKind::BranchName => f.write_str("branch name"),
            TaskKind::Explain => f.write_str("explanation"),
            TaskKind::Summarize(format) => write!(f, "{}", format.title().to_lowercase()),
            TaskKind::ValidateFix => f.write_str("fix suggestion"),
            TaskKind::StageAdvice => f.write_str("staging advice"),
        }
    }
}

/// One generation attempt's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub task: TaskKind,
    /// Diff or log text.
    pub input: String,
    /// In [0, 2].
    pub creativity: f32,
    /// Ask for a Conventional Commits subject.
    pub conventional: bool,
    /// Extra text some tasks use: the file for stage advice, the commit's
    /// changes for a validation fix.
    pub context: Option<String>,
}

impl GenerationRequest {
    pub fn new(task: TaskKind, input: impl Into<String>) -> Self {
        Self {
            task,
            input: input.into(),
            creativity: DEFAULT_TEMPERATURE,
            conventional: false,
            context: None,
        }
    }

    pub fn with_creativity(mut self, creativity: f32) -> Self {
        self.creativity = clamp_creativity(creativity);
        self
    }

    pub fn conventional(mut self, conventional: bool) -> Self {
        self.conventional = conventional;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Text produced by one attempt. Never modified after creation; a new
/// attempt produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    text: String,
    creativity: f32,
    provider: ProviderKind,
    model: String,
    task: TaskKind,
    timestamp: DateTime<Utc>,
    truncated: bool,
}

impl GenerationResult {
    pub fn new(
        text: impl Into<String>,
        creativity: f32,
        provider: ProviderKind,
        model: impl Into<String>,
        task: TaskKind,
        truncated: bool,
    ) -> Self {
        Self {
            text: text.into(),
            creativity,
            provider,
            model: model.into(),
            task,
            timestamp: Utc::now(),
            truncated,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn creativity(&self) -> f32 {
        self.creativity
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The git text was cut to fit the input ceiling.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Runs generation requests against one configured provider.
pub struct Generator<T = HttpTransport> {
    adapter: ProviderAdapter<T>,
    config: ProviderConfig,
}

impl Generator<HttpTransport> {
    pub fn from_config(config: ProviderConfig) -> Self {
        Self::new(ProviderAdapter::new(), config)
    }
}

impl<T: Transport> Generator<T> {
    pub fn new(adapter: ProviderAdapter<T>, config: ProviderConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn provider(&self) -> ProviderKind {
        self.config.kind
    }

    /// Generate text for any task.
    ///
    /// Blank input fails before the provider is called:
    /// [`CollectError::NoStagedChanges`] for commits,
    /// [`CollectError::NoChanges`] for everything else.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        if request.input.trim().is_empty() {
            let err = match request.task {
                TaskKind::Commit => CollectError::NoStagedChanges,
                task => CollectError::NoChanges(task.verb()),
            };
            return Err(err.into());
        }

        let built = prompt::build_prompt(request);
        if built.truncated {
            warn!(
                "Input for {} exceeded {} bytes and was truncated",
                request.task,
                normalize::MAX_INPUT_LENGTH
            );
        }

        let completion = self
            .adapter
            .complete(&built.prompt, request.creativity, &self.config)
            .await?;
        debug!("Raw {} output: {}", request.task, completion.text);

        let text = normalize::shape_output(request.task, &completion.text).ok_or_else(|| {
            ProviderError::Response {
                provider: completion.provider,
                reason: format!("no usable {} in the output", request.task),
            }
        })?;

        Ok(GenerationResult::new(
            text,
            request.creativity,
            completion.provider,
            completion.model,
            request.task,
            built.truncated,
        ))
    }

    pub async fn commit_message(
        &self,
        staged_diff: &str,
        creativity: f32,
        conventional: bool,
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerationRequest::new(TaskKind::Commit, staged_diff)
            .with_creativity(creativity)
            .conventional(conventional);
        self.generate(&request).await
    }

    pub async fn branch_name(
        &self,
        diff: &str,
        creativity: f32,
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerationRequest::new(TaskKind::BranchName, diff).with_creativity(creativity);
        self.generate(&request).await
    }

    pub async fn explain(
        &self,
        diff: &str,
        creativity: f32,
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerationRequest::new(TaskKind::Explain, diff).with_creativity(creativity);
        self.generate(&request).await
    }

    pub async fn summarize(
        &self,
        log: &str,
        format: SummaryFormat,
        creativity: f32,
    ) -> Result<GenerationResult, GenerationError> {
        let request =
            GenerationRequest::new(TaskKind::Summarize(format), log).with_creativity(creativity);
        self.generate(&request).await
    }

    /// Suggest a conventional replacement for `original`. `context` is
    /// optional text about the commit's changes.
    pub async fn validate_fix(
        &self,
        original: &str,
        context: Option<&str>,
        creativity: f32,
    ) -> Result<GenerationResult, GenerationError> {
        let mut request = GenerationRequest::new(TaskKind::ValidateFix, original)
            .with_creativity(creativity)
            .conventional(true);
        if let Some(context) = context {
            request = request.with_context(context);
        }
        self.generate(&request).await
    }

    pub async fn stage_advice(
        &self,
        file: &str,
        chunk: &str,
        creativity: f32,
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerationRequest::new(TaskKind::StageAdvice, chunk)
            .with_creativity(creativity)
            .with_context(file);
        self.generate(&request).await
    }
}
