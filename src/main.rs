//! gitbro - CLI entry point.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password, Select};
use git2::Repository;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gitbro::cleanup::{self, BranchCandidate, CleanupOptions, CleanupReport, DeletionOutcome, GitBranchBackend};
use gitbro::config::{self, ApiKey, ConfigStore, Settings, resolve_api_key};
use gitbro::error::CollectError;
use gitbro::generate::{GenerationRequest, GenerationResult, Generator, SummaryFormat, TaskKind};
use gitbro::git::{self, branches, diff, log, ops};
use gitbro::provider::ProviderKind;
use gitbro::session::interactive::{self, AutoAccept, Prompter, SessionOutcome, TerminalPrompter};
use gitbro::session::{ConfirmationSession, CreativityPolicy};
use gitbro::stage::{self, TerminalStagePrompter};
use gitbro::validate::{self, FixOutcome, ValidationOptions, ValidationReport};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "GITBRO_LOG";

/// AI-assisted git workflows: commit messages, branch names, explanations,
/// summaries, commit validation and merged-branch cleanup.
#[derive(Parser, Debug)]
#[command(name = "gitbro")]
#[command(about = "AI-assisted git workflows")]
#[command(version)]
struct Cli {
    /// Provider for this run (overrides the configured one)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a commit message for the staged changes and commit
    Commit {
        /// Starting creativity (0.0 - 2.0)
        #[arg(short = 't', long)]
        temperature: Option<f32>,

        /// Use the Conventional Commits format
        #[arg(short, long)]
        conventional: bool,

        /// Stage all changes first
        #[arg(short, long)]
        all: bool,

        /// Commit the first suggestion without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Suggest a branch name for the current changes
    Branch {
        /// Create the branch and switch to it
        #[arg(long)]
        create: bool,

        /// Name the branch after this commit's changes
        #[arg(long, value_name = "REV")]
        from_commit: Option<String>,

        /// Accept the first suggestion without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Explain changes in plain language
    Explain {
        /// Explain staged changes instead of the working tree
        #[arg(long)]
        staged: bool,

        /// Explain changes to a single file
        #[arg(long, value_name = "PATH")]
        file: Option<String>,
    },

    /// Summarize recent history
    Summarize {
        /// Only commits after this revision, date (YYYY-MM-DD) or '<n> days ago'
        #[arg(long)]
        since: Option<String>,

        /// Only commits whose author matches
        #[arg(long)]
        author: Option<String>,

        /// Walk this branch instead of HEAD
        #[arg(long)]
        branch: Option<String>,

        #[arg(long, value_enum, default_value_t = SummaryFormat::Summary)]
        format: SummaryFormat,

        /// Maximum number of commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Write the accepted summary to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accept the first summary without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Check commit subjects (exit code 1 if any is invalid)
    Validate {
        /// Commit range such as main..HEAD
        #[arg(long)]
        range: Option<String>,

        /// Number of recent commits to check
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Enforce the Conventional Commits grammar
        #[arg(long)]
        conventional: bool,

        /// Suggest a replacement for each invalid subject (implies --conventional)
        #[arg(long)]
        fix: bool,

        /// Subject length that triggers a warning
        #[arg(long)]
        max_length: Option<usize>,
    },

    /// Stage unstaged changes file by file with AI advice
    Stage,

    /// Delete branches already merged into main/master
    CleanBranches {
        /// Also delete merged remote branches
        #[arg(short, long)]
        remote: bool,

        /// Delete remote branches without asking
        #[arg(short, long)]
        force: bool,

        /// Show what would be deleted without deleting
        #[arg(short, long)]
        dry_run: bool,

        #[arg(long, default_value = cleanup::DEFAULT_REMOTE)]
        remote_name: String,
    },

    /// Show the active provider and repository state
    Status,

    /// Configure a provider interactively
    Setup {
        provider: Option<ProviderKind>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Commit {
            temperature,
            conventional,
            all,
            yes,
        } => {
            let (_, settings) = load_settings()?;
            let policy = policy_with(&settings, temperature);
            cmd_commit(&settings, cli.provider, policy, conventional, all, yes).await?;
        }
        Command::Branch {
            create,
            from_commit,
            yes,
        } => {
            let (_, settings) = load_settings()?;
            cmd_branch(&settings, cli.provider, create, from_commit.as_deref(), yes).await?
        }
        Command::Explain { staged, file } => {
            let (_, settings) = load_settings()?;
            cmd_explain(&settings, cli.provider, staged, file.as_deref()).await?
        }
        Command::Summarize {
            since,
            author,
            branch,
            format,
            limit,
            output,
            yes,
        } => {
            let query = log::LogQuery {
                range: None,
                limit: limit.or(since.is_none().then_some(log::DEFAULT_LOG_LIMIT)),
                branch,
                since,
                author,
            };
            let (_, settings) = load_settings()?;
            cmd_summarize(&settings, cli.provider, &query, format, output, yes).await?
        }
        Command::Validate {
            range,
            limit,
            conventional,
            fix,
            max_length,
        } => {
            return cmd_validate(cli.provider, range, limit, conventional, fix, max_length).await;
        }
        Command::Stage => {
            let (_, settings) = load_settings()?;
            cmd_stage(&settings, cli.provider).await?
        }
        Command::CleanBranches {
            remote,
            force,
            dry_run,
            remote_name,
        } => cmd_clean_branches(CleanupOptions {
            include_remote: remote,
            dry_run,
            force,
            remote: remote_name,
        })?,
        Command::Status => {
            let (store, settings) = load_settings()?;
            cmd_status(&store, &settings, cli.provider)
        }
        Command::Setup { provider } => {
            let (store, settings) = load_settings()?;
            cmd_setup(&store, &settings, provider)?
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so generated text on stdout stays pipeable.
fn init_logging(verbose: bool) {
    let default = if verbose { "gitbro=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Settings for commands that need a provider. A corrupt file is an error here.
fn load_settings() -> Result<(ConfigStore, Settings)> {
    let store = ConfigStore::locate()?;
    let settings = store.load()?;
    Ok((store, settings))
}

fn policy_with(settings: &Settings, temperature: Option<f32>) -> CreativityPolicy {
    let policy = settings.creativity_policy();
    match temperature {
        Some(t) => CreativityPolicy::new(config::clamp_creativity(t), policy.step(), policy.ceiling()),
        None => policy,
    }
}

fn generator(settings: &Settings, provider: Option<ProviderKind>) -> Result<Generator> {
    let config = settings.provider_config(provider)?;
    info!("Using {} ({})", config.kind, config.model);
    Ok(Generator::from_config(config))
}

/// Run a confirmation session for `request`. `effect` runs on accept.
async fn confirm<F, V, E>(
    generator: &Generator,
    request: GenerationRequest,
    policy: CreativityPolicy,
    yes: bool,
    accept_label: &str,
    effect: F,
) -> Result<SessionOutcome<V>>
where
    F: FnOnce(&GenerationResult) -> Result<V, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    println!(
        "Generating {} with {} ({})...",
        request.task,
        generator.provider(),
        generator.config().model
    );
    let mut session = ConfirmationSession::start(generator, request, policy).await?;

    let mut prompter: Box<dyn Prompter> = if yes {
        Box::new(AutoAccept)
    } else {
        Box::new(TerminalPrompter::new(accept_label))
    };
    let outcome = interactive::drive(&mut session, generator, prompter.as_mut(), effect).await?;
    if matches!(outcome, SessionOutcome::Cancelled) {
        println!("Cancelled.");
    }
    Ok(outcome)
}

async fn cmd_commit(
    settings: &Settings,
    provider: Option<ProviderKind>,
    policy: CreativityPolicy,
    conventional: bool,
    all: bool,
    yes: bool,
) -> Result<()> {
    let repo = git::open_repository()?;
    if all {
        ops::stage_all(&repo).context("Failed to stage changes")?;
    }

    let staged = diff::staged_diff(&repo)?;
    if staged.is_empty() {
        return Err(CollectError::NoStagedChanges.into());
    }
    println!(
        "{} file(s) staged (+{} -{})",
        staged.files.len(),
        staged.additions,
        staged.deletions
    );

    let generator = generator(settings, provider)?;
    let request = GenerationRequest::new(TaskKind::Commit, staged.text).conventional(conventional);
    let outcome = confirm(&generator, request, policy, yes, "Commit", |result| {
        ops::commit_staged(&repo, result.text())
    })
    .await?;

    if let SessionOutcome::Accepted { text, value: oid } = outcome {
        let short: String = oid.to_string().chars().take(8).collect();
        println!("[DONE] Committed {} {}", short, text.lines().next().unwrap_or(""));
    }
    Ok(())
}

async fn cmd_branch(
    settings: &Settings,
    provider: Option<ProviderKind>,
    create: bool,
    from_commit: Option<&str>,
    yes: bool,
) -> Result<()> {
    let repo = git::open_repository()?;
    let changes = match from_commit {
        Some(rev) => diff::commit_diff(&repo, rev)?,
        None => {
            let staged = diff::staged_diff(&repo)?;
            if staged.is_empty() {
                info!("Nothing staged, naming the branch after HEAD");
                diff::commit_diff(&repo, "HEAD")?
            } else {
                staged
            }
        }
    };

    let generator = generator(settings, provider)?;
    let request = GenerationRequest::new(TaskKind::BranchName, changes.text);
    let policy = settings.creativity_policy();

    if create {
        let outcome = confirm(&generator, request, policy, yes, "Create branch", |result| {
            ops::create_branch(&repo, result.text())
        })
        .await?;
        if let SessionOutcome::Accepted { text, .. } = outcome {
            println!("[DONE] Created and switched to {}", text);
        }
    } else {
        let outcome = confirm(&generator, request, policy, yes, "Done", |_| {
            Ok::<_, std::convert::Infallible>(())
        })
        .await?;
        if let SessionOutcome::Accepted { text, .. } = outcome {
            println!("{}", text);
        }
    }
    Ok(())
}

async fn cmd_explain(
    settings: &Settings,
    provider: Option<ProviderKind>,
    staged: bool,
    file: Option<&str>,
) -> Result<()> {
    let repo = git::open_repository()?;
    let changes = match (file, staged) {
        (Some(path), _) => diff::file_diff(&repo, path)?,
        (None, true) => diff::staged_diff(&repo)?,
        (None, false) => diff::working_diff(&repo)?,
    };

    let generator = generator(settings, provider)?;
    let result = generator.explain(&changes.text, settings.temperature()).await?;
    if result.truncated() {
        eprintln!("Warning: the diff was too large and was truncated before generation.");
    }
    println!("{}", result.text());
    Ok(())
}

async fn cmd_summarize(
    settings: &Settings,
    provider: Option<ProviderKind>,
    query: &log::LogQuery,
    format: SummaryFormat,
    output: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let repo = git::open_repository()?;
    let entries = log::query(&repo, query)?;
    println!("Found {} commit(s)", entries.len());

    let generator = generator(settings, provider)?;
    let request = GenerationRequest::new(TaskKind::Summarize(format), log::format_oneline(&entries));
    let policy = settings.creativity_policy();

    match output {
        Some(path) => {
            let label = format!("Write to {}", path.display());
            let outcome = confirm(&generator, request, policy, yes, &label, |result| {
                fs::write(&path, format!("{}\n", result.text()))
            })
            .await?;
            if matches!(outcome, SessionOutcome::Accepted { .. }) {
                println!("[DONE] Wrote {}", path.display());
            }
        }
        None => {
            confirm(&generator, request, policy, yes, "Done", |_| {
                Ok::<_, std::convert::Infallible>(())
            })
            .await?;
        }
    }
    Ok(())
}

async fn cmd_validate(
    provider: Option<ProviderKind>,
    range: Option<String>,
    limit: Option<usize>,
    conventional: bool,
    fix: bool,
    max_length: Option<usize>,
) -> Result<ExitCode> {
    let repo = git::open_repository()?;
    let query = match range {
        Some(range) => log::LogQuery {
            range: Some(range),
            limit,
            ..log::LogQuery::default()
        },
        None => log::LogQuery::recent(limit.unwrap_or(log::DEFAULT_LOG_LIMIT)),
    };
    let entries = log::query(&repo, &query)?;
    if entries.is_empty() {
        println!("No commits to validate.");
        return Ok(ExitCode::SUCCESS);
    }

    // Only --fix needs a working provider config.
    let settings = if fix {
        load_settings()?.1
    } else {
        ConfigStore::locate()
            .map(|store| store.load_or_default())
            .unwrap_or_default()
    };

    let options = ValidationOptions {
        conventional: conventional || fix,
        max_subject_length: max_length.unwrap_or(settings.validation.max_subject_length),
    };
    let mut report = validate::validate_entries(&entries, &options);

    if fix && report.has_invalid() {
        let generator = generator(&settings, provider)?;
        println!(
            "Suggesting fixes for {} commit(s) with {}...",
            report.invalid_count(),
            generator.provider()
        );
        validate::suggest_fixes(&mut report, &generator, settings.temperature(), |verdict| {
            commit_context(&repo, &verdict.hash)
        })
        .await;
    }

    print_validation(&report);
    Ok(if report.has_invalid() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Changed files of a commit, one per line, for fix suggestions.
fn commit_context(repo: &Repository, hash: &str) -> Option<String> {
    let changes = diff::commit_diff(repo, hash).ok()?;
    let lines: Vec<String> = changes
        .files
        .iter()
        .map(|f| format!("{}: {}", f.status, f.path))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn print_validation(report: &ValidationReport) {
    for verdict in &report.verdicts {
        let tag = if verdict.is_valid() { "PASS" } else { "FAIL" };
        println!("  [{}] {} {}", tag, verdict.short_hash, verdict.subject);
        for issue in &verdict.issues {
            println!("         - {}", issue);
        }
        for flag in &verdict.style_flags {
            println!("         [WARN] {}", flag);
        }
        match &verdict.fix {
            Some(FixOutcome::Suggested(result)) => println!("         Suggested: {}", result.text()),
            Some(FixOutcome::Failed(e)) => println!("         Could not suggest a fix: {}", e),
            None => {}
        }
    }
    println!();
    println!(
        "{} commit(s) checked, {} invalid, {} with warnings",
        report.verdicts.len(),
        report.invalid_count(),
        report.flagged_count()
    );
}

async fn cmd_stage(settings: &Settings, provider: Option<ProviderKind>) -> Result<()> {
    let repo = git::open_repository()?;
    let chunks = diff::working_chunks(&repo)?;
    if chunks.is_empty() {
        return Err(CollectError::NoChanges("stage").into());
    }

    let generator = generator(settings, provider)?;
    let report = stage::run(
        &repo,
        &generator,
        &chunks,
        settings.temperature(),
        &mut TerminalStagePrompter,
    )
    .await;

    for (path, reason) in &report.failed {
        eprintln!("  [FAIL] {}: {}", path, reason);
    }
    println!();
    println!("Staged {} file(s).", report.staged.len());

    if !report.staged.is_empty() {
        let commit_now = Confirm::new()
            .with_prompt("Generate a commit message now?")
            .default(true)
            .interact()
            .unwrap_or(false);
        if commit_now {
            cmd_commit(settings, provider, settings.creativity_policy(), false, false, false).await?;
        }
    }
    Ok(())
}

fn cmd_clean_branches(options: CleanupOptions) -> Result<()> {
    let repo = git::open_repository()?;
    let backend = GitBranchBackend::new(&repo);

    let remote = options.remote.clone();
    let report = cleanup::clean_branches(&backend, &options, |set| {
        confirm_remote_deletion(set, &remote)
    })?;

    print_cleanup(&report, &options.remote);
    Ok(())
}

fn confirm_remote_deletion(set: &[&BranchCandidate], remote: &str) -> bool {
    println!("\nRemote branches merged into {}:", remote);
    for candidate in set {
        println!("  - {}", candidate.display_name(remote));
    }
    Confirm::new()
        .with_prompt(format!("Delete {} remote branch(es)?", set.len()))
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn print_cleanup(report: &CleanupReport, remote: &str) {
    println!("Primary branch: {}", report.primary);
    if !report.dry_run && !report.refreshed {
        println!("  [WARN] {} was not refreshed from {}", report.primary, remote);
    }
    if let Some(reason) = &report.remote_unavailable {
        println!("  [WARN] Remote branches skipped: {}", reason);
    }

    if report.merged().next().is_none() {
        println!("No merged branches to clean up.");
        return;
    }

    for candidate in report.merged() {
        let name = candidate.display_name(remote);
        match &candidate.outcome {
            DeletionOutcome::Pending => println!("  [WOULD DELETE] {}", name),
            DeletionOutcome::Deleted => println!("  [DONE] Deleted {}", name),
            DeletionOutcome::Skipped => println!("  [SKIP] {}", name),
            DeletionOutcome::Failed { reason } => println!("  [FAIL] {}: {}", name, reason),
        }
    }

    println!();
    if report.dry_run {
        println!("Dry run complete. No branches were deleted.");
    } else {
        println!(
            "{} deleted, {} failed, {} kept",
            report.deleted_count(),
            report.failed_count(),
            report.kept_count()
        );
    }
}

fn cmd_status(store: &ConfigStore, settings: &Settings, provider: Option<ProviderKind>) {
    println!("Config:   {}", store.path().display());

    match provider.or(settings.provider) {
        Some(kind) => {
            println!("Provider: {}", kind);
            println!("Model:    {}", settings.model_for(kind));
            println!("Endpoint: {}", settings.endpoint_for(kind));
            if kind.is_hosted() {
                match resolve_api_key(kind, settings) {
                    Some((key, source)) => println!("API key:  {} (from {})", key.masked(), source),
                    None => println!("API key:  missing. Run 'gitbro setup {}'.", kind.id()),
                }
            }
        }
        None => println!("Provider: not configured. Run 'gitbro setup'."),
    }
    println!(
        "Creativity: {:.1} (+{:.1} per regeneration, max {:.1})",
        settings.temperature(),
        settings.creativity_policy().step(),
        settings.creativity_policy().ceiling()
    );

    let Ok(repo) = git::open_repository() else {
        println!("Repository: none");
        return;
    };
    match branches::current_branch(&repo) {
        Ok(Some(name)) => println!("Branch:   {}", name),
        Ok(None) => println!("Branch:   (detached HEAD)"),
        Err(e) => println!("Branch:   unknown ({})", e),
    }
    if let Ok(staged) = diff::staged_diff(&repo) {
        println!("Staged:   {} file(s)", staged.files.len());
    }
}

fn cmd_setup(store: &ConfigStore, settings: &Settings, provider: Option<ProviderKind>) -> Result<()> {
    let kind = match provider {
        Some(kind) => kind,
        None => {
            let items: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.display_name()).collect();
            let current = settings
                .provider
                .and_then(|p| ProviderKind::ALL.iter().position(|k| *k == p))
                .unwrap_or(0);
            let Some(index) = Select::new()
                .with_prompt("Choose a provider")
                .items(&items)
                .default(current)
                .interact_opt()?
            else {
                bail!("Setup cancelled");
            };
            ProviderKind::ALL[index]
        }
    };

    let model: String = Input::new()
        .with_prompt("Model")
        .default(settings.model_for(kind))
        .interact_text()?;
    let endpoint: String = Input::new()
        .with_prompt("Endpoint")
        .default(settings.endpoint_for(kind))
        .interact_text()?;

    let mut api_key = None;
    if kind.is_hosted() {
        if let Some(url) = kind.key_url() {
            println!("Get an API key at {}", url);
        }
        let entered = Password::new()
            .with_prompt("API key (leave empty to keep the current one)")
            .allow_empty_password(true)
            .interact()?;
        let key = ApiKey::new(entered);
        if !key.is_empty() {
            api_key = Some(key);
        } else if resolve_api_key(kind, settings).is_none() {
            println!(
                "  [WARN] No API key stored. Set {} or rerun setup.",
                kind.credential_env_vars().join(" or ")
            );
        }
    }

    store.update(|s| {
        s.provider = Some(kind);
        s.models.insert(kind, model);
        s.endpoints.insert(kind, endpoint);
        if let Some(key) = api_key {
            s.api_keys.insert(kind, key);
        }
    })?;

    println!("[DONE] {} is now the active provider ({})", kind, store.path().display());
    Ok(())
}
