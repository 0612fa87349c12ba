//! AI-assisted staging: walk the unstaged changes file by file, show a short
//! assessment of each, and let the user decide what goes into the index.

use dialoguer::Select;
use git2::Repository;
use tracing::{debug, warn};

use crate::error::GitWriteError;
use crate::generate::Generator;
use crate::git::{FileChunk, ops};
use crate::provider::Transport;

/// Shown in place of advice when generation fails.
pub const ADVICE_UNAVAILABLE: &str = "(could not analyze)";

/// How much of a chunk the terminal prompter prints for "show diff".
const DIFF_PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    Stage,
    ShowDiff,
    Skip,
    Stop,
}

pub trait StagePrompter {
    /// Present a file and its advice. `index` starts at 1.
    fn present(&mut self, chunk: &FileChunk, advice: &str, index: usize, total: usize);

    fn choose(&mut self, chunk: &FileChunk) -> StageAction;

    fn show_diff(&mut self, chunk: &FileChunk);
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    pub staged: Vec<String>,
    pub skipped: Vec<String>,
    /// Files whose staging failed, with the reason.
    pub failed: Vec<(String, String)>,
    pub stopped: bool,
}

/// Advice text for one chunk, or [`ADVICE_UNAVAILABLE`].
pub async fn advise<T: Transport>(
    generator: &Generator<T>,
    chunk: &FileChunk,
    creativity: f32,
) -> String {
    match generator
        .stage_advice(&chunk.path, &chunk.text, creativity)
        .await
    {
        Ok(result) => result.text().to_string(),
        Err(e) => {
            warn!("Could not analyze {}: {}", chunk.path, e);
            ADVICE_UNAVAILABLE.to_string()
        }
    }
}

/// Walk `chunks` in order. A failed advice call or a failed stage never stops
/// the walk; only [`StageAction::Stop`] does.
pub async fn run<T, P>(
    repo: &Repository,
    generator: &Generator<T>,
    chunks: &[FileChunk],
    creativity: f32,
    prompter: &mut P,
) -> StageReport
where
    T: Transport,
    P: StagePrompter + ?Sized,
{
    let mut report = StageReport::default();
    let total = chunks.len();

    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.text.trim().is_empty() {
            continue;
        }
        let advice = advise(generator, chunk, creativity).await;
        prompter.present(chunk, &advice, i + 1, total);

        let action = loop {
            match prompter.choose(chunk) {
                StageAction::ShowDiff => prompter.show_diff(chunk),
                other => break other,
            }
        };

        match action {
            StageAction::Stage => match stage_file(repo, &chunk.path) {
                Ok(()) => report.staged.push(chunk.path.clone()),
                Err(e) => {
                    warn!("Failed to stage {}: {}", chunk.path, e);
                    report.failed.push((chunk.path.clone(), e.to_string()));
                }
            },
            StageAction::Skip => report.skipped.push(chunk.path.clone()),
            StageAction::Stop | StageAction::ShowDiff => {
                report.stopped = true;
                break;
            }
        }
    }

    debug!(
        "Staging finished: {} staged, {} skipped",
        report.staged.len(),
        report.skipped.len()
    );
    report
}

fn stage_file(repo: &Repository, path: &str) -> Result<(), GitWriteError> {
    ops::stage_paths(repo, &[path.to_string()])
}

/// Menu-driven staging prompter.
#[derive(Debug, Default)]
pub struct TerminalStagePrompter;

impl StagePrompter for TerminalStagePrompter {
    fn present(&mut self, chunk: &FileChunk, advice: &str, index: usize, total: usize) {
        println!("\n({}/{}) {} [{}]", index, total, chunk.path, chunk.status);
        println!("    {}", advice);
    }

    fn choose(&mut self, _chunk: &FileChunk) -> StageAction {
        let items = ["Stage", "Show diff first", "Skip", "Stop"];
        match Select::new().items(&items).default(0).interact_opt() {
            Ok(Some(0)) => StageAction::Stage,
            Ok(Some(1)) => StageAction::ShowDiff,
            Ok(Some(2)) => StageAction::Skip,
            _ => StageAction::Stop,
        }
    }

    fn show_diff(&mut self, chunk: &FileChunk) {
        let preview: String = chunk.text.chars().take(DIFF_PREVIEW_CHARS).collect();
        println!("\n{}", preview);
        if preview.len() < chunk.text.len() {
            println!("... (diff truncated)");
        }
    }
}
