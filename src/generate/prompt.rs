//! Prompt templates, one per task kind.
//!
//! Every prompt has the same three parts: a fixed instruction preamble for
//! the task (the system prompt), the sanitized git text, and the creativity
//! value, which is passed to the provider untouched.

use super::normalize::{MAX_INPUT_LENGTH, sanitize_input};
use super::{GenerationRequest, SummaryFormat, TaskKind};
use crate::provider::Prompt;
use crate::validate::CONVENTIONAL_TYPES;

/// Output token budget for one-line answers.
pub const SHORT_OUTPUT_TOKENS: u32 = 200;
/// Output token budget for prose.
pub const LONG_OUTPUT_TOKENS: u32 = 1024;

/// A prompt plus whether the git text had to be cut.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub prompt: Prompt,
    pub truncated: bool,
}

pub fn build_prompt(request: &GenerationRequest) -> BuiltPrompt {
    let input = sanitize_input(&request.input, MAX_INPUT_LENGTH);

    let truncation_note = if input.truncated {
        "\n\nNote: the input was truncated due to size. Focus on the visible changes."
    } else {
        ""
    };

    let user = match request.task {
        TaskKind::ValidateFix => {
            let mut user = format!("Original: {}", input.text.trim());
            if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
                let context = sanitize_input(context, MAX_INPUT_LENGTH / 2);
                user.push_str(&format!("\n\nChanges in this commit:\n{}", context.text));
            }
            user
        }
        TaskKind::StageAdvice => {
            let file = request.context.as_deref().unwrap_or("unknown");
            format!("File: {}\n\n{}{}", file, input.text, truncation_note)
        }
        _ => format!("{}{}", input.text, truncation_note),
    };

    BuiltPrompt {
        prompt: Prompt {
            system: system_prompt(request.task, request.conventional),
            user,
            max_tokens: max_tokens(request.task),
        },
        truncated: input.truncated,
    }
}

pub fn max_tokens(task: TaskKind) -> u32 {
    if task.is_single_line() {
        SHORT_OUTPUT_TOKENS
    } else {
        LONG_OUTPUT_TOKENS
    }
}

/// The fixed instruction preamble for a task.
pub fn system_prompt(task: TaskKind, conventional: bool) -> String {
    let types = CONVENTIONAL_TYPES.join(", ");
    match task {
        TaskKind::Commit if conventional => format!(
            "Generate a Git commit message following the Conventional Commits format.\n\
             Format: type(scope): description\n\
             - type: one of {types}\n\
             - scope: optional, the module or area affected\n\
             - description: imperative mood, lowercase after the colon, no period at the end\n\
             Keep the whole line under 72 characters.\n\
             Output only the commit message on a single line, no explanations."
        ),
        TaskKind::Commit => "Write a Git commit message for this diff.\n\
             Use a single line in the imperative mood (\"add\", \"fix\", \"remove\"), \
             under 72 characters, with no period at the end.\n\
             Output only the commit message."
            .to_string(),
        TaskKind::BranchName => "Analyze the code changes and suggest a semantic branch name.\n\
             Format: type/short-description (e.g. feat/add-login, fix/api-timeout).\n\
             Types: feat, fix, refactor, docs, test, chore, hotfix.\n\
             Keep the description short (2-4 words) and use kebab-case.\n\
             Output only the branch name, no explanations."
            .to_string(),
        TaskKind::Explain => "Explain the code changes in plain English.\n\
             Describe what was changed, added, or removed, and focus on the purpose of the changes.\n\
             Be concise but complete. Use bullet points for multiple changes.\n\
             Avoid technical jargon when possible."
            .to_string(),
        TaskKind::Summarize(format) => summary_prompt(format).to_string(),
        TaskKind::ValidateFix => format!(
            "Fix this commit message so it follows the Conventional Commits format.\n\
             Format: type(scope): description\n\
             - type: one of {types}\n\
             - description: imperative mood, no period at the end\n\
             Keep the meaning of the original message. Keep the line under 72 characters.\n\
             Output only the improved commit message on a single line."
        ),
        TaskKind::StageAdvice => "Briefly explain what this code change does.\n\
             Is it a bug fix, new feature, refactoring, or cleanup? Should it be staged?\n\
             Answer in one sentence using the format: EXPLANATION - RECOMMENDATION (Yes/No/Maybe)"
            .to_string(),
    }
}

fn summary_prompt(format: SummaryFormat) -> &'static str {
    match format {
        SummaryFormat::Summary => {
            "Summarize this commit history in a few paragraphs.\n\
             Highlight the main themes and changes.\n\
             Be concise but capture the overall development activity."
        }
        SummaryFormat::Changelog => {
            "Create a changelog from these commit messages.\n\
             Group entries by type (Features, Bug Fixes, Improvements, and so on).\n\
             Use markdown with bullet points. Be concise but informative."
        }
        SummaryFormat::ReleaseNotes => {
            "Create release notes from these commit messages.\n\
             Highlight major features, breaking changes, and important fixes.\n\
             Use a professional tone suitable for end users and structure the notes with clear sections."
        }
    }
}
