//! Drives a [`ConfirmationSession`] against a user (or a stand-in).

use dialoguer::Select;

use super::{ConfirmationSession, RegenerateOutcome};
use crate::error::{GenerationError, SessionError};
use crate::generate::{GenerationResult, Generator};
use crate::provider::Transport;

/// A user decision on the current proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Accept,
    Regenerate,
    Cancel,
}

/// Source of decisions and sink for proposals.
pub trait Prompter {
    /// Display a proposal. `attempt` starts at 1.
    fn show(&mut self, proposal: &GenerationResult, attempt: u32);

    fn choose(&mut self) -> Choice;

    /// Tell the user a regeneration failed and the previous proposal stands.
    fn report_failure(&mut self, error: &GenerationError);
}

/// How a driven session ended.
#[derive(Debug)]
pub enum SessionOutcome<V> {
    Accepted { text: String, value: V },
    Cancelled,
}

/// Loop until the user accepts or cancels.
///
/// `effect` runs once, on accept, with the proposal shown last.
pub async fn drive<T, P, F, V, E>(
    session: &mut ConfirmationSession,
    generator: &Generator<T>,
    prompter: &mut P,
    effect: F,
) -> Result<SessionOutcome<V>, SessionError>
where
    T: Transport,
    P: Prompter + ?Sized,
    F: FnOnce(&GenerationResult) -> Result<V, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut shown_regenerations = None;
    loop {
        if shown_regenerations != Some(session.regenerations()) {
            prompter.show(session.current(), session.regenerations() + 1);
            shown_regenerations = Some(session.regenerations());
        }

        match prompter.choose() {
            Choice::Accept => {
                let text = session.current().text().to_string();
                let value = session.accept(effect)?;
                return Ok(SessionOutcome::Accepted { text, value });
            }
            Choice::Cancel => {
                session.cancel()?;
                return Ok(SessionOutcome::Cancelled);
            }
            Choice::Regenerate => {
                if let RegenerateOutcome::Failed(e) = session.regenerate(generator).await? {
                    prompter.report_failure(&e);
                }
            }
        }
    }
}

/// Accepts the first proposal without asking (`--yes`).
#[derive(Debug, Default)]
pub struct AutoAccept;

impl Prompter for AutoAccept {
    fn show(&mut self, proposal: &GenerationResult, _attempt: u32) {
        print_proposal(proposal);
    }

    fn choose(&mut self) -> Choice {
        Choice::Accept
    }

    fn report_failure(&mut self, _error: &GenerationError) {}
}

/// Menu-driven prompter for a terminal.
#[derive(Debug)]
pub struct TerminalPrompter {
    /// Verb for the accept item, e.g. "Commit" or "Create branch".
    accept_label: String,
}

impl TerminalPrompter {
    pub fn new(accept_label: impl Into<String>) -> Self {
        Self {
            accept_label: accept_label.into(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn show(&mut self, proposal: &GenerationResult, attempt: u32) {
        if attempt > 1 {
            println!(
                "\nAttempt {} (creativity {:.1}):",
                attempt,
                proposal.creativity()
            );
        }
        print_proposal(proposal);
    }

    fn choose(&mut self) -> Choice {
        let items = [
            self.accept_label.as_str(),
            "Regenerate (more creative)",
            "Cancel",
        ];
        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&items)
            .default(0)
            .interact_opt();

        // Escape, q and Ctrl-C all mean cancel.
        match selection {
            Ok(Some(0)) => Choice::Accept,
            Ok(Some(1)) => Choice::Regenerate,
            _ => Choice::Cancel,
        }
    }

    fn report_failure(&mut self, error: &GenerationError) {
        eprintln!("Regeneration failed: {}", error);
        eprintln!("Keeping the previous suggestion.");
    }
}

fn print_proposal(proposal: &GenerationResult) {
    println!("\nSuggested {}:\n", proposal.task());
    for line in proposal.text().lines() {
        println!("  {}", line);
    }
    println!();
    if proposal.truncated() {
        eprintln!("Warning: the input was too large and was truncated before generation.");
    }
}
