//! Accept / regenerate / cancel state machine for one generated artifact.
//!
//! ```text
//! Proposed --accept-->     Accepted   (terminal, side effect runs once)
//! Proposed --cancel-->     Cancelled  (terminal, no side effect)
//! Proposed --regenerate--> Regenerating --success/failure--> Proposed
//! ```
//!
//! A session is a plain value owned by its caller. Nothing is global, so
//! sessions are independent and the creativity it escalates never outlives it.

pub mod interactive;

use std::error::Error as StdError;

use tracing::{debug, info, warn};

use crate::error::{GenerationError, SessionError};
use crate::generate::{GenerationRequest, GenerationResult, Generator};
use crate::provider::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Proposed,
    Regenerating,
    Accepted,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Accepted | SessionState::Cancelled)
    }
}

/// How creativity grows with each regeneration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreativityPolicy {
    baseline: f32,
    step: f32,
    ceiling: f32,
}

impl CreativityPolicy {
    /// `ceiling` is raised to `baseline` if it is lower.
    pub fn new(baseline: f32, step: f32, ceiling: f32) -> Self {
        Self {
            baseline,
            step: step.max(0.0),
            ceiling: ceiling.max(baseline),
        }
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Creativity after `regenerations` successful regenerations:
    /// `min(baseline + regenerations * step, ceiling)`.
    pub fn creativity_for(&self, regenerations: u32) -> f32 {
        (self.baseline + regenerations as f32 * self.step).min(self.ceiling)
    }
}

impl Default for CreativityPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_TEMPERATURE,
            crate::config::DEFAULT_CREATIVITY_STEP,
            crate::config::MAX_TEMPERATURE,
        )
    }
}

/// Result of one regeneration attempt.
#[derive(Debug)]
pub enum RegenerateOutcome {
    /// A new proposal replaced the old one.
    Replaced,
    /// The attempt failed; the previous proposal is still current.
    Failed(GenerationError),
}

/// A live confirmation session.
#[derive(Debug)]
pub struct ConfirmationSession {
    request: GenerationRequest,
    policy: CreativityPolicy,
    state: SessionState,
    current: GenerationResult,
    superseded: Vec<GenerationResult>,
    regenerations: u32,
    attempts: u32,
}

impl ConfirmationSession {
    /// Enter `Proposed` with the first successful result, which was produced
    /// at the policy's baseline.
    pub fn new(request: GenerationRequest, policy: CreativityPolicy, first: GenerationResult) -> Self {
        Self {
            request,
            policy,
            state: SessionState::Proposed,
            current: first,
            superseded: Vec::new(),
            regenerations: 0,
            attempts: 1,
        }
    }

    /// Generate the first proposal at baseline creativity and open a session on it.
    pub async fn start<T: Transport>(
        generator: &Generator<T>,
        request: GenerationRequest,
        policy: CreativityPolicy,
    ) -> Result<Self, GenerationError> {
        let request = request.with_creativity(policy.baseline());
        let first = generator.generate(&request).await?;
        Ok(Self::new(request, policy, first))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The proposal an accept would apply.
    pub fn current(&self) -> &GenerationResult {
        &self.current
    }

    /// Earlier proposals, oldest first.
    pub fn superseded(&self) -> &[GenerationResult] {
        &self.superseded
    }

    /// Successful regenerations so far.
    pub fn regenerations(&self) -> u32 {
        self.regenerations
    }

    /// Generation calls made, including the first and any failures.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Creativity of the current proposal's escalation level.
    pub fn creativity(&self) -> f32 {
        match self.state {
            // Terminal sessions are back at baseline.
            SessionState::Accepted | SessionState::Cancelled => self.policy.baseline(),
            _ => self.policy.creativity_for(self.regenerations),
        }
    }

    pub fn policy(&self) -> CreativityPolicy {
        self.policy
    }

    /// Move to `Regenerating` and return the escalated request to run.
    pub fn begin_regenerate(&mut self) -> Result<GenerationRequest, SessionError> {
        self.require_proposed()?;
        self.state = SessionState::Regenerating;
        self.attempts += 1;

        let creativity = self.policy.creativity_for(self.regenerations + 1);
        debug!(
            "Regenerating {} (attempt {}, creativity {:.2})",
            self.request.task, self.attempts, creativity
        );
        Ok(self.request.clone().with_creativity(creativity))
    }

    /// Return to `Proposed` with the outcome of a regeneration.
    ///
    /// On failure the previous proposal stays current and creativity is not
    /// escalated.
    pub fn finish_regenerate(
        &mut self,
        outcome: Result<GenerationResult, GenerationError>,
    ) -> Result<RegenerateOutcome, SessionError> {
        if self.state != SessionState::Regenerating {
            return Err(self.not_proposed_or_finished());
        }
        self.state = SessionState::Proposed;

        match outcome {
            Ok(result) => {
                let previous = std::mem::replace(&mut self.current, result);
                self.superseded.push(previous);
                self.regenerations += 1;
                Ok(RegenerateOutcome::Replaced)
            }
            Err(e) => {
                warn!("Regeneration failed, keeping previous proposal: {}", e);
                Ok(RegenerateOutcome::Failed(e))
            }
        }
    }

    /// Run one full regeneration through `generator`.
    pub async fn regenerate<T: Transport>(
        &mut self,
        generator: &Generator<T>,
    ) -> Result<RegenerateOutcome, SessionError> {
        let request = self.begin_regenerate()?;
        let outcome = generator.generate(&request).await;
        self.finish_regenerate(outcome)
    }

    /// Accept the current proposal and apply `effect` to it.
    ///
    /// The session is terminal as soon as `effect` is invoked, so the effect
    /// runs at most once even if it fails.
    pub fn accept<F, V, E>(&mut self, effect: F) -> Result<V, SessionError>
    where
        F: FnOnce(&GenerationResult) -> Result<V, E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.require_proposed()?;
        self.state = SessionState::Accepted;
        info!(
            "Accepted {} after {} regeneration(s)",
            self.request.task, self.regenerations
        );
        effect(&self.current).map_err(|e| SessionError::SideEffect(e.into()))
    }

    /// Cancel without any side effect.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Accepted | SessionState::Cancelled => Err(SessionError::Finished(self.state)),
            SessionState::Proposed | SessionState::Regenerating => {
                self.state = SessionState::Cancelled;
                debug!("Cancelled {}", self.request.task);
                Ok(())
            }
        }
    }

    /// Consume the session, returning the last proposal.
    pub fn into_current(self) -> GenerationResult {
        self.current
    }

    fn require_proposed(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Proposed => Ok(()),
            _ => Err(self.not_proposed_or_finished()),
        }
    }

    fn not_proposed_or_finished(&self) -> SessionError {
        if self.state.is_terminal() {
            SessionError::Finished(self.state)
        } else {
            SessionError::NotProposed(self.state)
        }
    }
}
