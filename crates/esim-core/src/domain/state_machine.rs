//! Drives one request from submission to its single terminal event.
//!
//! The machine is synchronous and owns no I/O. It consumes signals and
//! answers with a [`Directive`] that the async driver in the application
//! layer carries out against the adapter, the registry and the event bridge.

use crate::domain::events::ProvisioningEvent;
use crate::domain::outcome::CompletionOutcome;
use crate::domain::request::{CorrelationId, ResolutionToken};
use crate::domain::state::ProvisioningState;
use crate::CoreError;
use tracing::{debug, warn};

/// Reason reported when the platform refuses the initial submission
pub const SUBMIT_FAILED_REASON: &str = "Failed to start eSIM profile download.";

/// Reason reported when the resolution step cannot be started
pub const RESOLUTION_FAILED_REASON: &str =
    "Failed to start or complete resolution activity for eSIM.";

/// Reason reported when a second resolvable error arrives after resolution
pub const NESTED_RESOLUTION_REASON: &str =
    "Received another resolvable error after resolution; nested resolution is not supported.";

/// Reason reported when the completion stream ends without a terminal outcome
pub const CHANNEL_CLOSED_REASON: &str = "completion channel closed without a result";

/// What the driver must do after feeding a signal to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Run the platform's resolution step with this token
    Resolve(ResolutionToken),
    /// The machine went terminal; emit this event exactly once
    Emit(ProvisioningEvent),
    /// Nothing to do; the signal was discarded
    Discard,
}

/// State machine for a single provisioning request
#[derive(Debug, Clone)]
pub struct ProvisioningStateMachine {
    correlation_id: Option<CorrelationId>,
    state: ProvisioningState,
}

impl ProvisioningStateMachine {
    /// Create a machine in the `Submitted` state
    pub fn new(correlation_id: Option<CorrelationId>) -> Self {
        Self {
            correlation_id,
            state: ProvisioningState::Submitted,
        }
    }

    /// Current state
    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Correlation id of the request
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// The platform accepted the submission
    pub fn mark_submitted(&mut self) -> Result<(), CoreError> {
        if self.state != ProvisioningState::Submitted {
            return Err(CoreError::InvalidTransition(format!(
                "Cannot confirm submission in state: {:?}",
                self.state
            )));
        }
        self.transition(ProvisioningState::AwaitingCompletion);
        Ok(())
    }

    /// The resolution step was started on the platform
    pub fn on_resolution_started(&mut self) -> Result<(), CoreError> {
        if self.state != ProvisioningState::ResolvablePending {
            return Err(CoreError::InvalidTransition(format!(
                "Cannot start resolution in state: {:?}",
                self.state
            )));
        }
        self.transition(ProvisioningState::AwaitingResolution);
        Ok(())
    }

    /// Feed a completion signal from the adapter
    pub fn on_outcome(&mut self, outcome: CompletionOutcome) -> Directive {
        match self.state {
            ProvisioningState::Terminal(event) => {
                warn!(
                    correlation_id = ?self.correlation_id,
                    outcome = outcome.kind(),
                    terminal = %event,
                    "Discarding signal for finished request"
                );
                Directive::Discard
            }
            ProvisioningState::Submitted | ProvisioningState::AwaitingCompletion => {
                match outcome {
                    CompletionOutcome::ResolvableError { token } => {
                        self.transition(ProvisioningState::ResolvablePending);
                        Directive::Resolve(token)
                    }
                    other => self.finish_with_outcome(&other),
                }
            }
            ProvisioningState::ResolvablePending | ProvisioningState::AwaitingResolution => {
                match outcome {
                    CompletionOutcome::ResolvableError { .. } => {
                        warn!(
                            correlation_id = ?self.correlation_id,
                            "Second resolvable error after resolution"
                        );
                        self.finish(ProvisioningEvent::unexpected_signal(
                            self.correlation_id.clone(),
                            NESTED_RESOLUTION_REASON,
                        ))
                    }
                    other => self.finish_with_outcome(&other),
                }
            }
        }
    }

    /// The platform refused the initial submission
    pub fn on_platform_failure(&mut self, details: Option<String>) -> Directive {
        self.fail(SUBMIT_FAILED_REASON.to_string(), details)
    }

    /// The resolution step could not be started
    pub fn on_resolution_failed(&mut self, reason: String, details: Option<String>) -> Directive {
        self.fail(reason, details)
    }

    /// The adapter's outcome stream ended
    pub fn on_stream_closed(&mut self) -> Directive {
        if self.state.is_terminal() {
            return Directive::Discard;
        }
        warn!(
            correlation_id = ?self.correlation_id,
            state = ?self.state,
            "Completion stream closed before a terminal outcome"
        );
        self.finish(ProvisioningEvent::unexpected_signal(
            self.correlation_id.clone(),
            CHANNEL_CLOSED_REASON,
        ))
    }

    fn fail(&mut self, reason: String, details: Option<String>) -> Directive {
        if self.state.is_terminal() {
            return Directive::Discard;
        }
        self.finish(ProvisioningEvent::platform_failure(
            self.correlation_id.clone(),
            reason,
            details,
        ))
    }

    fn finish_with_outcome(&mut self, outcome: &CompletionOutcome) -> Directive {
        match ProvisioningEvent::from_outcome(self.correlation_id.clone(), outcome) {
            Some(event) => self.finish(event),
            None => Directive::Discard,
        }
    }

    fn finish(&mut self, event: ProvisioningEvent) -> Directive {
        self.transition(ProvisioningState::Terminal(event.event));
        Directive::Emit(event)
    }

    fn transition(&mut self, next: ProvisioningState) {
        debug!(
            correlation_id = ?self.correlation_id,
            from = ?self.state,
            to = ?next,
            "Provisioning state transition"
        );
        self.state = next;
    }
}
