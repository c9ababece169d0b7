use crate::domain::events::EventName;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one provisioning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Accepted, platform submission not yet confirmed
    Submitted,

    /// Platform accepted the submission, waiting for its completion signal
    AwaitingCompletion,

    /// Resolvable error received, resolution step not yet started
    ResolvablePending,

    /// Resolution step started, waiting for the follow-up completion signal
    AwaitingResolution,

    /// Finished with the given event. Absorbing.
    Terminal(EventName),
}

impl ProvisioningState {
    /// Whether the request has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Terminal(_))
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: &ProvisioningState) -> bool {
        use ProvisioningState::*;

        match (self, next) {
            (Terminal(_), _) => false,
            (Submitted, AwaitingCompletion) => true,
            (AwaitingCompletion, ResolvablePending) => true,
            (ResolvablePending, AwaitingResolution) => true,
            (_, Terminal(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use ProvisioningState::*;

        assert!(Submitted.can_transition_to(&AwaitingCompletion));
        assert!(AwaitingCompletion.can_transition_to(&Terminal(EventName::Success)));
        assert!(AwaitingCompletion.can_transition_to(&ResolvablePending));
        assert!(ResolvablePending.can_transition_to(&AwaitingResolution));
        assert!(AwaitingResolution.can_transition_to(&Terminal(EventName::Fail)));
        assert!(ResolvablePending.can_transition_to(&Terminal(EventName::Fail)));
        assert!(Submitted.can_transition_to(&Terminal(EventName::Fail)));
    }

    #[test]
    fn test_terminal_is_absorbing() {
        use ProvisioningState::*;

        let done = Terminal(EventName::Success);
        assert!(done.is_terminal());
        assert!(!done.can_transition_to(&AwaitingCompletion));
        assert!(!done.can_transition_to(&Terminal(EventName::Fail)));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        use ProvisioningState::*;

        assert!(!Submitted.can_transition_to(&AwaitingResolution));
        assert!(!AwaitingCompletion.can_transition_to(&AwaitingResolution));
        assert!(!AwaitingResolution.can_transition_to(&ResolvablePending));
        assert!(!AwaitingResolution.can_transition_to(&AwaitingCompletion));
    }
}
