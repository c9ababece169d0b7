use crate::domain::request::ResolutionToken;
use serde::{Deserialize, Serialize};

/// Normalized completion signal produced by a capability adapter
///
/// Consumed only by the provisioning state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompletionOutcome {
    /// The profile was installed
    Success,

    /// The platform rejected the profile
    Fail {
        /// Platform specific error code
        error_code: Option<i64>,
    },

    /// The user cancelled
    Cancel,

    /// The platform returned something the adapter cannot classify
    Unknown {
        /// Raw platform result code, when one exists
        result_code: Option<i64>,
        /// Diagnostic detail
        reason: Option<String>,
    },

    /// The capability is unavailable for this request
    Unsupported {
        /// Human readable reason
        reason: String,
    },

    /// The platform needs a user interaction step before it can continue
    ResolvableError {
        /// Token to hand back to the platform's resolution step
        token: ResolutionToken,
    },
}

impl CompletionOutcome {
    /// Build an unknown outcome carrying only a reason
    pub fn unknown_with_reason(reason: impl Into<String>) -> Self {
        CompletionOutcome::Unknown {
            result_code: None,
            reason: Some(reason.into()),
        }
    }

    /// Whether this outcome asks for the resolution sub-flow
    pub fn is_resolvable(&self) -> bool {
        matches!(self, CompletionOutcome::ResolvableError { .. })
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionOutcome::Success => "success",
            CompletionOutcome::Fail { .. } => "fail",
            CompletionOutcome::Cancel => "cancel",
            CompletionOutcome::Unknown { .. } => "unknown",
            CompletionOutcome::Unsupported { .. } => "unsupported",
            CompletionOutcome::ResolvableError { .. } => "resolvable_error",
        }
    }
}

/// Result of a capability support probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilitySupport {
    /// Provisioning can proceed
    Supported,
    /// Provisioning cannot proceed on this device
    Unsupported {
        /// Human readable reason
        reason: String,
    },
}

impl CapabilitySupport {
    /// Create an unsupported result
    pub fn unsupported(reason: impl Into<String>) -> Self {
        CapabilitySupport::Unsupported {
            reason: reason.into(),
        }
    }

    /// Whether provisioning can proceed
    pub fn is_supported(&self) -> bool {
        matches!(self, CapabilitySupport::Supported)
    }
}
