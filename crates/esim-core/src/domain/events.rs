use crate::domain::outcome::CompletionOutcome;
use crate::domain::request::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Body key carrying a platform error code
pub const ERROR_CODE: &str = "errorCode";
/// Body key carrying an unclassified platform result code
pub const RESULT_CODE: &str = "resultCode";
/// Body key carrying a human readable reason
pub const REASON: &str = "reason";
/// Body key carrying diagnostic detail for a failure
pub const ERROR_DETAILS: &str = "errorDetails";

/// Body of an event: a flat map of scalar values
pub type EventBody = Map<String, Value>;

/// Name of an externally observable event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    /// Profile installed
    Success,
    /// Provisioning failed
    Fail,
    /// User cancelled
    Cancel,
    /// Outcome could not be classified
    Unknown,
    /// Capability not available
    Unsupport,
}

impl EventName {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Success => "success",
            EventName::Fail => "fail",
            EventName::Cancel => "cancel",
            EventName::Unknown => "unknown",
            EventName::Unsupport => "unsupport",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only externally observable artifact of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningEvent {
    /// Correlation id of the originating request, if it carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    /// Event name
    pub event: EventName,

    /// Event body
    #[serde(default)]
    pub body: EventBody,
}

impl ProvisioningEvent {
    /// Create an event
    pub fn new(correlation_id: Option<CorrelationId>, event: EventName, body: EventBody) -> Self {
        Self {
            correlation_id,
            event,
            body,
        }
    }

    /// Translate a terminal outcome into its event.
    ///
    /// Returns `None` for a resolvable error, which never produces an event.
    pub fn from_outcome(
        correlation_id: Option<CorrelationId>,
        outcome: &CompletionOutcome,
    ) -> Option<Self> {
        let mut body = EventBody::new();
        let event = match outcome {
            CompletionOutcome::Success => EventName::Success,
            CompletionOutcome::Fail { error_code } => {
                if let Some(code) = error_code {
                    body.insert(ERROR_CODE.to_string(), Value::from(*code));
                }
                EventName::Fail
            }
            CompletionOutcome::Cancel => EventName::Cancel,
            CompletionOutcome::Unknown {
                result_code,
                reason,
            } => {
                if let Some(code) = result_code {
                    body.insert(RESULT_CODE.to_string(), Value::from(*code));
                }
                if let Some(reason) = reason {
                    body.insert(REASON.to_string(), Value::from(reason.clone()));
                }
                EventName::Unknown
            }
            CompletionOutcome::Unsupported { reason } => {
                body.insert(REASON.to_string(), Value::from(reason.clone()));
                EventName::Unsupport
            }
            CompletionOutcome::ResolvableError { .. } => return None,
        };
        Some(Self::new(correlation_id, event, body))
    }

    /// `unsupport` event with its reason
    pub fn unsupported(correlation_id: Option<CorrelationId>, reason: impl Into<String>) -> Self {
        let mut body = EventBody::new();
        body.insert(REASON.to_string(), Value::from(reason.into()));
        Self::new(correlation_id, EventName::Unsupport, body)
    }

    /// `fail` event describing a platform failure
    pub fn platform_failure(
        correlation_id: Option<CorrelationId>,
        reason: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        let mut body = EventBody::new();
        body.insert(REASON.to_string(), Value::from(reason.into()));
        if let Some(details) = details {
            body.insert(ERROR_DETAILS.to_string(), Value::from(details));
        }
        Self::new(correlation_id, EventName::Fail, body)
    }

    /// `unknown` event describing a signal the state machine did not expect
    pub fn unexpected_signal(
        correlation_id: Option<CorrelationId>,
        reason: impl Into<String>,
    ) -> Self {
        let mut body = EventBody::new();
        body.insert(REASON.to_string(), Value::from(reason.into()));
        Self::new(correlation_id, EventName::Unknown, body)
    }

    /// Returns the type of the event as a string
    pub fn event_type(&self) -> &'static str {
        match self.event {
            EventName::Success => "provisioning.success",
            EventName::Fail => "provisioning.fail",
            EventName::Cancel => "provisioning.cancel",
            EventName::Unknown => "provisioning.unknown",
            EventName::Unsupport => "provisioning.unsupport",
        }
    }
}
