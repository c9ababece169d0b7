use crate::domain::request::{CorrelationId, RoutingKey};
use crate::domain::state::ProvisioningState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for the provisioning coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A state machine was asked to make a transition its state does not allow
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Correlation registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Request dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Capability adapter error
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

/// Errors raised by the correlation registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another request with the same correlation id has not finished yet
    #[error("Request already in flight for correlation id: {0}")]
    AlreadyInFlight(CorrelationId),

    /// The entry was already retired or abandoned by teardown
    #[error("No in-flight request for routing key: {0}")]
    NotInFlight(RoutingKey),

    /// The owning state machine asked for a transition the entry rejects
    #[error("Invalid registry transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State held by the entry
        from: ProvisioningState,
        /// State that was requested
        to: ProvisioningState,
    },

    /// Correlation id present but empty or blank
    #[error("Correlation id must not be empty")]
    MalformedCorrelationId,
}

/// Synchronous rejections returned by the dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Request arguments were malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A request with the same correlation id is still in flight
    #[error("Request already in flight for correlation id: {0}")]
    AlreadyInFlight(CorrelationId),
}

impl DispatchError {
    /// Stable error code reported on the method-call surface
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::InvalidArgument(_) => "INVALID_ARGS",
            DispatchError::AlreadyInFlight(_) => "ALREADY_IN_FLIGHT",
        }
    }
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyInFlight(id) => DispatchError::AlreadyInFlight(id),
            other => DispatchError::InvalidArgument(other.to_string()),
        }
    }
}

/// Which platform completion mechanism an adapter wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Completion redelivered through a system broadcast
    Broadcast,
    /// Completion delivered to a closure handed to the platform
    Closure,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Broadcast => write!(f, "broadcast"),
            AdapterKind::Closure => write!(f, "closure"),
        }
    }
}

/// Errors raised by capability adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The platform primitive reported a failure
    #[error("Platform failure: {0}")]
    PlatformFailure(String),

    /// No host activity is attached to run the resolution step
    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    /// The adapter variant has no resolution step
    #[error("Resolution is not supported by the {0} adapter")]
    ResolutionUnsupported(AdapterKind),

    /// The completion receiver could not be registered
    #[error("Result receiver unavailable: {0}")]
    ReceiverUnavailable(String),

    /// No in-flight submission is routed under this key
    #[error("No in-flight submission for routing key: {0}")]
    UnknownRoute(RoutingKey),
}

/// Failure reported by a platform primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    /// Create a new platform error
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<PlatformError> for AdapterError {
    fn from(err: PlatformError) -> Self {
        AdapterError::PlatformFailure(err.0)
    }
}
