/// Request value objects and identifiers
pub mod request;

/// Completion outcomes produced by capability adapters
pub mod outcome;

/// Externally observable provisioning events
pub mod events;

/// Provisioning lifecycle states
pub mod state;

/// Correlation registry of in-flight requests
pub mod registry;

/// Per-request provisioning state machine
pub mod state_machine;
