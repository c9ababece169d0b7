/// Single-consumer event sink
pub mod event_bridge;

/// Capability adapter contract
pub mod capability;

/// Platform adapter variants
pub mod adapters;

/// Request entry point
pub mod dispatcher;

/// Runtime interface for external transports
pub mod runtime_interface;

mod provisioning_run;
