//!
//! eSIM Core - correlation and state-machine layer for eSIM provisioning
//!
//! Many provisioning requests can be in flight at once while every outcome
//! leaves through one shared event stream. This crate attributes each
//! outcome to the request that caused it, drives each request through the
//! platform's resolvable-error retry, and guarantees at most one terminal
//! event per request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - requests, outcomes, events, states, registry and state machine
pub mod domain;

/// Application services - event bridge, adapters, dispatcher and runtime interface
pub mod application;

/// Adapter configuration
pub mod config;

/// Installation walkthrough texts
pub mod instructions;

/// Error types
pub mod error;

// Re-export key types
pub use config::ProvisioningConfig;
pub use error::{AdapterError, AdapterKind, CoreError, DispatchError, PlatformError, RegistryError};

pub use application::adapters::broadcast::{
    Broadcast, BroadcastAdapter, BroadcastPlatform, BroadcastReceiver, CallbackIntent,
};
pub use application::adapters::closure::{
    ClosureAdapter, PlanCompletion, PlanProvisioningPlatform, PlanRequest, PlanResult,
};
pub use application::capability::{CapabilityAdapter, OutcomeStream, PlatformAdapter};
pub use application::dispatcher::RequestDispatcher;
pub use application::event_bridge::{ChannelConsumer, EventBridge, EventConsumer};
pub use application::runtime_interface::{Method, MethodCall, MethodResponse, RuntimeInterface};

pub use domain::events::{EventBody, EventName, ProvisioningEvent};
pub use domain::outcome::{CapabilitySupport, CompletionOutcome};
pub use domain::registry::{CorrelationRegistry, RegistryEntry, RegistryHandle};
pub use domain::request::{CorrelationId, ProvisioningRequest, ResolutionToken, RoutingKey};
pub use domain::state::ProvisioningState;
pub use domain::state_machine::{Directive, ProvisioningStateMachine};
