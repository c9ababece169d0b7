use crate::application::adapters::broadcast::BroadcastAdapter;
use crate::application::adapters::closure::ClosureAdapter;
use crate::domain::outcome::{CapabilitySupport, CompletionOutcome};
use crate::domain::request::{ProvisioningRequest, ResolutionToken, RoutingKey};
use crate::error::{AdapterError, AdapterKind};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of completion signals for one submission.
///
/// Yields exactly one non-resolvable outcome, or one `ResolvableError`
/// followed by at most one further outcome once resolution was started.
pub type OutcomeStream = BoxStream<'static, CompletionOutcome>;

/// Uniform contract over the platform provisioning primitive
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// Which completion mechanism this adapter wraps
    fn kind(&self) -> AdapterKind;

    /// Probe whether provisioning can run on this device
    fn support(&self) -> CapabilitySupport;

    /// Hand a request to the platform and return its completion signals
    async fn submit(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
    ) -> Result<OutcomeStream, AdapterError>;

    /// Start the platform's resolution step for a resolvable error.
    ///
    /// The follow-up outcome arrives on the stream returned by `submit`.
    async fn resolve(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
        token: ResolutionToken,
    ) -> Result<(), AdapterError>;

    /// Human readable installation instructions
    fn instructions(&self) -> &'static str;

    /// Release platform registrations. Idempotent.
    fn teardown(&self);

    /// Convenience over [`CapabilityAdapter::support`]
    fn check_support(&self) -> bool {
        self.support().is_supported()
    }
}

/// Tagged union over the two platform variants
pub enum PlatformAdapter {
    /// Completion through a redelivered system broadcast
    Broadcast(BroadcastAdapter),
    /// Completion through a closure handed to the platform
    Closure(ClosureAdapter),
}

impl From<BroadcastAdapter> for PlatformAdapter {
    fn from(adapter: BroadcastAdapter) -> Self {
        PlatformAdapter::Broadcast(adapter)
    }
}

impl From<ClosureAdapter> for PlatformAdapter {
    fn from(adapter: ClosureAdapter) -> Self {
        PlatformAdapter::Closure(adapter)
    }
}

#[async_trait]
impl CapabilityAdapter for PlatformAdapter {
    fn kind(&self) -> AdapterKind {
        match self {
            PlatformAdapter::Broadcast(adapter) => adapter.kind(),
            PlatformAdapter::Closure(adapter) => adapter.kind(),
        }
    }

    fn support(&self) -> CapabilitySupport {
        match self {
            PlatformAdapter::Broadcast(adapter) => adapter.support(),
            PlatformAdapter::Closure(adapter) => adapter.support(),
        }
    }

    async fn submit(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
    ) -> Result<OutcomeStream, AdapterError> {
        match self {
            PlatformAdapter::Broadcast(adapter) => adapter.submit(routing_key, request).await,
            PlatformAdapter::Closure(adapter) => adapter.submit(routing_key, request).await,
        }
    }

    async fn resolve(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
        token: ResolutionToken,
    ) -> Result<(), AdapterError> {
        match self {
            PlatformAdapter::Broadcast(adapter) => {
                adapter.resolve(routing_key, request, token).await
            }
            PlatformAdapter::Closure(adapter) => adapter.resolve(routing_key, request, token).await,
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            PlatformAdapter::Broadcast(adapter) => adapter.instructions(),
            PlatformAdapter::Closure(adapter) => adapter.instructions(),
        }
    }

    fn teardown(&self) {
        match self {
            PlatformAdapter::Broadcast(adapter) => adapter.teardown(),
            PlatformAdapter::Closure(adapter) => adapter.teardown(),
        }
    }
}
