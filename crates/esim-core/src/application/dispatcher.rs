use crate::application::capability::CapabilityAdapter;
use crate::application::event_bridge::EventBridge;
use crate::application::provisioning_run::ProvisioningRun;
use crate::domain::events::ProvisioningEvent;
use crate::domain::outcome::CapabilitySupport;
use crate::domain::registry::CorrelationRegistry;
use crate::domain::request::ProvisioningRequest;
use crate::error::DispatchError;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for provisioning requests.
///
/// Validates, checks capability support, registers the request and hands it
/// to the adapter. The acknowledgment returned by
/// [`RequestDispatcher::submit_provisioning`] carries no outcome; the outcome
/// arrives later as exactly one event on the bridge.
#[derive(Clone)]
pub struct RequestDispatcher {
    adapter: Arc<dyn CapabilityAdapter>,
    registry: CorrelationRegistry,
    bridge: EventBridge,
}

impl RequestDispatcher {
    /// Create a new dispatcher
    pub fn new(
        adapter: Arc<dyn CapabilityAdapter>,
        registry: CorrelationRegistry,
        bridge: EventBridge,
    ) -> Self {
        Self {
            adapter,
            registry,
            bridge,
        }
    }

    /// Whether provisioning can run on this device
    pub fn check_support(&self) -> bool {
        self.adapter.check_support()
    }

    /// Accept a provisioning request
    pub async fn submit_provisioning(
        &self,
        request: ProvisioningRequest,
    ) -> Result<(), DispatchError> {
        if let Some(id) = &request.correlation_id {
            if !id.is_well_formed() {
                return Err(DispatchError::InvalidArgument(
                    "correlationId must not be empty".to_string(),
                ));
            }
        }

        if !request.has_address() {
            warn!(
                correlation_id = ?request.correlation_id,
                "Provisioning request has an empty address; forwarding anyway"
            );
        }

        if let Some(id) = &request.correlation_id {
            if self.registry.is_in_flight(id) {
                warn!(correlation_id = %id, "Rejecting duplicate before the support check");
                return Err(DispatchError::AlreadyInFlight(id.clone()));
            }
        }

        if let CapabilitySupport::Unsupported { reason } = self.adapter.support() {
            info!(
                correlation_id = ?request.correlation_id,
                reason = %reason,
                "Capability unsupported; reporting without registering"
            );
            self.bridge
                .emit(ProvisioningEvent::unsupported(request.correlation_id, reason));
            return Ok(());
        }

        let handle = self.registry.begin(request.correlation_id.as_ref())?;

        info!(
            correlation_id = ?request.correlation_id,
            routing_key = %handle.routing_key(),
            adapter = %self.adapter.kind(),
            "Provisioning request accepted"
        );

        ProvisioningRun::new(
            handle,
            Arc::new(request),
            self.adapter.clone(),
            self.registry.clone(),
            self.bridge.clone(),
        )
        .start()
        .await;

        Ok(())
    }

    /// Human readable installation instructions
    pub fn instructions(&self) -> &'static str {
        self.adapter.instructions()
    }

    /// Abandon all in-flight requests, detach the consumer and release the adapter
    pub fn teardown(&self) -> usize {
        let abandoned = self.registry.teardown_all();
        self.bridge.detach();
        self.adapter.teardown();
        info!(abandoned, "Provisioning dispatcher torn down");
        abandoned
    }

    /// The correlation registry
    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// The event bridge
    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }
}
