//! Adapter for platforms that hand the result straight to a completion
//! closure. There is no resolution step on this variant.

use crate::application::capability::{CapabilityAdapter, OutcomeStream};
use crate::config::ProvisioningConfig;
use crate::domain::outcome::{CapabilitySupport, CompletionOutcome};
use crate::domain::request::{ProvisioningRequest, ResolutionToken, RoutingKey};
use crate::error::{AdapterError, AdapterKind, PlatformError};
use crate::instructions::CLOSURE_INSTRUCTIONS;
use async_trait::async_trait;
use futures::channel::oneshot;
use futures::{future, stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reason reported for a result the platform does not document
pub const UNKNOWN_PLAN_RESULT_REASON: &str = "Unknown default result from addPlan.";

/// Result handed to the completion closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanResult {
    /// Platform could not tell
    Unknown,
    /// Installation failed
    Fail,
    /// Installation succeeded
    Success,
    /// User cancelled
    Cancel,
    /// A raw value outside the documented set
    Other(i64),
}

/// Plan request forwarded to the platform; empty optional fields are omitted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanRequest {
    /// Activation address
    pub address: String,
    /// Matching id
    pub matching_id: Option<String>,
    /// OID
    pub oid: Option<String>,
    /// Confirmation code
    pub confirmation_code: Option<String>,
    /// ICCID
    pub iccid: Option<String>,
    /// EID
    pub eid: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl From<&ProvisioningRequest> for PlanRequest {
    fn from(request: &ProvisioningRequest) -> Self {
        Self {
            address: request.address.clone(),
            matching_id: non_empty(&request.matching_id),
            oid: non_empty(&request.oid),
            confirmation_code: non_empty(&request.confirmation_code),
            iccid: non_empty(&request.iccid),
            eid: non_empty(&request.eid),
        }
    }
}

/// Completion closure handed to the platform. Called at most once.
pub type PlanCompletion = Box<dyn FnOnce(PlanResult) + Send + 'static>;

/// The platform primitive behind the closure variant
pub trait PlanProvisioningPlatform: Send + Sync {
    /// OS major version
    fn os_major_version(&self) -> u32;

    /// Whether the device can provision cellular plans
    fn supports_cellular_plan(&self) -> bool;

    /// Start installing a plan; `completion` receives the result
    fn add_plan(&self, request: PlanRequest, completion: PlanCompletion)
        -> Result<(), PlatformError>;
}

/// Normalize a completion result into a completion outcome
pub fn outcome_from_plan_result(result: PlanResult) -> CompletionOutcome {
    match result {
        PlanResult::Success => CompletionOutcome::Success,
        PlanResult::Fail => CompletionOutcome::Fail { error_code: None },
        PlanResult::Cancel => CompletionOutcome::Cancel,
        PlanResult::Unknown => CompletionOutcome::Unknown {
            result_code: None,
            reason: None,
        },
        PlanResult::Other(raw) => CompletionOutcome::Unknown {
            result_code: Some(raw),
            reason: Some(UNKNOWN_PLAN_RESULT_REASON.to_string()),
        },
    }
}

/// Capability adapter over a [`PlanProvisioningPlatform`]
pub struct ClosureAdapter {
    platform: Arc<dyn PlanProvisioningPlatform>,
    min_os_version: u32,
}

impl ClosureAdapter {
    /// Create an adapter over `platform`
    pub fn new(platform: Arc<dyn PlanProvisioningPlatform>, config: &ProvisioningConfig) -> Self {
        Self {
            platform,
            min_os_version: config.min_os_version,
        }
    }
}

#[async_trait]
impl CapabilityAdapter for ClosureAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Closure
    }

    fn support(&self) -> CapabilitySupport {
        if self.platform.os_major_version() < self.min_os_version {
            return CapabilitySupport::unsupported(format!(
                "OS version {}.0 or higher is required to install eSIM profiles.",
                self.min_os_version
            ));
        }
        if !self.platform.supports_cellular_plan() {
            return CapabilitySupport::unsupported(
                "Device does not support cellular plan provisioning.",
            );
        }
        CapabilitySupport::Supported
    }

    async fn submit(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
    ) -> Result<OutcomeStream, AdapterError> {
        let (tx, rx) = oneshot::channel();
        let correlation_id = request.correlation_id.clone();

        let completion: PlanCompletion = Box::new(move |result| {
            debug!(correlation_id = ?correlation_id, ?result, "Plan completion received");
            if tx.send(outcome_from_plan_result(result)).is_err() {
                warn!(correlation_id = ?correlation_id, "Plan completion arrived after the request was abandoned");
            }
        });

        self.platform
            .add_plan(PlanRequest::from(request.as_ref()), completion)?;

        info!(
            correlation_id = ?request.correlation_id,
            %routing_key,
            "Plan installation started"
        );
        Ok(stream::once(rx)
            .filter_map(|received| future::ready(received.ok()))
            .boxed())
    }

    async fn resolve(
        &self,
        _routing_key: RoutingKey,
        _request: Arc<ProvisioningRequest>,
        _token: ResolutionToken,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::ResolutionUnsupported(AdapterKind::Closure))
    }

    fn instructions(&self) -> &'static str {
        CLOSURE_INSTRUCTIONS
    }

    fn teardown(&self) {
        debug!("Closure adapter holds no registrations");
    }
}
