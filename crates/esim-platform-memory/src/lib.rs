//! In-memory simulated eSIM platforms
//!
//! This crate provides scriptable implementations of the platform primitives
//! the adapters in esim-core wrap. They record every call and let a test or
//! the host binary decide how each download and resolution is answered.

use esim_core::{
    BroadcastAdapter, CapabilityAdapter, ClosureAdapter, PlanResult, PlatformAdapter,
    ProvisioningConfig, ResolutionToken,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod broadcast;
pub use broadcast::{BroadcastReply, PlatformCall, SimulatedBroadcastPlatform};

pub mod plan;
pub use plan::{PlanReply, SimulatedPlanPlatform};

/// Token the simulated broadcast platform attaches to resolvable errors
pub const SIMULATED_RESOLUTION_TOKEN: &str = "simulated-resolution";

/// Canned result a simulated platform reports for every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedResult {
    /// Every request succeeds
    Success,
    /// Every request fails
    Fail,
    /// Every request is cancelled
    Cancel,
    /// Every request ends unclassified
    Unknown,
    /// Every download asks for resolution, which then succeeds
    Resolvable,
}

/// Unrecognised simulated result name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown simulated result: {0}")]
pub struct UnknownSimulatedResult(pub String);

impl FromStr for SimulatedResult {
    type Err = UnknownSimulatedResult;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(SimulatedResult::Success),
            "fail" => Ok(SimulatedResult::Fail),
            "cancel" => Ok(SimulatedResult::Cancel),
            "unknown" => Ok(SimulatedResult::Unknown),
            "resolvable" => Ok(SimulatedResult::Resolvable),
            _ => Err(UnknownSimulatedResult(raw.to_string())),
        }
    }
}

impl SimulatedResult {
    /// Replies for downloads and for resolutions on the broadcast variant
    pub fn broadcast_replies(&self) -> (BroadcastReply, BroadcastReply) {
        match self {
            SimulatedResult::Success => (BroadcastReply::Ok, BroadcastReply::Ok),
            SimulatedResult::Fail => (
                BroadcastReply::Error {
                    detailed_code: None,
                },
                BroadcastReply::Ok,
            ),
            // The broadcast variant has no dedicated cancel code
            SimulatedResult::Cancel | SimulatedResult::Unknown => {
                (BroadcastReply::Code(-1), BroadcastReply::Ok)
            }
            SimulatedResult::Resolvable => (
                BroadcastReply::Resolvable {
                    token: ResolutionToken::new(SIMULATED_RESOLUTION_TOKEN),
                },
                BroadcastReply::Ok,
            ),
        }
    }

    /// Reply on the closure variant, which has no resolution step
    pub fn plan_reply(&self) -> PlanReply {
        match self {
            SimulatedResult::Success => PlanReply::Complete(PlanResult::Success),
            SimulatedResult::Fail => PlanReply::Complete(PlanResult::Fail),
            SimulatedResult::Cancel => PlanReply::Complete(PlanResult::Cancel),
            SimulatedResult::Unknown | SimulatedResult::Resolvable => {
                PlanReply::Complete(PlanResult::Unknown)
            }
        }
    }
}

/// Provider wiring simulated platforms into capability adapters
pub struct SimulatedPlatformProvider {
    config: ProvisioningConfig,
}

impl SimulatedPlatformProvider {
    /// Create a provider using the given adapter configuration
    pub fn new(config: ProvisioningConfig) -> Self {
        Self { config }
    }

    /// A broadcast-variant adapter over `platform`
    pub fn broadcast_adapter(
        &self,
        platform: Arc<SimulatedBroadcastPlatform>,
    ) -> Arc<dyn CapabilityAdapter> {
        debug!(action = %self.config.broadcast_action, "Creating simulated broadcast adapter");
        Arc::new(PlatformAdapter::from(BroadcastAdapter::new(
            platform,
            &self.config,
        )))
    }

    /// A closure-variant adapter over `platform`
    pub fn closure_adapter(&self, platform: Arc<SimulatedPlanPlatform>) -> Arc<dyn CapabilityAdapter> {
        debug!("Creating simulated closure adapter");
        Arc::new(PlatformAdapter::from(ClosureAdapter::new(
            platform,
            &self.config,
        )))
    }

    /// A broadcast platform scripted to answer every request with `result`
    pub fn scripted_broadcast_platform(result: SimulatedResult) -> SimulatedBroadcastPlatform {
        let platform = SimulatedBroadcastPlatform::new();
        let (download, resolution) = result.broadcast_replies();
        platform.reply_to_downloads_with(download);
        platform.reply_to_resolutions_with(resolution);
        platform
    }

    /// A plan platform scripted to answer every request with `result`
    pub fn scripted_plan_platform(result: SimulatedResult) -> SimulatedPlanPlatform {
        let platform = SimulatedPlanPlatform::new();
        platform.reply_with(result.plan_reply());
        platform
    }
}

impl Default for SimulatedPlatformProvider {
    fn default() -> Self {
        Self::new(ProvisioningConfig::default())
    }
}
