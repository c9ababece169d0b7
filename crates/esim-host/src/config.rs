//! Configuration for the host binary
//!
//! Defaults, then environment overrides. Unparsable values are logged and
//! ignored.

use esim_core::ProvisioningConfig;
use esim_platform_memory::SimulatedResult;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{HostError, HostResult};

/// Which platform primitive the host simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// System broadcast with redelivery and a resolution step
    Broadcast,
    /// Direct completion callback, no resolution step
    Closure,
}

impl FromStr for PlatformKind {
    type Err = HostError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(PlatformKind::Broadcast),
            "closure" => Ok(PlatformKind::Closure),
            other => Err(HostError::ConfigurationError(format!(
                "Unknown platform: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Broadcast => write!(f, "broadcast"),
            PlatformKind::Closure => write!(f, "closure"),
        }
    }
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Platform variant to simulate
    #[serde(default = "default_platform")]
    pub platform: PlatformKind,

    /// Version the simulated device reports (platform version or OS major version)
    #[serde(default = "default_platform_version")]
    pub platform_version: u32,

    /// Minimum supported version; the variant's default when unset
    #[serde(default)]
    pub min_platform_version: Option<u32>,

    /// Whether eSIM is enabled (broadcast) or cellular plans are supported (closure)
    #[serde(default = "default_esim_enabled")]
    pub esim_enabled: bool,

    /// Result every simulated request ends with
    #[serde(default = "default_simulated_result")]
    pub simulated_result: SimulatedResult,

    /// Action name of the result broadcast
    #[serde(default)]
    pub broadcast_action: Option<String>,

    /// How long to wait for in-flight requests at end of input
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_platform() -> PlatformKind {
    PlatformKind::Broadcast
}

fn default_platform_version() -> u32 {
    34
}

fn default_esim_enabled() -> bool {
    true
}

fn default_simulated_result() -> SimulatedResult {
    SimulatedResult::Success
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            platform_version: default_platform_version(),
            min_platform_version: None,
            esim_enabled: default_esim_enabled(),
            simulated_result: default_simulated_result(),
            broadcast_action: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables
    pub fn load() -> HostResult<Self> {
        let config = Self::load_from(|key| env::var(key).ok())?;
        info!(
            platform = %config.platform,
            platform_version = config.platform_version,
            simulated_result = ?config.simulated_result,
            "Host configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn load_from<F>(lookup: F) -> HostResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(platform) = lookup("ESIM_PLATFORM") {
            match platform.parse::<PlatformKind>() {
                Ok(platform) => config.platform = platform,
                Err(_) => warn!("Invalid ESIM_PLATFORM value: {}", platform),
            }
        }

        if let Some(version) = lookup("ESIM_PLATFORM_VERSION") {
            if let Ok(version) = version.trim().parse::<u32>() {
                config.platform_version = version;
            } else {
                warn!("Invalid ESIM_PLATFORM_VERSION value: {}", version);
            }
        }

        if let Some(min_version) = lookup("ESIM_MIN_PLATFORM_VERSION") {
            if let Ok(min_version) = min_version.trim().parse::<u32>() {
                config.min_platform_version = Some(min_version);
            } else {
                warn!("Invalid ESIM_MIN_PLATFORM_VERSION value: {}", min_version);
            }
        }

        if let Some(enabled) = lookup("ESIM_ENABLED") {
            match parse_flag(&enabled) {
                Some(enabled) => config.esim_enabled = enabled,
                None => warn!("Invalid ESIM_ENABLED value: {}", enabled),
            }
        }

        if let Some(result) = lookup("ESIM_SIMULATED_RESULT") {
            match result.parse::<SimulatedResult>() {
                Ok(result) => config.simulated_result = result,
                Err(e) => warn!("Invalid ESIM_SIMULATED_RESULT value: {}", e),
            }
        }

        if let Some(action) = lookup("ESIM_BROADCAST_ACTION") {
            if action.trim().is_empty() {
                return Err(HostError::ConfigurationError(
                    "ESIM_BROADCAST_ACTION must not be empty".to_string(),
                ));
            }
            config.broadcast_action = Some(action);
        }

        if let Some(grace) = lookup("ESIM_SHUTDOWN_GRACE_MS") {
            if let Ok(grace) = grace.trim().parse::<u64>() {
                config.shutdown_grace_ms = grace;
            } else {
                warn!("Invalid ESIM_SHUTDOWN_GRACE_MS value: {}", grace);
            }
        }

        Ok(config)
    }

    /// Adapter configuration derived from the host settings
    pub fn provisioning_config(&self) -> ProvisioningConfig {
        let mut provisioning = ProvisioningConfig::default();
        if let Some(action) = &self.broadcast_action {
            provisioning.broadcast_action = action.clone();
        }
        if let Some(min_version) = self.min_platform_version {
            match self.platform {
                PlatformKind::Broadcast => provisioning.min_platform_version = min_version,
                PlatformKind::Closure => provisioning.min_os_version = min_version,
            }
        }
        provisioning
    }

    /// Grace period for draining in-flight requests
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Parse a boolean environment flag
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
