//! Monitoring module for the eSIM provisioning coordinator.

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod logging;
pub mod metrics;

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the first log line
    pub service_name: String,
    /// Log level filter (e.g., "info,esim=debug"); `RUST_LOG` wins when set
    pub log_filter: String,
    /// Emit JSON instead of pretty logs
    pub enable_json_logging: bool,
    /// Optional log file, rotated daily
    pub log_file: Option<String>,
    /// Environment (dev, staging, prod)
    pub environment: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "esim-host".to_string(),
            log_filter: "info,esim=debug".to_string(),
            enable_json_logging: false,
            log_file: None,
            environment: "dev".to_string(),
        }
    }
}

/// Initialize monitoring system
pub fn init(config: &MonitoringConfig) -> anyhow::Result<()> {
    logging::init_logging(config)?;
    info!(environment = %config.environment, "Monitoring initialized");
    Ok(())
}

/// Shutdown the monitoring system
pub fn shutdown() {
    info!("Shutting down monitoring system");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "esim-host");
        assert_eq!(config.log_filter, "info,esim=debug");
        assert!(!config.enable_json_logging);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = MonitoringConfig {
            log_file: Some("/tmp/esim.log".to_string()),
            ..MonitoringConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MonitoringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}

// Exported types
pub use crate::logging::{init_logging, LogExt};
pub use crate::metrics::ProvisioningMetrics;
