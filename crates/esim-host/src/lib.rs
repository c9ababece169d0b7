//! eSIM provisioning host
//!
//! Wires the provisioning coordinator to a simulated platform and serves it
//! over a JSON-lines protocol on stdin/stdout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use esim_core::RuntimeInterface;
use esim_monitoring::{LogExt, ProvisioningMetrics};
use esim_platform_memory::SimulatedPlatformProvider;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

pub mod config;
pub mod error;
pub mod transport;

use crate::config::{HostConfig, PlatformKind};
use crate::error::HostResult;

/// Build a runtime interface over the configured simulated platform.
///
/// Must be called from within a Tokio runtime.
pub fn build_runtime(config: &HostConfig) -> RuntimeInterface {
    let provider = SimulatedPlatformProvider::new(config.provisioning_config());

    let adapter = match config.platform {
        PlatformKind::Broadcast => {
            let platform = SimulatedPlatformProvider::scripted_broadcast_platform(
                config.simulated_result,
            );
            platform.set_platform_version(config.platform_version);
            platform.set_enabled(config.esim_enabled);
            provider.broadcast_adapter(Arc::new(platform))
        }
        PlatformKind::Closure => {
            let platform =
                SimulatedPlatformProvider::scripted_plan_platform(config.simulated_result);
            platform.set_os_major_version(config.platform_version);
            platform.set_supports_cellular_plan(config.esim_enabled);
            provider.closure_adapter(Arc::new(platform))
        }
    };

    info!(platform = %config.platform, "Runtime created");
    RuntimeInterface::with_adapter(adapter)
}

/// Run the host until end of input or an interrupt
pub async fn run(config: HostConfig) -> HostResult<()> {
    let runtime = build_runtime(&config);
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = transport::serve(&runtime, stdin, stdout, config.shutdown_grace()) => {
            result
                .log_err("Transport stopped with an error")
                .log_ok("Transport drained and torn down")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            let abandoned = runtime.teardown();
            ProvisioningMetrics::record_teardown(abandoned);
        }
    }

    Ok(())
}
