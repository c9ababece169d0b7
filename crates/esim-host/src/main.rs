use anyhow::{Context, Result};
use esim_host::config::{parse_flag, HostConfig};
use esim_monitoring::{LogExt, MonitoringConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging first so configuration warnings are visible
    let defaults = MonitoringConfig::default();
    let monitoring_config = MonitoringConfig {
        log_filter: std::env::var("LOG_FILTER").unwrap_or(defaults.log_filter),
        enable_json_logging: std::env::var("LOG_JSON")
            .ok()
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(defaults.enable_json_logging),
        log_file: std::env::var("LOG_FILE").ok(),
        environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        service_name: defaults.service_name,
    };

    esim_monitoring::init(&monitoring_config).context("Failed to initialize monitoring")?;

    let config = HostConfig::load()
        .log_err("Host configuration rejected")
        .context("Failed to load configuration")?;

    esim_host::run(config).await.context("Host error")?;

    esim_monitoring::shutdown();
    Ok(())
}
