use serde::{Deserialize, Serialize};

/// Adapter tuning shared by both platform variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Action name of the result broadcast
    #[serde(default = "default_broadcast_action")]
    pub broadcast_action: String,

    /// Minimum platform version for the broadcast variant
    #[serde(default = "default_min_platform_version")]
    pub min_platform_version: u32,

    /// Minimum OS major version for the closure variant
    #[serde(default = "default_min_os_version")]
    pub min_os_version: u32,
}

fn default_broadcast_action() -> String {
    "esim.action.DOWNLOAD_SUBSCRIPTION".to_string()
}

fn default_min_platform_version() -> u32 {
    28
}

fn default_min_os_version() -> u32 {
    12
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            broadcast_action: default_broadcast_action(),
            min_platform_version: default_min_platform_version(),
            min_os_version: default_min_os_version(),
        }
    }
}
