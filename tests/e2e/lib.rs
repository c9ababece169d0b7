// eSIM E2E Tests
//
// Scenario tests that run the coordinator against the simulated platforms

/// Shared harness for the scenario tests
pub mod utils {
    use esim_core::{
        ChannelConsumer, MethodCall, MethodResponse, ProvisioningConfig, ProvisioningEvent,
        RuntimeInterface,
    };
    use esim_platform_memory::{
        SimulatedBroadcastPlatform, SimulatedPlanPlatform, SimulatedPlatformProvider,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Upper bound on how long a scenario waits for in-flight requests
    pub const SETTLE_TIMEOUT_MS: u64 = 2000;

    /// Runtime over `platform` using the broadcast variant
    pub fn broadcast_runtime(platform: Arc<SimulatedBroadcastPlatform>) -> RuntimeInterface {
        let provider = SimulatedPlatformProvider::new(ProvisioningConfig::default());
        RuntimeInterface::with_adapter(provider.broadcast_adapter(platform))
    }

    /// Runtime over `platform` using the closure variant
    pub fn closure_runtime(platform: Arc<SimulatedPlanPlatform>) -> RuntimeInterface {
        let provider = SimulatedPlatformProvider::new(ProvisioningConfig::default());
        RuntimeInterface::with_adapter(provider.closure_adapter(platform))
    }

    /// A runtime with a channel consumer attached
    pub struct Harness {
        /// The runtime under test
        pub runtime: RuntimeInterface,
        /// Events delivered to the attached consumer
        pub events: UnboundedReceiver<ProvisioningEvent>,
    }

    impl Harness {
        /// Attach a fresh channel consumer to `runtime`
        pub fn attach(runtime: RuntimeInterface) -> Self {
            let (consumer, events) = ChannelConsumer::new();
            runtime.attach(Arc::new(consumer));
            Self { runtime, events }
        }

        /// Issue a method call
        pub async fn call(&self, method: &str, arguments: Value) -> MethodResponse {
            self.runtime
                .handle(MethodCall::new(method, arguments))
                .await
        }

        /// Issue `submitProvisioning`
        pub async fn submit(&self, arguments: Value) -> MethodResponse {
            self.call("submitProvisioning", arguments).await
        }

        /// Wait for every in-flight request to retire, then flush the bridge
        pub async fn settle(&self) {
            let registry = self.runtime.dispatcher().registry();
            let _ = tokio::time::timeout(Duration::from_millis(SETTLE_TIMEOUT_MS), async {
                while !registry.is_empty() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await;
            self.quiesce().await;
        }

        /// Let spawned work run, then flush the bridge
        pub async fn quiesce(&self) {
            for _ in 0..20 {
                tokio::task::yield_now().await;
            }
            self.runtime.dispatcher().bridge().flush().await;
        }

        /// Every event delivered so far
        pub fn drain_events(&mut self) -> Vec<ProvisioningEvent> {
            let mut drained = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                drained.push(event);
            }
            drained
        }
    }
}
