//! Adapter for platforms that report completion by redelivering a system
//! broadcast to a registered receiver.
//!
//! One receiver serves every submission. Each submission puts its routing
//! key into the callback extras, and the receiver uses it to pick the
//! submission's outcome channel. The resolution step reuses the same
//! callback shape, so its follow-up signal lands on the same channel.

use crate::application::capability::{CapabilityAdapter, OutcomeStream};
use crate::config::ProvisioningConfig;
use crate::domain::outcome::{CapabilitySupport, CompletionOutcome};
use crate::domain::request::{CorrelationId, ProvisioningRequest, ResolutionToken, RoutingKey};
use crate::error::{AdapterError, AdapterKind, PlatformError};
use crate::instructions::BROADCAST_INSTRUCTIONS;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result code: operation completed
pub const RESULT_OK: i32 = 0;
/// Result code: a user interaction step can resolve the error
pub const RESULT_RESOLVABLE_ERROR: i32 = 1;
/// Result code: operation failed
pub const RESULT_ERROR: i32 = 2;

/// Extra carrying the caller's correlation id
pub const EXTRA_CORRELATION_ID: &str = "correlationId";
/// Extra carrying the submission's routing key
pub const EXTRA_ROUTING_KEY: &str = "routingKey";
/// Extra carrying the platform's detailed error code
pub const EXTRA_DETAILED_CODE: &str = "detailedCode";

/// Callback the platform broadcasts back once an operation finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackIntent {
    /// Broadcast action
    pub action: String,
    /// Extras echoed back in the broadcast
    pub extras: HashMap<String, String>,
}

/// A broadcast redelivered by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// Broadcast action
    pub action: String,
    /// Platform result code
    pub result_code: i32,
    /// Extras: the callback extras plus anything the platform added
    pub extras: HashMap<String, String>,
    /// Resolution data attached to a resolvable error
    pub resolution: Option<ResolutionToken>,
}

impl Broadcast {
    /// Build the broadcast answering `callback`
    pub fn answering(callback: &CallbackIntent, result_code: i32) -> Self {
        Self {
            action: callback.action.clone(),
            result_code,
            extras: callback.extras.clone(),
            resolution: None,
        }
    }
}

/// Receiver of redelivered broadcasts
pub trait BroadcastReceiver: Send + Sync {
    /// Handle one broadcast
    fn on_receive(&self, broadcast: Broadcast);
}

/// The platform primitive behind the broadcast variant
pub trait BroadcastPlatform: Send + Sync {
    /// Platform version
    fn platform_version(&self) -> u32;

    /// Whether an eSIM manager exists on this device
    fn manager_available(&self) -> bool;

    /// Whether eSIM is enabled in settings
    fn is_enabled(&self) -> bool;

    /// Whether a host activity is attached to run user interaction steps
    fn host_available(&self) -> bool;

    /// Register the receiver for `action`
    fn register_receiver(
        &self,
        action: &str,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<(), PlatformError>;

    /// Unregister the receiver for `action`
    fn unregister_receiver(&self, action: &str) -> Result<(), PlatformError>;

    /// Begin downloading the profile behind `activation_code`
    fn begin_download(
        &self,
        activation_code: &str,
        callback: CallbackIntent,
    ) -> Result<(), PlatformError>;

    /// Start the resolution step for a resolvable error
    fn start_resolution(
        &self,
        token: &ResolutionToken,
        callback: CallbackIntent,
    ) -> Result<(), PlatformError>;
}

/// Routes redelivered broadcasts to the outcome channel of their submission
struct BroadcastRouter {
    action: String,
    routes: Mutex<HashMap<RoutingKey, mpsc::UnboundedSender<CompletionOutcome>>>,
}

impl BroadcastRouter {
    fn new(action: String) -> Self {
        Self {
            action,
            routes: Mutex::new(HashMap::new()),
        }
    }

    fn open(&self, routing_key: RoutingKey) -> mpsc::UnboundedReceiver<CompletionOutcome> {
        let (tx, rx) = mpsc::unbounded();
        let mut routes = self.routes.lock();
        routes.retain(|_, route| !route.is_closed());
        routes.insert(routing_key, tx);
        rx
    }

    fn close(&self, routing_key: &RoutingKey) {
        self.routes.lock().remove(routing_key);
    }

    fn is_open(&self, routing_key: &RoutingKey) -> bool {
        self.routes
            .lock()
            .get(routing_key)
            .map(|route| !route.is_closed())
            .unwrap_or(false)
    }

    fn close_all(&self) -> usize {
        let mut routes = self.routes.lock();
        let count = routes.len();
        routes.clear();
        count
    }
}

impl BroadcastReceiver for BroadcastRouter {
    fn on_receive(&self, broadcast: Broadcast) {
        if broadcast.action != self.action {
            warn!(action = %broadcast.action, "Ignoring broadcast with unexpected action");
            return;
        }

        let correlation_id = broadcast.extras.get(EXTRA_CORRELATION_ID).cloned();
        let Some(routing_key) = broadcast
            .extras
            .get(EXTRA_ROUTING_KEY)
            .and_then(|raw| RoutingKey::parse(raw))
        else {
            warn!(correlation_id = ?correlation_id, "Broadcast without a routing key; discarding");
            return;
        };

        let outcome = outcome_from_broadcast(&broadcast);
        debug!(
            correlation_id = ?correlation_id,
            %routing_key,
            result_code = broadcast.result_code,
            outcome = outcome.kind(),
            "Received result broadcast"
        );

        let terminal = !outcome.is_resolvable();
        let mut routes = self.routes.lock();
        let delivered = match routes.get(&routing_key) {
            Some(route) => route.unbounded_send(outcome).is_ok(),
            None => false,
        };
        if !delivered {
            warn!(
                correlation_id = ?correlation_id,
                %routing_key,
                "No in-flight submission for broadcast; discarding"
            );
        }
        if terminal || !delivered {
            routes.remove(&routing_key);
        }
    }
}

/// Normalize a platform result broadcast into a completion outcome
pub fn outcome_from_broadcast(broadcast: &Broadcast) -> CompletionOutcome {
    match broadcast.result_code {
        RESULT_OK => CompletionOutcome::Success,
        RESULT_RESOLVABLE_ERROR => match &broadcast.resolution {
            Some(token) => CompletionOutcome::ResolvableError {
                token: token.clone(),
            },
            None => CompletionOutcome::Unknown {
                result_code: Some(i64::from(RESULT_RESOLVABLE_ERROR)),
                reason: Some("Resolvable error without resolution data.".to_string()),
            },
        },
        RESULT_ERROR => {
            let detailed = broadcast
                .extras
                .get(EXTRA_DETAILED_CODE)
                .and_then(|raw| raw.parse::<i64>().ok());
            CompletionOutcome::Fail {
                error_code: Some(detailed.unwrap_or(i64::from(RESULT_ERROR))),
            }
        }
        other => CompletionOutcome::Unknown {
            result_code: Some(i64::from(other)),
            reason: None,
        },
    }
}

/// Capability adapter over a [`BroadcastPlatform`]
pub struct BroadcastAdapter {
    platform: Arc<dyn BroadcastPlatform>,
    router: Arc<BroadcastRouter>,
    min_platform_version: u32,
    receiver_registered: Mutex<bool>,
}

impl BroadcastAdapter {
    /// Create an adapter over `platform`
    pub fn new(platform: Arc<dyn BroadcastPlatform>, config: &ProvisioningConfig) -> Self {
        Self {
            platform,
            router: Arc::new(BroadcastRouter::new(config.broadcast_action.clone())),
            min_platform_version: config.min_platform_version,
            receiver_registered: Mutex::new(false),
        }
    }

    /// Whether the result receiver is currently registered
    pub fn receiver_registered(&self) -> bool {
        *self.receiver_registered.lock()
    }

    fn ensure_receiver(&self) -> Result<(), AdapterError> {
        let mut registered = self.receiver_registered.lock();
        if *registered {
            return Ok(());
        }
        self.platform
            .register_receiver(&self.router.action, self.router.clone())
            .map_err(|e| AdapterError::ReceiverUnavailable(e.0))?;
        *registered = true;
        debug!(action = %self.router.action, "Registered result receiver");
        Ok(())
    }

    fn callback_for(
        &self,
        routing_key: RoutingKey,
        correlation_id: Option<&CorrelationId>,
    ) -> CallbackIntent {
        let mut extras = HashMap::new();
        extras.insert(EXTRA_ROUTING_KEY.to_string(), routing_key.to_string());
        if let Some(id) = correlation_id {
            extras.insert(EXTRA_CORRELATION_ID.to_string(), id.0.clone());
        }
        CallbackIntent {
            action: self.router.action.clone(),
            extras,
        }
    }
}

#[async_trait]
impl CapabilityAdapter for BroadcastAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Broadcast
    }

    fn support(&self) -> CapabilitySupport {
        if self.platform.platform_version() < self.min_platform_version {
            return CapabilitySupport::unsupported(format!(
                "eSIM functionality requires platform version {} or newer.",
                self.min_platform_version
            ));
        }
        if !self.platform.manager_available() {
            return CapabilitySupport::unsupported("eSIM manager not available on this device.");
        }
        if !self.platform.is_enabled() {
            return CapabilitySupport::unsupported("eSIM is disabled in settings.");
        }
        CapabilitySupport::Supported
    }

    async fn submit(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
    ) -> Result<OutcomeStream, AdapterError> {
        self.ensure_receiver()?;

        let outcomes = self.router.open(routing_key);
        let callback = self.callback_for(routing_key, request.correlation_id.as_ref());

        if let Err(e) = self.platform.begin_download(&request.address, callback) {
            self.router.close(&routing_key);
            return Err(e.into());
        }

        info!(
            correlation_id = ?request.correlation_id,
            %routing_key,
            "Profile download started"
        );
        Ok(outcomes.boxed())
    }

    async fn resolve(
        &self,
        routing_key: RoutingKey,
        request: Arc<ProvisioningRequest>,
        token: ResolutionToken,
    ) -> Result<(), AdapterError> {
        if !self.platform.host_available() {
            return Err(AdapterError::HostUnavailable(
                "host activity not available to handle resolvable error".to_string(),
            ));
        }
        if !self.router.is_open(&routing_key) {
            return Err(AdapterError::UnknownRoute(routing_key));
        }

        let callback = self.callback_for(routing_key, request.correlation_id.as_ref());
        self.platform.start_resolution(&token, callback)?;

        info!(
            correlation_id = ?request.correlation_id,
            %routing_key,
            "Resolution step started"
        );
        Ok(())
    }

    fn instructions(&self) -> &'static str {
        BROADCAST_INSTRUCTIONS
    }

    fn teardown(&self) {
        let mut registered = self.receiver_registered.lock();
        if *registered {
            if let Err(e) = self.platform.unregister_receiver(&self.router.action) {
                warn!(error = %e, "Result receiver was already unregistered");
            }
            *registered = false;
        }
        let abandoned = self.router.close_all();
        debug!(abandoned, "Broadcast adapter torn down");
    }
}
