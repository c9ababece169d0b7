use crate::application::capability::CapabilityAdapter;
use crate::application::dispatcher::RequestDispatcher;
use crate::application::event_bridge::{EventBridge, EventConsumer};
use crate::domain::registry::CorrelationRegistry;
use crate::domain::request::{CorrelationId, ProvisioningRequest};
use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Inbound method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name
    pub method: String,

    /// Arguments, expected to be a JSON object when present
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    /// Create a method call
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Response to a method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    /// The call succeeded
    Success {
        /// Returned value
        value: Value,
    },
    /// The call was rejected
    Error {
        /// Stable error code
        code: String,
        /// Human readable message
        message: String,
        /// Optional extra detail
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// No such method
    NotImplemented,
}

impl MethodResponse {
    /// Successful response
    pub fn success(value: Value) -> Self {
        MethodResponse::Success { value }
    }

    /// Error response
    pub fn error(code: impl Into<String>, message: impl Into<String>, details: Option<Value>) -> Self {
        MethodResponse::Error {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<DispatchError> for MethodResponse {
    fn from(err: DispatchError) -> Self {
        MethodResponse::error(err.code(), err.to_string(), None)
    }
}

/// Methods understood by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Capability probe
    CheckSupport,
    /// Start a provisioning request
    SubmitProvisioning,
    /// Installation walkthrough
    GetInstructions,
}

impl Method {
    /// Resolve a method name, accepting the legacy plugin names
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "checkSupport" | "isSupportESim" => Some(Method::CheckSupport),
            "submitProvisioning" | "installEsimProfile" => Some(Method::SubmitProvisioning),
            "getInstructions" | "instructions" => Some(Method::GetInstructions),
            _ => None,
        }
    }
}

/// The API the coordinator exposes to its transport
#[derive(Clone)]
pub struct RuntimeInterface {
    dispatcher: RequestDispatcher,
}

impl RuntimeInterface {
    /// Create a runtime interface over an existing dispatcher
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Wire a registry and an event bridge around `adapter`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_adapter(adapter: Arc<dyn CapabilityAdapter>) -> Self {
        Self::new(RequestDispatcher::new(
            adapter,
            CorrelationRegistry::new(),
            EventBridge::spawn(),
        ))
    }

    /// Handle one method call
    pub async fn handle(&self, call: MethodCall) -> MethodResponse {
        debug!(method = %call.method, "Handling method call");

        match Method::from_name(&call.method) {
            Some(Method::CheckSupport) => {
                MethodResponse::success(Value::Bool(self.dispatcher.check_support()))
            }
            Some(Method::SubmitProvisioning) => match parse_request(&call.arguments) {
                Ok(request) => match self.dispatcher.submit_provisioning(request).await {
                    Ok(()) => MethodResponse::success(Value::Null),
                    Err(e) => e.into(),
                },
                Err(e) => {
                    warn!(error = %e, "Rejecting malformed provisioning arguments");
                    e.into()
                }
            },
            Some(Method::GetInstructions) => {
                MethodResponse::success(json!(self.dispatcher.instructions()))
            }
            None => {
                debug!(method = %call.method, "Method not implemented");
                MethodResponse::NotImplemented
            }
        }
    }

    /// Attach the event consumer, replacing any previous one
    pub fn attach(&self, consumer: Arc<dyn EventConsumer>) {
        self.dispatcher.bridge().attach(consumer);
    }

    /// Detach the event consumer
    pub fn detach(&self) -> bool {
        self.dispatcher.bridge().detach()
    }

    /// Abandon in-flight requests and release platform registrations. Idempotent.
    pub fn teardown(&self) -> usize {
        self.dispatcher.teardown()
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }
}

fn parse_request(arguments: &Value) -> Result<ProvisioningRequest, DispatchError> {
    let args = match arguments {
        Value::Object(map) => map,
        _ => {
            return Err(DispatchError::InvalidArgument(
                "Expected a map of arguments for submitProvisioning.".to_string(),
            ))
        }
    };

    Ok(ProvisioningRequest {
        address: optional_string(args, &["address", "profile"])?.unwrap_or_default(),
        matching_id: optional_string(args, &["matchingId", "matchingID"])?,
        oid: optional_string(args, &["oid"])?,
        confirmation_code: optional_string(args, &["confirmationCode"])?,
        iccid: optional_string(args, &["iccid"])?,
        eid: optional_string(args, &["eid"])?,
        correlation_id: optional_string(args, &["correlationId"])?.map(CorrelationId),
    })
}

fn optional_string(
    args: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<String>, DispatchError> {
    for key in keys {
        match args.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(value)) => return Ok(Some(value.clone())),
            Some(other) => {
                return Err(DispatchError::InvalidArgument(format!(
                    "Field '{}' must be a string, got {}",
                    key, other
                )))
            }
        }
    }
    Ok(None)
}
