use crate::application::capability::{CapabilityAdapter, OutcomeStream};
use crate::application::event_bridge::EventBridge;
use crate::domain::events::ProvisioningEvent;
use crate::domain::registry::{CorrelationRegistry, RegistryHandle};
use crate::domain::request::ProvisioningRequest;
use crate::domain::state_machine::{Directive, ProvisioningStateMachine, RESOLUTION_FAILED_REASON};
use crate::error::AdapterError;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

/// Async driver for one request.
///
/// Feeds adapter signals into the state machine, mirrors every transition
/// into the registry and emits the terminal event. A registry refusal means
/// the entry was abandoned by teardown, and the run stops without emitting.
pub(crate) struct ProvisioningRun {
    handle: RegistryHandle,
    request: Arc<ProvisioningRequest>,
    machine: ProvisioningStateMachine,
    adapter: Arc<dyn CapabilityAdapter>,
    registry: CorrelationRegistry,
    bridge: EventBridge,
}

impl ProvisioningRun {
    pub(crate) fn new(
        handle: RegistryHandle,
        request: Arc<ProvisioningRequest>,
        adapter: Arc<dyn CapabilityAdapter>,
        registry: CorrelationRegistry,
        bridge: EventBridge,
    ) -> Self {
        let machine = ProvisioningStateMachine::new(request.correlation_id.clone());
        Self {
            handle,
            request,
            machine,
            adapter,
            registry,
            bridge,
        }
    }

    /// Submit to the adapter and, on success, spawn the completion loop
    pub(crate) async fn start(mut self) {
        let submitted = self
            .adapter
            .submit(self.handle.routing_key(), self.request.clone())
            .await;

        match submitted {
            Ok(outcomes) => {
                if let Err(e) = self.machine.mark_submitted() {
                    error!(error = %e, "Submission confirmed twice");
                    return;
                }
                if !self.sync_registry() {
                    return;
                }
                tokio::spawn(self.drive(outcomes));
            }
            Err(err) => {
                error!(
                    correlation_id = ?self.request.correlation_id,
                    error = %err,
                    "Adapter refused submission"
                );
                let directive = self.machine.on_platform_failure(Some(err.to_string()));
                self.execute(directive).await;
            }
        }
    }

    async fn drive(mut self, mut outcomes: OutcomeStream) {
        loop {
            let directive = match outcomes.next().await {
                Some(outcome) => {
                    debug!(
                        correlation_id = ?self.request.correlation_id,
                        outcome = outcome.kind(),
                        state = ?self.machine.state(),
                        "Completion signal received"
                    );
                    self.machine.on_outcome(outcome)
                }
                None => self.machine.on_stream_closed(),
            };

            if self.execute(directive).await == Flow::Finished {
                break;
            }
        }
    }

    async fn execute(&mut self, mut directive: Directive) -> Flow {
        loop {
            match directive {
                Directive::Resolve(token) => {
                    if !self.sync_registry() {
                        return Flow::Finished;
                    }

                    match self
                        .adapter
                        .resolve(self.handle.routing_key(), self.request.clone(), token)
                        .await
                    {
                        Ok(()) => {
                            if let Err(e) = self.machine.on_resolution_started() {
                                error!(error = %e, "Resolution started from an unexpected state");
                                return Flow::Finished;
                            }
                            if !self.sync_registry() {
                                return Flow::Finished;
                            }
                            info!(
                                correlation_id = ?self.request.correlation_id,
                                "Awaiting resolution result"
                            );
                            return Flow::Continue;
                        }
                        Err(err) => {
                            error!(
                                correlation_id = ?self.request.correlation_id,
                                error = %err,
                                "Could not start resolution step"
                            );
                            let (reason, details) = resolution_failure(&err);
                            directive = self.machine.on_resolution_failed(reason, details);
                        }
                    }
                }
                Directive::Emit(event) => {
                    self.finish(event);
                    return Flow::Finished;
                }
                Directive::Discard => {
                    return if self.machine.state().is_terminal() {
                        Flow::Finished
                    } else {
                        Flow::Continue
                    };
                }
            }
        }
    }

    /// Terminal protocol: the emit decision and the retirement happen under
    /// the registry lock, so a concurrent teardown either abandons the entry
    /// first or detaches the consumer after the event was bound to it.
    fn finish(&mut self, event: ProvisioningEvent) {
        let bridge = &self.bridge;
        let retired = self
            .registry
            .retire(&self.handle, self.machine.state(), || {
                bridge.emit(event);
            });

        if let Err(e) = retired {
            warn!(
                correlation_id = ?self.request.correlation_id,
                error = %e,
                "Request no longer registered; discarding terminal event"
            );
        }
    }

    fn sync_registry(&self) -> bool {
        match self.registry.advance(&self.handle, self.machine.state()) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    correlation_id = ?self.request.correlation_id,
                    error = %e,
                    "Request no longer registered; discarding"
                );
                false
            }
        }
    }
}

fn resolution_failure(err: &AdapterError) -> (String, Option<String>) {
    match err {
        AdapterError::HostUnavailable(message) => (format!("Internal error: {}.", message), None),
        other => (RESOLUTION_FAILED_REASON.to_string(), Some(other.to_string())),
    }
}
