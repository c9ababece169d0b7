//! Process-wide, single-consumer sink for provisioning events.
//!
//! `send` never blocks: it captures the consumer generation that is attached
//! at call time and queues the event for one delivery task, which hands
//! events to the consumer in receipt order. An event queued for a consumer
//! that has since been detached or replaced is dropped.

use crate::domain::events::{EventBody, EventName, ProvisioningEvent};
use crate::domain::request::CorrelationId;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Receiver of provisioning events
pub trait EventConsumer: Send + Sync {
    /// Deliver one event
    fn deliver(&self, event: ProvisioningEvent);
}

impl<F> EventConsumer for F
where
    F: Fn(ProvisioningEvent) + Send + Sync,
{
    fn deliver(&self, event: ProvisioningEvent) {
        self(event)
    }
}

/// Consumer that forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<ProvisioningEvent>,
}

impl ChannelConsumer {
    /// Create a consumer and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProvisioningEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventConsumer for ChannelConsumer {
    fn deliver(&self, event: ProvisioningEvent) {
        if self.tx.send(event).is_err() {
            debug!("Channel consumer receiver dropped; event discarded");
        }
    }
}

enum BridgeMessage {
    Deliver {
        generation: u64,
        event: ProvisioningEvent,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct ConsumerSlot {
    generation: u64,
    consumer: Option<Arc<dyn EventConsumer>>,
}

/// Single-consumer broadcast sink with replace-on-attach semantics
#[derive(Clone)]
pub struct EventBridge {
    slot: Arc<Mutex<ConsumerSlot>>,
    queue: mpsc::UnboundedSender<BridgeMessage>,
}

impl EventBridge {
    /// Create a bridge and spawn its delivery task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn() -> Self {
        let slot = Arc::new(Mutex::new(ConsumerSlot::default()));
        let (queue, rx) = mpsc::unbounded_channel();

        tokio::spawn(delivery_loop(slot.clone(), rx));

        Self { slot, queue }
    }

    /// Attach a consumer, replacing any previous one
    pub fn attach(&self, consumer: Arc<dyn EventConsumer>) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        let replaced = slot.consumer.replace(consumer).is_some();
        info!(
            generation = slot.generation,
            replaced, "Event consumer attached"
        );
    }

    /// Detach the current consumer. Idempotent; returns whether one was attached.
    pub fn detach(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.consumer.take().is_some() {
            slot.generation += 1;
            info!(generation = slot.generation, "Event consumer detached");
            true
        } else {
            false
        }
    }

    /// Whether a consumer is attached right now
    pub fn is_attached(&self) -> bool {
        self.slot.lock().consumer.is_some()
    }

    /// Queue an event built from its parts
    pub fn send(
        &self,
        correlation_id: Option<CorrelationId>,
        event: EventName,
        body: EventBody,
    ) -> bool {
        self.emit(ProvisioningEvent::new(correlation_id, event, body))
    }

    /// Queue an event for delivery.
    ///
    /// Returns `false` when the event was dropped because no consumer is
    /// attached. Dropped events are never replayed.
    pub fn emit(&self, event: ProvisioningEvent) -> bool {
        if event.correlation_id.is_none() {
            warn!(event = %event.event, "Sending event without a correlation id");
        }

        let generation = {
            let slot = self.slot.lock();
            if slot.consumer.is_none() {
                warn!(
                    correlation_id = ?event.correlation_id,
                    event = %event.event,
                    "No event consumer attached; dropping event"
                );
                return false;
            }
            slot.generation
        };

        debug!(
            correlation_id = ?event.correlation_id,
            event = %event.event,
            generation,
            "Queued event for delivery"
        );

        if self
            .queue
            .send(BridgeMessage::Deliver { generation, event })
            .is_err()
        {
            error!("Event delivery task is gone; dropping event");
            return false;
        }
        true
    }

    /// Wait until every event queued before this call has been delivered or dropped
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.queue.send(BridgeMessage::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn delivery_loop(
    slot: Arc<Mutex<ConsumerSlot>>,
    mut rx: mpsc::UnboundedReceiver<BridgeMessage>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            BridgeMessage::Deliver { generation, event } => {
                let consumer = {
                    let slot = slot.lock();
                    if slot.generation == generation {
                        slot.consumer.clone()
                    } else {
                        None
                    }
                };

                let Some(consumer) = consumer else {
                    debug!(
                        correlation_id = ?event.correlation_id,
                        event = %event.event,
                        "Consumer changed since send; dropping event"
                    );
                    continue;
                };

                let correlation_id = event.correlation_id.clone();
                if catch_unwind(AssertUnwindSafe(|| consumer.deliver(event))).is_err() {
                    error!(correlation_id = ?correlation_id, "Event consumer panicked during delivery");
                }
            }
            BridgeMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Event delivery task stopped");
}
