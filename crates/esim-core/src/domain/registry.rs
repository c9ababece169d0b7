use crate::domain::request::{CorrelationId, RoutingKey};
use crate::domain::state::ProvisioningState;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry record of one in-flight request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Caller-supplied correlation id
    pub correlation_id: Option<CorrelationId>,

    /// Internal routing key, unique per submission
    pub routing_key: RoutingKey,

    /// Current lifecycle state
    pub state: ProvisioningState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

/// Proof of ownership over a registry entry.
///
/// The routing key doubles as an epoch: once the entry is retired or torn
/// down, a stale handle can no longer touch an entry created later for the
/// same correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryHandle {
    routing_key: RoutingKey,
    correlation_id: Option<CorrelationId>,
}

impl RegistryHandle {
    /// Routing key of the owned entry
    pub fn routing_key(&self) -> RoutingKey {
        self.routing_key
    }

    /// Correlation id of the owned entry
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<RoutingKey, RegistryEntry>,
    by_correlation: HashMap<CorrelationId, RoutingKey>,
}

/// The single shared mutable structure of the coordinator.
///
/// Every mutation happens behind one mutex. Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct CorrelationRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl CorrelationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-flight request.
    ///
    /// Fails with `AlreadyInFlight` while another request holds the same
    /// correlation id. Requests without a correlation id always register but
    /// their events cannot be attributed to a caller.
    pub fn begin(
        &self,
        correlation_id: Option<&CorrelationId>,
    ) -> Result<RegistryHandle, RegistryError> {
        if let Some(id) = correlation_id {
            if !id.is_well_formed() {
                return Err(RegistryError::MalformedCorrelationId);
            }
        }

        let mut inner = self.inner.lock();

        if let Some(id) = correlation_id {
            if inner.by_correlation.contains_key(id) {
                warn!(correlation_id = %id, "Rejecting duplicate correlation id");
                return Err(RegistryError::AlreadyInFlight(id.clone()));
            }
        } else {
            warn!("Registering request without a correlation id; its events cannot be attributed");
        }

        let routing_key = RoutingKey::generate();
        let now = Utc::now();
        inner.entries.insert(
            routing_key,
            RegistryEntry {
                correlation_id: correlation_id.cloned(),
                routing_key,
                state: ProvisioningState::Submitted,
                created_at: now,
                updated_at: now,
            },
        );
        if let Some(id) = correlation_id {
            inner.by_correlation.insert(id.clone(), routing_key);
        }

        debug!(correlation_id = ?correlation_id, %routing_key, "Registered in-flight request");

        Ok(RegistryHandle {
            routing_key,
            correlation_id: correlation_id.cloned(),
        })
    }

    /// Move the owned entry to `next`, returning its previous state
    pub fn advance(
        &self,
        handle: &RegistryHandle,
        next: ProvisioningState,
    ) -> Result<ProvisioningState, RegistryError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&handle.routing_key)
            .ok_or(RegistryError::NotInFlight(handle.routing_key))?;

        if entry.state == next {
            return Ok(next);
        }
        if !entry.state.can_transition_to(&next) {
            return Err(RegistryError::InvalidTransition {
                from: entry.state,
                to: next,
            });
        }

        let previous = entry.state;
        entry.state = next;
        entry.updated_at = Utc::now();
        debug!(
            correlation_id = ?entry.correlation_id,
            from = ?previous,
            to = ?next,
            "Registry entry advanced"
        );
        Ok(previous)
    }

    /// Retire the owned entry. Idempotent; returns whether anything was removed.
    pub fn end(&self, handle: &RegistryHandle) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.remove(&handle.routing_key) else {
            return false;
        };

        if let Some(id) = &entry.correlation_id {
            if inner.by_correlation.get(id) == Some(&handle.routing_key) {
                inner.by_correlation.remove(id);
            }
        }

        debug!(correlation_id = ?entry.correlation_id, state = ?entry.state, "Registry entry retired");
        true
    }

    /// Move the owned entry to its terminal state and retire it in one step.
    ///
    /// `on_retire` runs while the registry lock is held, so it is never
    /// interleaved with [`CorrelationRegistry::teardown_all`]. It must not
    /// call back into the registry. When the entry has been abandoned the
    /// callback is not run.
    pub fn retire<F>(
        &self,
        handle: &RegistryHandle,
        terminal: ProvisioningState,
        on_retire: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(),
    {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get(&handle.routing_key)
            .ok_or(RegistryError::NotInFlight(handle.routing_key))?;

        if entry.state != terminal && !entry.state.can_transition_to(&terminal) {
            return Err(RegistryError::InvalidTransition {
                from: entry.state,
                to: terminal,
            });
        }

        on_retire();

        if let Some(entry) = inner.entries.remove(&handle.routing_key) {
            if let Some(id) = &entry.correlation_id {
                if inner.by_correlation.get(id) == Some(&handle.routing_key) {
                    inner.by_correlation.remove(id);
                }
            }
            debug!(correlation_id = ?entry.correlation_id, state = ?terminal, "Registry entry retired");
        }
        Ok(())
    }

    /// Abandon every in-flight entry without emitting events
    pub fn teardown_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let abandoned = inner.entries.len();
        inner.entries.clear();
        inner.by_correlation.clear();

        if abandoned > 0 {
            info!(abandoned, "Abandoned in-flight provisioning requests");
        }
        abandoned
    }

    /// State of the owned entry, if it is still registered
    pub fn state_of(&self, handle: &RegistryHandle) -> Option<ProvisioningState> {
        self.inner
            .lock()
            .entries
            .get(&handle.routing_key)
            .map(|entry| entry.state)
    }

    /// Look up the in-flight entry for a correlation id
    pub fn lookup(&self, correlation_id: &CorrelationId) -> Option<RegistryEntry> {
        let inner = self.inner.lock();
        inner
            .by_correlation
            .get(correlation_id)
            .and_then(|key| inner.entries.get(key))
            .cloned()
    }

    /// Whether a request with this correlation id is in flight
    pub fn is_in_flight(&self, correlation_id: &CorrelationId) -> bool {
        self.inner.lock().by_correlation.contains_key(correlation_id)
    }

    /// Copy of every in-flight entry
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }

    /// Number of in-flight entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
