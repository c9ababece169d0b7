use esim_core::{PlanCompletion, PlanProvisioningPlatform, PlanRequest, PlanResult, PlatformError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// How the simulated platform answers an `add_plan` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReply {
    /// Call the completion right away with this result
    Complete(PlanResult),
    /// Keep the completion until a test finishes it
    Hold,
    /// Drop the completion without calling it
    Drop,
}

/// Scriptable in-memory stand-in for a closure-completion platform
pub struct SimulatedPlanPlatform {
    os_major_version: Mutex<u32>,
    supports_cellular_plan: Mutex<bool>,
    replies: Mutex<VecDeque<PlanReply>>,
    default_reply: Mutex<PlanReply>,
    failure: Mutex<Option<String>>,
    held: Mutex<VecDeque<PlanCompletion>>,
    requests: Mutex<Vec<PlanRequest>>,
}

impl Default for SimulatedPlanPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlanPlatform {
    /// A capable device that completes every plan successfully
    pub fn new() -> Self {
        Self {
            os_major_version: Mutex::new(17),
            supports_cellular_plan: Mutex::new(true),
            replies: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(PlanReply::Complete(PlanResult::Success)),
            failure: Mutex::new(None),
            held: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the reported OS major version
    pub fn set_os_major_version(&self, version: u32) {
        *self.os_major_version.lock() = version;
    }

    /// Set whether the device can provision cellular plans
    pub fn set_supports_cellular_plan(&self, supported: bool) {
        *self.supports_cellular_plan.lock() = supported;
    }

    /// Reply used once the queue is empty
    pub fn reply_with(&self, reply: PlanReply) {
        *self.default_reply.lock() = reply;
    }

    /// Reply for the next call only
    pub fn queue_reply(&self, reply: PlanReply) {
        self.replies.lock().push_back(reply);
    }

    /// Make the next `add_plan` call fail
    pub fn fail_next_add_plan(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Finish the oldest held completion
    pub fn complete_next(&self, result: PlanResult) -> bool {
        let completion = self.held.lock().pop_front();
        match completion {
            Some(completion) => {
                completion(result);
                true
            }
            None => false,
        }
    }

    /// Drop every held completion without calling it
    pub fn drop_held(&self) -> usize {
        let mut held = self.held.lock();
        let count = held.len();
        held.clear();
        count
    }

    /// Number of held completions
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Every request handed to `add_plan`
    pub fn requests(&self) -> Vec<PlanRequest> {
        self.requests.lock().clone()
    }
}

impl PlanProvisioningPlatform for SimulatedPlanPlatform {
    fn os_major_version(&self) -> u32 {
        *self.os_major_version.lock()
    }

    fn supports_cellular_plan(&self) -> bool {
        *self.supports_cellular_plan.lock()
    }

    fn add_plan(
        &self,
        request: PlanRequest,
        completion: PlanCompletion,
    ) -> Result<(), PlatformError> {
        debug!(address = %request.address, "Simulated add_plan");
        self.requests.lock().push(request);

        let failure = self.failure.lock().take();
        if let Some(message) = failure {
            return Err(PlatformError::new(message));
        }

        let queued = self.replies.lock().pop_front();
        let reply = queued.unwrap_or_else(|| *self.default_reply.lock());
        match reply {
            PlanReply::Complete(result) => completion(result),
            PlanReply::Hold => self.held.lock().push_back(completion),
            PlanReply::Drop => drop(completion),
        }
        Ok(())
    }
}
