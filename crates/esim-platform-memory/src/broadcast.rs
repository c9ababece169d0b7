use esim_core::application::adapters::broadcast::{
    EXTRA_CORRELATION_ID, EXTRA_DETAILED_CODE, RESULT_ERROR, RESULT_OK, RESULT_RESOLVABLE_ERROR,
};
use esim_core::{
    Broadcast, BroadcastPlatform, BroadcastReceiver, CallbackIntent, PlatformError,
    ResolutionToken,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// How the simulated platform answers a download or resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastReply {
    /// Broadcast `RESULT_OK`
    Ok,
    /// Broadcast `RESULT_ERROR`, optionally with a detailed code extra
    Error {
        /// Detailed error code
        detailed_code: Option<i64>,
    },
    /// Broadcast `RESULT_RESOLVABLE_ERROR` with resolution data
    Resolvable {
        /// Resolution token carried by the broadcast
        token: ResolutionToken,
    },
    /// Broadcast an arbitrary result code
    Code(i32),
    /// Keep the callback until a test releases it
    Hold,
}

/// Call recorded by a simulated platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// Receiver registered for an action
    RegisterReceiver {
        /// Broadcast action
        action: String,
    },
    /// Receiver unregistered for an action
    UnregisterReceiver {
        /// Broadcast action
        action: String,
    },
    /// Download started
    BeginDownload {
        /// Activation code handed to the platform
        activation_code: String,
        /// Correlation id carried in the callback
        correlation_id: Option<String>,
    },
    /// Resolution step started
    StartResolution {
        /// Resolution token
        token: ResolutionToken,
        /// Correlation id carried in the callback
        correlation_id: Option<String>,
    },
}

#[derive(Debug)]
struct DeviceState {
    platform_version: u32,
    manager_available: bool,
    enabled: bool,
    host_available: bool,
}

/// Scriptable in-memory stand-in for a broadcast-completion platform
pub struct SimulatedBroadcastPlatform {
    device: Mutex<DeviceState>,
    receivers: Mutex<HashMap<String, Arc<dyn BroadcastReceiver>>>,
    download_replies: Mutex<VecDeque<BroadcastReply>>,
    default_download_reply: Mutex<BroadcastReply>,
    resolution_replies: Mutex<VecDeque<BroadcastReply>>,
    default_resolution_reply: Mutex<BroadcastReply>,
    download_failure: Mutex<Option<String>>,
    resolution_failure: Mutex<Option<String>>,
    held: Mutex<Vec<CallbackIntent>>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl Default for SimulatedBroadcastPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBroadcastPlatform {
    /// A capable device that answers every request with `RESULT_OK`
    pub fn new() -> Self {
        Self {
            device: Mutex::new(DeviceState {
                platform_version: 34,
                manager_available: true,
                enabled: true,
                host_available: true,
            }),
            receivers: Mutex::new(HashMap::new()),
            download_replies: Mutex::new(VecDeque::new()),
            default_download_reply: Mutex::new(BroadcastReply::Ok),
            resolution_replies: Mutex::new(VecDeque::new()),
            default_resolution_reply: Mutex::new(BroadcastReply::Ok),
            download_failure: Mutex::new(None),
            resolution_failure: Mutex::new(None),
            held: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the reported platform version
    pub fn set_platform_version(&self, version: u32) {
        self.device.lock().platform_version = version;
    }

    /// Set whether an eSIM manager exists
    pub fn set_manager_available(&self, available: bool) {
        self.device.lock().manager_available = available;
    }

    /// Set whether eSIM is enabled
    pub fn set_enabled(&self, enabled: bool) {
        self.device.lock().enabled = enabled;
    }

    /// Set whether a host activity is attached
    pub fn set_host_available(&self, available: bool) {
        self.device.lock().host_available = available;
    }

    /// Reply used for downloads once the queue is empty
    pub fn reply_to_downloads_with(&self, reply: BroadcastReply) {
        *self.default_download_reply.lock() = reply;
    }

    /// Reply for the next download only
    pub fn queue_download_reply(&self, reply: BroadcastReply) {
        self.download_replies.lock().push_back(reply);
    }

    /// Reply used for resolutions once the queue is empty
    pub fn reply_to_resolutions_with(&self, reply: BroadcastReply) {
        *self.default_resolution_reply.lock() = reply;
    }

    /// Reply for the next resolution only
    pub fn queue_resolution_reply(&self, reply: BroadcastReply) {
        self.resolution_replies.lock().push_back(reply);
    }

    /// Make the next download call fail
    pub fn fail_next_download(&self, message: impl Into<String>) {
        *self.download_failure.lock() = Some(message.into());
    }

    /// Make the next resolution call fail
    pub fn fail_next_resolution(&self, message: impl Into<String>) {
        *self.resolution_failure.lock() = Some(message.into());
    }

    /// Callbacks held back by [`BroadcastReply::Hold`]
    pub fn held_callbacks(&self) -> Vec<CallbackIntent> {
        self.held.lock().clone()
    }

    /// Answer the held callback carrying `correlation_id`
    pub fn release(&self, correlation_id: &str, reply: BroadcastReply) -> bool {
        let callback = {
            let mut held = self.held.lock();
            let position = held.iter().position(|callback| {
                callback.extras.get(EXTRA_CORRELATION_ID).map(String::as_str)
                    == Some(correlation_id)
            });
            position.map(|index| held.remove(index))
        };

        match callback {
            Some(callback) => {
                self.answer(callback, reply);
                true
            }
            None => {
                warn!(correlation_id, "No held callback to release");
                false
            }
        }
    }

    /// Answer every held callback with the same reply
    pub fn release_all(&self, reply: BroadcastReply) -> usize {
        let held: Vec<CallbackIntent> = self.held.lock().drain(..).collect();
        let count = held.len();
        for callback in held {
            self.answer(callback, reply.clone());
        }
        count
    }

    /// Deliver a raw broadcast to whichever receiver is registered for its action
    pub fn redeliver(&self, broadcast: Broadcast) -> bool {
        let receiver = self.receivers.lock().get(&broadcast.action).cloned();
        match receiver {
            Some(receiver) => {
                receiver.on_receive(broadcast);
                true
            }
            None => {
                warn!(action = %broadcast.action, "No receiver registered; broadcast lost");
                false
            }
        }
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    /// Number of downloads started
    pub fn download_count(&self) -> usize {
        self.count(|call| matches!(call, PlatformCall::BeginDownload { .. }))
    }

    /// Number of resolution steps started
    pub fn resolution_count(&self) -> usize {
        self.count(|call| matches!(call, PlatformCall::StartResolution { .. }))
    }

    /// Whether a receiver is registered for `action`
    pub fn receiver_registered(&self, action: &str) -> bool {
        self.receivers.lock().contains_key(action)
    }

    fn count(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: PlatformCall) {
        debug!(?call, "Simulated broadcast platform call");
        self.calls.lock().push(call);
    }

    fn answer(&self, callback: CallbackIntent, reply: BroadcastReply) {
        let broadcast = match reply {
            BroadcastReply::Hold => {
                self.held.lock().push(callback);
                return;
            }
            BroadcastReply::Ok => Broadcast::answering(&callback, RESULT_OK),
            BroadcastReply::Error { detailed_code } => {
                let mut broadcast = Broadcast::answering(&callback, RESULT_ERROR);
                if let Some(code) = detailed_code {
                    broadcast
                        .extras
                        .insert(EXTRA_DETAILED_CODE.to_string(), code.to_string());
                }
                broadcast
            }
            BroadcastReply::Resolvable { token } => {
                let mut broadcast = Broadcast::answering(&callback, RESULT_RESOLVABLE_ERROR);
                broadcast.resolution = Some(token);
                broadcast
            }
            BroadcastReply::Code(code) => Broadcast::answering(&callback, code),
        };
        self.redeliver(broadcast);
    }

    fn next_reply(
        queue: &Mutex<VecDeque<BroadcastReply>>,
        default: &Mutex<BroadcastReply>,
    ) -> BroadcastReply {
        let queued = queue.lock().pop_front();
        queued.unwrap_or_else(|| default.lock().clone())
    }
}

impl BroadcastPlatform for SimulatedBroadcastPlatform {
    fn platform_version(&self) -> u32 {
        self.device.lock().platform_version
    }

    fn manager_available(&self) -> bool {
        self.device.lock().manager_available
    }

    fn is_enabled(&self) -> bool {
        self.device.lock().enabled
    }

    fn host_available(&self) -> bool {
        self.device.lock().host_available
    }

    fn register_receiver(
        &self,
        action: &str,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::RegisterReceiver {
            action: action.to_string(),
        });
        self.receivers.lock().insert(action.to_string(), receiver);
        Ok(())
    }

    fn unregister_receiver(&self, action: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::UnregisterReceiver {
            action: action.to_string(),
        });
        match self.receivers.lock().remove(action) {
            Some(_) => Ok(()),
            None => Err(PlatformError::new(format!(
                "Receiver not registered for action: {}",
                action
            ))),
        }
    }

    fn begin_download(
        &self,
        activation_code: &str,
        callback: CallbackIntent,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::BeginDownload {
            activation_code: activation_code.to_string(),
            correlation_id: callback.extras.get(EXTRA_CORRELATION_ID).cloned(),
        });

        let failure = self.download_failure.lock().take();
        if let Some(message) = failure {
            return Err(PlatformError::new(message));
        }

        let reply = Self::next_reply(&self.download_replies, &self.default_download_reply);
        self.answer(callback, reply);
        Ok(())
    }

    fn start_resolution(
        &self,
        token: &ResolutionToken,
        callback: CallbackIntent,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::StartResolution {
            token: token.clone(),
            correlation_id: callback.extras.get(EXTRA_CORRELATION_ID).cloned(),
        });

        let failure = self.resolution_failure.lock().take();
        if let Some(message) = failure {
            return Err(PlatformError::new(message));
        }

        let reply = Self::next_reply(&self.resolution_replies, &self.default_resolution_reply);
        self.answer(callback, reply);
        Ok(())
    }
}
