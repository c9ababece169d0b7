//! JSON-lines transport between a caller and the runtime interface.
//!
//! Each input line is one method call, `{"id": .., "method": .., "arguments": {..}}`.
//! Each output line is either a response to a call or a provisioning event:
//!
//! ```text
//! {"type":"response","id":1,"response":{"status":"success","value":null}}
//! {"type":"event","correlationId":"r1","event":"success","body":{}}
//! ```

use esim_core::{MethodCall, MethodResponse, ProvisioningEvent, RuntimeInterface};
use esim_monitoring::ProvisioningMetrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::HostResult;

/// Code reported for input lines that are not valid method calls
pub const INVALID_FRAME: &str = "INVALID_FRAME";

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    /// Caller-chosen id echoed on the response
    #[serde(default)]
    pub id: Option<Value>,

    /// The call itself
    #[serde(flatten)]
    pub call: MethodCall,
}

/// One output line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    /// Response to an inbound call
    Response {
        /// Id of the call being answered
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        /// The response
        response: MethodResponse,
    },
    /// Provisioning event from the bridge
    Event(ProvisioningEvent),
}

enum WriterMessage {
    Frame(OutboundFrame),
    Close,
}

/// Serve method calls from `reader` until end of input.
///
/// Events are written to `writer` for as long as the transport is attached.
/// At end of input the transport waits up to `drain_grace` for in-flight
/// requests, delivers what they emitted, then tears the runtime down and
/// returns the writer.
pub async fn serve<R, W>(
    runtime: &RuntimeInterface,
    reader: R,
    writer: W,
    drain_grace: Duration,
) -> HostResult<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(writer, rx));

    let event_tx = tx.clone();
    runtime.attach(Arc::new(move |event: ProvisioningEvent| {
        ProvisioningMetrics::record_event(event.event.as_str(), event.correlation_id.is_some());
        if event_tx
            .send(WriterMessage::Frame(OutboundFrame::Event(event)))
            .is_err()
        {
            warn!("Transport writer closed; dropping event");
        }
    }));
    info!("Transport attached");

    let mut lines = reader.lines();
    let read_result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let frame = handle_line(runtime, &line).await;
                if tx.send(WriterMessage::Frame(frame)).is_err() {
                    warn!("Transport writer closed; stopping input");
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    drain(runtime, drain_grace).await;
    runtime.dispatcher().bridge().flush().await;
    let abandoned = runtime.teardown();
    ProvisioningMetrics::record_teardown(abandoned);

    // The writer may already be gone if it failed
    let _ = tx.send(WriterMessage::Close);
    let writer = writer_task.await??;

    read_result?;
    info!(abandoned, "Transport finished");
    Ok(writer)
}

/// Decode and answer one input line
pub async fn handle_line(runtime: &RuntimeInterface, line: &str) -> OutboundFrame {
    let frame: InboundFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed frame");
            ProvisioningMetrics::record_rejection(INVALID_FRAME);
            return OutboundFrame::Response {
                id: None,
                response: MethodResponse::error(INVALID_FRAME, e.to_string(), None),
            };
        }
    };

    let method = frame.call.method.clone();
    let started = Instant::now();
    let response = runtime.handle(frame.call).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    let status = match &response {
        MethodResponse::Success { .. } => "success",
        MethodResponse::Error { code, .. } => {
            ProvisioningMetrics::record_rejection(code);
            "error"
        }
        MethodResponse::NotImplemented => "not_implemented",
    };
    ProvisioningMetrics::record_method_call(&method, duration_ms, status);

    OutboundFrame::Response {
        id: frame.id,
        response,
    }
}

async fn drain(runtime: &RuntimeInterface, grace: Duration) {
    let registry = runtime.dispatcher().registry();
    let waited = tokio::time::timeout(grace, async {
        while !registry.is_empty() {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;

    if waited.is_err() {
        warn!(
            in_flight = registry.len(),
            "Grace period elapsed with requests still in flight"
        );
    }
}

async fn write_frames<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
) -> HostResult<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let frame = match message {
            WriterMessage::Frame(frame) => frame,
            WriterMessage::Close => break,
        };
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        debug!(bytes = line.len(), "Frame written");
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esim_core::{ProvisioningConfig, RuntimeInterface};
    use esim_platform_memory::{SimulatedPlatformProvider, SimulatedResult};

    fn broadcast_runtime(result: SimulatedResult) -> RuntimeInterface {
        let platform = Arc::new(SimulatedPlatformProvider::scripted_broadcast_platform(result));
        let provider = SimulatedPlatformProvider::new(ProvisioningConfig::default());
        RuntimeInterface::with_adapter(provider.broadcast_adapter(platform))
    }

    fn output_frames(output: Vec<u8>) -> Vec<Value> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn frames_of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
        frames.iter().filter(|frame| frame["type"] == kind).collect()
    }

    #[tokio::test]
    async fn test_submit_produces_ack_and_event() {
        let runtime = broadcast_runtime(SimulatedResult::Success);
        let input = concat!(
            r#"{"id":1,"method":"checkSupport"}"#,
            "\n",
            r#"{"id":2,"method":"submitProvisioning","arguments":{"address":"LPA:1$x","correlationId":"r1"}}"#,
            "\n",
        );

        let output = serve(&runtime, input.as_bytes(), Vec::new(), Duration::from_secs(2))
            .await
            .unwrap();
        let frames = output_frames(output);

        let responses = frames_of_type(&frames, "response");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["response"]["status"], "success");
        assert_eq!(responses[0]["response"]["value"], true);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["response"]["value"], Value::Null);

        let events = frames_of_type(&frames, "event");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["correlationId"], "r1");
        assert_eq!(events[0]["event"], "success");
        assert!(runtime.dispatcher().registry().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_lines() {
        let runtime = broadcast_runtime(SimulatedResult::Success);
        let input = "not json\n\n{\"id\":\"a\",\"method\":\"reboot\"}\n";

        let output = serve(&runtime, input.as_bytes(), Vec::new(), Duration::from_millis(100))
            .await
            .unwrap();
        let frames = output_frames(output);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["response"]["status"], "error");
        assert_eq!(frames[0]["response"]["code"], INVALID_FRAME);
        assert!(frames[0].get("id").is_none());
        assert_eq!(frames[1]["id"], "a");
        assert_eq!(frames[1]["response"]["status"], "notImplemented");
    }

    #[tokio::test]
    async fn test_rejections_are_reported_inline() {
        let runtime = broadcast_runtime(SimulatedResult::Success);
        let input = concat!(
            r#"{"id":1,"method":"submitProvisioning","arguments":"LPA:1$x"}"#,
            "\n",
            r#"{"id":2,"method":"submitProvisioning","arguments":{"address":"LPA:1$x","correlationId":""}}"#,
            "\n",
        );

        let output = serve(&runtime, input.as_bytes(), Vec::new(), Duration::from_millis(100))
            .await
            .unwrap();
        let frames = output_frames(output);

        assert_eq!(frames.len(), 2);
        for frame in &frames {
            assert_eq!(frame["response"]["code"], "INVALID_ARGS");
        }
    }

    #[tokio::test]
    async fn test_end_of_input_tears_down_held_requests() {
        let platform = Arc::new(esim_platform_memory::SimulatedBroadcastPlatform::new());
        platform.reply_to_downloads_with(esim_platform_memory::BroadcastReply::Hold);
        let provider = SimulatedPlatformProvider::default();
        let runtime = RuntimeInterface::with_adapter(provider.broadcast_adapter(platform.clone()));
        let input = concat!(
            r#"{"id":1,"method":"submitProvisioning","arguments":{"address":"LPA:1$x","correlationId":"held"}}"#,
            "\n",
        );

        let output = serve(&runtime, input.as_bytes(), Vec::new(), Duration::from_millis(30))
            .await
            .unwrap();
        let frames = output_frames(output);

        assert!(frames_of_type(&frames, "event").is_empty());
        assert!(runtime.dispatcher().registry().is_empty());
        assert!(!runtime.dispatcher().bridge().is_attached());
        assert!(!platform.receiver_registered(&ProvisioningConfig::default().broadcast_action));
    }

    #[test]
    fn test_inbound_frame_without_arguments() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"method":"getInstructions"}"#).unwrap();
        assert_eq!(frame.id, None);
        assert_eq!(frame.call.method, "getInstructions");
        assert_eq!(frame.call.arguments, Value::Null);
    }
}
