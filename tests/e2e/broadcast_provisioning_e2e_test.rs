//! End-to-end scenarios for the broadcast platform variant
//!
//! Each scenario drives the runtime interface the way a transport would and
//! asserts on the events the attached consumer receives.

use esim_core::{
    CorrelationId, EventName, MethodResponse, ProvisioningConfig, ProvisioningState,
    ResolutionToken,
};
use esim_e2e_tests::utils::{broadcast_runtime, Harness};
use esim_platform_memory::{
    BroadcastReply, PlatformCall, SimulatedBroadcastPlatform, SimulatedPlatformProvider,
    SimulatedResult, SIMULATED_RESOLUTION_TOKEN,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn ack() -> MethodResponse {
    MethodResponse::success(Value::Null)
}

fn error_code(response: &MethodResponse) -> Option<&str> {
    match response {
        MethodResponse::Error { code, .. } => Some(code.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_r1_success_reports_single_success_event() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    assert_eq!(
        harness.call("checkSupport", json!({})).await,
        MethodResponse::success(json!(true))
    );
    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$x", "correlationId": "r1"}))
            .await,
        ack()
    );
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id, Some(CorrelationId::new("r1")));
    assert_eq!(events[0].event, EventName::Success);
    assert!(events[0].body.is_empty());
    assert!(harness.runtime.dispatcher().registry().is_empty());
    assert_eq!(platform.download_count(), 1);
}

#[tokio::test]
async fn test_r2_resolvable_error_resolves_then_fails_with_code() {
    let platform = Arc::new(SimulatedPlatformProvider::scripted_broadcast_platform(
        SimulatedResult::Resolvable,
    ));
    platform.reply_to_resolutions_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$x", "correlationId": "r2"}))
            .await,
        ack()
    );
    harness.quiesce().await;

    // Resolution started, nothing reported yet
    assert!(harness.drain_events().is_empty());
    assert_eq!(platform.resolution_count(), 1);
    let entry = harness
        .runtime
        .dispatcher()
        .registry()
        .lookup(&CorrelationId::new("r2"))
        .unwrap();
    assert_eq!(entry.state, ProvisioningState::AwaitingResolution);
    assert!(platform.calls().contains(&PlatformCall::StartResolution {
        token: ResolutionToken::new(SIMULATED_RESOLUTION_TOKEN),
        correlation_id: Some("r2".to_string()),
    }));

    assert!(platform.release(
        "r2",
        BroadcastReply::Error {
            detailed_code: Some(7)
        }
    ));
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id, Some(CorrelationId::new("r2")));
    assert_eq!(events[0].event, EventName::Fail);
    assert_eq!(events[0].body.get("errorCode"), Some(&json!(7)));
    assert_eq!(platform.resolution_count(), 1);
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_duplicate_while_awaiting_completion_is_rejected() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.reply_to_downloads_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));
    let arguments = json!({"address": "LPA:1$x", "correlationId": "r1"});

    assert_eq!(harness.submit(arguments.clone()).await, ack());
    let duplicate = harness.submit(arguments.clone()).await;
    assert_eq!(error_code(&duplicate), Some("ALREADY_IN_FLIGHT"));
    assert_eq!(platform.download_count(), 1);

    assert!(platform.release("r1", BroadcastReply::Ok));
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Success);

    // Retired ids can be reused
    platform.reply_to_downloads_with(BroadcastReply::Ok);
    assert_eq!(harness.submit(arguments).await, ack());
    harness.settle().await;
    assert_eq!(harness.drain_events().len(), 1);
}

#[tokio::test]
async fn test_duplicate_rejected_even_when_support_is_lost() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.reply_to_downloads_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));
    let arguments = json!({"address": "LPA:1$x", "correlationId": "r1"});

    assert_eq!(harness.submit(arguments.clone()).await, ack());

    platform.set_enabled(false);
    let duplicate = harness.submit(arguments).await;
    assert_eq!(error_code(&duplicate), Some("ALREADY_IN_FLIGHT"));
    harness.quiesce().await;
    assert!(harness.drain_events().is_empty());

    platform.set_enabled(true);
    assert!(platform.release("r1", BroadcastReply::Ok));
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id, Some(CorrelationId::new("r1")));
    assert_eq!(events[0].event, EventName::Success);
}

#[tokio::test]
async fn test_duplicate_while_awaiting_resolution_is_rejected() {
    let platform = Arc::new(SimulatedPlatformProvider::scripted_broadcast_platform(
        SimulatedResult::Resolvable,
    ));
    platform.reply_to_resolutions_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$x", "correlationId": "r2"}))
            .await,
        ack()
    );
    harness.quiesce().await;

    let duplicate = harness
        .submit(json!({"address": "LPA:1$y", "correlationId": "r2"}))
        .await;
    assert_eq!(error_code(&duplicate), Some("ALREADY_IN_FLIGHT"));

    // An unrelated request proceeds while r2 waits on its resolution
    platform.queue_download_reply(BroadcastReply::Ok);
    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$z", "correlationId": "other"}))
            .await,
        ack()
    );
    harness.quiesce().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id, Some(CorrelationId::new("other")));
    assert!(harness
        .runtime
        .dispatcher()
        .registry()
        .is_in_flight(&CorrelationId::new("r2")));

    assert!(platform.release("r2", BroadcastReply::Ok));
    harness.settle().await;
    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id, Some(CorrelationId::new("r2")));
    assert_eq!(events[0].event, EventName::Success);
}

#[tokio::test]
async fn test_unsupported_device_reports_unsupport_without_download() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.set_enabled(false);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    assert_eq!(
        harness.call("isSupportESim", json!({})).await,
        MethodResponse::success(json!(false))
    );
    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$x", "correlationId": "u1"}))
            .await,
        ack()
    );
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Unsupport);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!("eSIM is disabled in settings."))
    );
    assert_eq!(platform.download_count(), 0);
    assert!(platform.calls().is_empty());
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_old_platform_version_is_unsupported() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.set_platform_version(27);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "v1"}))
        .await;
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!(format!(
            "eSIM functionality requires platform version {} or newer.",
            ProvisioningConfig::default().min_platform_version
        )))
    );
}

#[tokio::test]
async fn test_missing_address_is_forwarded() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    assert_eq!(harness.submit(json!({"correlationId": "m1"})).await, ack());
    harness.settle().await;

    assert!(platform.calls().contains(&PlatformCall::BeginDownload {
        activation_code: String::new(),
        correlation_id: Some("m1".to_string()),
    }));
    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Success);
}

#[tokio::test]
async fn test_events_without_consumer_are_dropped_not_replayed() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.reply_to_downloads_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "d1"}))
        .await;
    harness.quiesce().await;
    assert!(harness.runtime.detach());

    assert!(platform.release("d1", BroadcastReply::Ok));
    harness.settle().await;
    assert!(harness.runtime.dispatcher().registry().is_empty());

    let mut reattached = Harness::attach(harness.runtime.clone());
    reattached.quiesce().await;
    assert!(reattached.drain_events().is_empty());
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn test_teardown_abandons_in_flight_requests() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.reply_to_downloads_with(BroadcastReply::Hold);
    let action = ProvisioningConfig::default().broadcast_action;
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "t1"}))
        .await;
    harness
        .submit(json!({"address": "LPA:1$y", "correlationId": "t2"}))
        .await;
    assert!(platform.receiver_registered(&action));

    assert_eq!(harness.runtime.teardown(), 2);
    assert_eq!(harness.runtime.teardown(), 0);
    assert!(!platform.receiver_registered(&action));

    // Late platform answers find no receiver
    assert_eq!(platform.release_all(BroadcastReply::Ok), 2);
    harness.quiesce().await;
    assert!(harness.drain_events().is_empty());
    assert!(harness.runtime.dispatcher().registry().is_empty());

    // Re-attachment restarts the lifecycle
    platform.reply_to_downloads_with(BroadcastReply::Ok);
    let mut reattached = Harness::attach(harness.runtime.clone());
    assert_eq!(
        reattached
            .submit(json!({"address": "LPA:1$x", "correlationId": "t1"}))
            .await,
        ack()
    );
    reattached.settle().await;
    assert!(platform.receiver_registered(&action));
    let events = reattached.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Success);
}

#[tokio::test]
async fn test_concurrent_and_anonymous_requests_do_not_collide() {
    let platform = Arc::new(SimulatedBroadcastPlatform::new());
    platform.reply_to_downloads_with(BroadcastReply::Hold);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    for id in ["c1", "c2", "c3"] {
        assert_eq!(
            harness
                .submit(json!({"address": "LPA:1$x", "correlationId": id}))
                .await,
            ack()
        );
    }
    assert_eq!(harness.submit(json!({"address": "LPA:1$anon"})).await, ack());
    assert_eq!(harness.submit(json!({"address": "LPA:1$anon"})).await, ack());
    assert_eq!(platform.held_callbacks().len(), 5);

    // Answer out of order with distinct results
    assert!(platform.release("c3", BroadcastReply::Code(9)));
    assert!(platform.release(
        "c1",
        BroadcastReply::Error {
            detailed_code: None
        }
    ));
    assert!(platform.release("c2", BroadcastReply::Ok));
    assert_eq!(platform.release_all(BroadcastReply::Ok), 2);
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 5);

    let event_for = |id: &str| {
        let matching: Vec<_> = events
            .iter()
            .filter(|event| event.correlation_id == Some(CorrelationId::new(id)))
            .collect();
        assert_eq!(matching.len(), 1, "exactly one event for {}", id);
        matching[0].clone()
    };
    assert_eq!(event_for("c1").event, EventName::Fail);
    assert_eq!(event_for("c1").body.get("errorCode"), Some(&json!(2)));
    assert_eq!(event_for("c2").event, EventName::Success);
    assert_eq!(event_for("c3").event, EventName::Unknown);
    assert_eq!(event_for("c3").body.get("resultCode"), Some(&json!(9)));

    let anonymous: Vec<_> = events
        .iter()
        .filter(|event| event.correlation_id.is_none())
        .collect();
    assert_eq!(anonymous.len(), 2);
    assert!(anonymous.iter().all(|event| event.event == EventName::Success));
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_resolution_start_failure_becomes_fail_event() {
    let platform = Arc::new(SimulatedPlatformProvider::scripted_broadcast_platform(
        SimulatedResult::Resolvable,
    ));
    platform.fail_next_resolution("activity crashed");
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "rf"}))
        .await;
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Fail);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!(
            "Failed to start or complete resolution activity for eSIM."
        ))
    );
    assert!(events[0].body.contains_key("errorDetails"));
}

#[tokio::test]
async fn test_resolution_without_host_activity_fails() {
    let platform = Arc::new(SimulatedPlatformProvider::scripted_broadcast_platform(
        SimulatedResult::Resolvable,
    ));
    platform.set_host_available(false);
    let mut harness = Harness::attach(broadcast_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "nh"}))
        .await;
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Fail);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!(
            "Internal error: host activity not available to handle resolvable error."
        ))
    );
    assert_eq!(platform.resolution_count(), 0);
}

#[tokio::test]
async fn test_instructions_and_unknown_methods() {
    let harness = Harness::attach(broadcast_runtime(Arc::new(SimulatedBroadcastPlatform::new())));

    match harness.call("getInstructions", Value::Null).await {
        MethodResponse::Success { value } => {
            assert!(value.as_str().unwrap().contains("LPA:1$"));
        }
        other => panic!("unexpected response: {:?}", other),
    }
    assert_eq!(
        harness.call("formatDevice", json!({})).await,
        MethodResponse::NotImplemented
    );
}
