//! End-to-end scenarios for the closure platform variant

use esim_core::{CorrelationId, EventName, MethodResponse, PlanResult};
use esim_e2e_tests::utils::{closure_runtime, Harness};
use esim_platform_memory::{PlanReply, SimulatedPlanPlatform};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_plan_results_map_to_events() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    platform.queue_reply(PlanReply::Complete(PlanResult::Success));
    platform.queue_reply(PlanReply::Complete(PlanResult::Fail));
    platform.queue_reply(PlanReply::Complete(PlanResult::Cancel));
    platform.queue_reply(PlanReply::Complete(PlanResult::Other(42)));
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    for id in ["p-success", "p-fail", "p-cancel", "p-other"] {
        assert_eq!(
            harness
                .submit(json!({"address": "LPA:1$x", "correlationId": id}))
                .await,
            MethodResponse::success(Value::Null)
        );
    }
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 4);
    let event_for = |id: &str| {
        events
            .iter()
            .find(|event| event.correlation_id == Some(CorrelationId::new(id)))
            .cloned()
            .unwrap()
    };

    assert_eq!(event_for("p-success").event, EventName::Success);
    assert_eq!(event_for("p-fail").event, EventName::Fail);
    assert!(event_for("p-fail").body.is_empty());
    assert_eq!(event_for("p-cancel").event, EventName::Cancel);

    let other = event_for("p-other");
    assert_eq!(other.event, EventName::Unknown);
    assert_eq!(
        other.body.get("reason"),
        Some(&json!("Unknown default result from addPlan."))
    );
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_optional_fields_forwarded_when_present() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    harness
        .submit(json!({
            "profile": "LPA:1$smdp.example$code",
            "matchingID": "code",
            "confirmationCode": "",
            "iccid": "8901",
            "correlationId": "f1"
        }))
        .await;
    harness.settle().await;

    let requests = platform.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].address, "LPA:1$smdp.example$code");
    assert_eq!(requests[0].matching_id.as_deref(), Some("code"));
    assert_eq!(requests[0].confirmation_code, None);
    assert_eq!(requests[0].iccid.as_deref(), Some("8901"));
    assert_eq!(harness.drain_events().len(), 1);
}

#[tokio::test]
async fn test_unsupported_os_short_circuits() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    platform.set_os_major_version(11);
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "old"}))
        .await;
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Unsupport);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!(
            "OS version 12.0 or higher is required to install eSIM profiles."
        ))
    );
    assert!(platform.requests().is_empty());
}

#[tokio::test]
async fn test_dropped_completion_retires_as_unknown() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    platform.reply_with(PlanReply::Drop);
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "lost"}))
        .await;
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Unknown);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!("completion channel closed without a result"))
    );
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_held_completion_after_teardown_is_discarded() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    platform.reply_with(PlanReply::Hold);
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    harness
        .submit(json!({"address": "LPA:1$x", "correlationId": "h1"}))
        .await;
    assert_eq!(platform.held_count(), 1);
    assert_eq!(harness.runtime.teardown(), 1);

    let mut reattached = Harness::attach(harness.runtime.clone());
    assert!(platform.complete_next(PlanResult::Success));
    reattached.quiesce().await;

    assert!(reattached.drain_events().is_empty());
    assert!(harness.drain_events().is_empty());
    assert!(harness.runtime.dispatcher().registry().is_empty());
}

#[tokio::test]
async fn test_platform_failure_reports_fail() {
    let platform = Arc::new(SimulatedPlanPlatform::new());
    platform.fail_next_add_plan("carrier rejected");
    let mut harness = Harness::attach(closure_runtime(platform.clone()));

    assert_eq!(
        harness
            .submit(json!({"address": "LPA:1$x", "correlationId": "pf"}))
            .await,
        MethodResponse::success(Value::Null)
    );
    harness.settle().await;

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventName::Fail);
    assert_eq!(
        events[0].body.get("reason"),
        Some(&json!("Failed to start eSIM profile download."))
    );
}
