//! Integration tests for the lifecycle orchestrator
//!
//! Drives real invocations on the tokio runtime and checks the events that
//! reach the sink, the event the handle resolves to, and the abort window.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use composable_lifecycle_core::serialized_error::{
    ABORT_ERROR_NAME, CONDITION_ERROR_MESSAGE, CONDITION_ERROR_NAME, DEFAULT_ABORT_REASON,
};
use composable_lifecycle_core::{
    Computation, ComputationApi, Environment, Failure, LifecycleEvent, RequestStatus,
    SerializedError, ThunkApiOf, UnwrapError, computation_fn,
};
use composable_lifecycle_runtime::{
    BroadcastSink, CancellationSupport, Lifecycle, LifecycleError, LifecycleOptions, create_lifecycle,
};
use composable_lifecycle_testing::assertions;
use composable_lifecycle_testing::helpers::{init_test_tracing, recording_environment};
use composable_lifecycle_testing::mocks::{RecordingSink, SequentialIdGenerator};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

/// What the scripted computation does with its argument
#[derive(Debug, Clone, PartialEq, Serialize)]
enum Script {
    Succeed(&'static str),
    Reject(i32),
    Throw(&'static str),
    ThrowValue(serde_json::Value),
    Sleep(u64),
    EchoRequestId,
    WaitForAbort,
    Explode,
}

#[derive(Debug, Clone, Default)]
struct AppState {
    busy: bool,
}

struct Scripted;

impl Computation for Scripted {
    type Arg = Script;
    type Output = String;
    type Rejection = i32;
    type State = AppState;
    type Extra = ();

    async fn run(&self, arg: Script, api: ThunkApiOf<Self>) -> Result<String, Failure<i32>> {
        match arg {
            Script::Succeed(value) => Ok(value.to_string()),
            Script::Reject(payload) => Err(api.reject_with_value(payload).into()),
            Script::Throw(message) => Err(anyhow::anyhow!(message).into()),
            Script::ThrowValue(value) => Err(Failure::thrown_value(value)),
            Script::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok("slept".to_string())
            }
            Script::EchoRequestId => Ok(api.request_id().to_string()),
            Script::WaitForAbort => Ok(format!("observed {}", api.signal().aborted().await)),
            Script::Explode => panic!("computation exploded"),
        }
    }
}

type Event = LifecycleEvent<Script, String, i32>;

fn env() -> (Environment<AppState, (), Event>, RecordingSink<Event>) {
    recording_environment(AppState::default(), ())
}

fn scripted() -> Lifecycle<Scripted> {
    Lifecycle::new("script/run", Scripted)
}

// ============================================================================
// Start and terminal events
// ============================================================================

#[tokio::test]
async fn test_started_precedes_single_terminal() {
    init_test_tracing();
    let (env, sink) = env();

    let handle = scripted().call(Script::Succeed("ok"), &env);
    let request_id = handle.request_id().to_string();
    let event = handle.await;

    let events = sink.events();
    assertions::assert_started_then_settled(&events);
    assertions::assert_correlated(&events, &request_id);
    assertions::assert_statuses(&events, &[RequestStatus::Pending, RequestStatus::Fulfilled]);
    assert_eq!(sink.event_types(), vec!["script/run/pending", "script/run/fulfilled"]);

    assert!(event.is_fulfilled());
    assert_eq!(*event.arg(), Script::Succeed("ok"));
}

#[tokio::test]
async fn test_success_unwraps_value() {
    let (env, _sink) = env();

    let result = scripted().call(Script::Succeed("ok"), &env).unwrap().await;
    assert_eq!(result, Ok("ok".to_string()));
}

#[tokio::test]
async fn test_computation_sees_its_request_id() {
    let (env, _sink) = env();

    let handle = scripted().call(Script::EchoRequestId, &env);
    let request_id = handle.request_id().to_string();

    assert_eq!(handle.unwrap().await, Ok(request_id));
}

#[tokio::test]
async fn test_handle_resolves_to_dispatched_terminal() {
    let (env, sink) = env();

    let event = scripted().call(Script::Reject(3), &env).await;
    let dispatched = sink.events().pop().unwrap();

    assert_eq!(event.event_type(), dispatched.event_type());
    assert_eq!(event.request_id(), dispatched.request_id());
    assert_eq!(event.error(), dispatched.error());
}

// ============================================================================
// Failure classification
// ============================================================================

#[tokio::test]
async fn test_reject_with_value() {
    let (env, _sink) = env();

    let event = scripted().call(Script::Reject(7), &env).await;

    assert!(event.is_rejected());
    assert!(event.is_rejected_with_value());
    assert!(!event.is_aborted());
    assert!(!event.is_condition_skipped());
    assert_eq!(event.error(), Some(&SerializedError::from_message("Rejected")));
    assert!(event.cause().is_none());
    assert!(matches!(event, LifecycleEvent::Rejected { payload: Some(7), .. }));
}

#[tokio::test]
async fn test_reject_with_value_unwraps_raw_payload() {
    let (env, _sink) = env();

    let result = scripted().call(Script::Reject(7), &env).unwrap().await;
    assert_eq!(result, Err(UnwrapError::Rejected(7)));
}

#[tokio::test]
async fn test_thrown_error_is_serialized() {
    let (env, _sink) = env();

    let event = scripted().call(Script::Throw("boom"), &env).await;

    assert!(event.is_rejected());
    assert!(!event.is_rejected_with_value());
    assert!(!event.is_aborted());
    assert_eq!(event.error().and_then(|e| e.message.as_deref()), Some("boom"));
    assert_eq!(event.cause().map(ToString::to_string).as_deref(), Some("boom"));
    assert!(matches!(event, LifecycleEvent::Rejected { payload: None, .. }));
}

#[tokio::test]
async fn test_thrown_error_unwraps_serialized_error() {
    let (env, _sink) = env();

    let error = scripted().call(Script::Throw("boom"), &env).unwrap().await.unwrap_err();

    assert_eq!(error.serialized().and_then(|e| e.message.as_deref()), Some("boom"));
    assert_eq!(error.to_string(), "boom");
}

#[tokio::test]
async fn test_thrown_object_keeps_whitelisted_fields() {
    let (env, _sink) = env();

    let event = scripted()
        .call(Script::ThrowValue(json!({ "name": "E", "message": "boom", "extra": 1 })), &env)
        .await;

    assert_eq!(
        event.error(),
        Some(&SerializedError::from_message("boom").with_name("E"))
    );
}

#[tokio::test]
async fn test_thrown_scalar_becomes_message() {
    let (env, _sink) = env();

    let event = scripted().call(Script::ThrowValue(json!(42)), &env).await;

    assert_eq!(event.error(), Some(&SerializedError::from_message("42")));
}

#[tokio::test]
async fn test_panic_is_classified_as_thrown() {
    let (env, sink) = env();

    let event = scripted().call(Script::Explode, &env).await;

    assert!(event.is_rejected());
    assert!(!event.is_aborted());
    assert!(!event.is_rejected_with_value());
    let message = event.error().and_then(|e| e.message.clone()).unwrap();
    assert!(message.contains("computation exploded"), "unexpected message: {message}");
    assertions::assert_started_then_settled(&sink.events());
}

#[tokio::test]
async fn test_custom_error_normalizer() {
    let (env, _sink) = env();
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::default().with_error_normalizer(|error: &anyhow::Error| {
            SerializedError::from_message(format!("normalized: {error}")).with_code("E_CUSTOM")
        }),
    );

    let thrown = lifecycle.call(Script::Throw("boom"), &env).await;
    let rejected = lifecycle.call(Script::Reject(1), &env).await;

    assert_eq!(
        thrown.error(),
        Some(&SerializedError::from_message("normalized: boom").with_code("E_CUSTOM"))
    );
    assert_eq!(
        rejected.error().and_then(|e| e.code.as_deref()),
        Some("E_CUSTOM")
    );
}

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn test_gate_false_skips_and_dispatches() {
    let (env, sink) = env();
    let lifecycle = Lifecycle::builder("script/run", Scripted)
        .with_gate(|_, _| Some(false))
        .build();

    let event = lifecycle.call(Script::Succeed("never"), &env).await;

    let events = sink.events();
    assertions::assert_not_started(&events);
    assertions::assert_terminal_count(&events, 1);

    assert!(event.is_condition_skipped());
    assert!(!event.is_aborted());
    assert!(!event.is_rejected_with_value());
    assert_eq!(
        event.error(),
        Some(
            &SerializedError::from_message(CONDITION_ERROR_MESSAGE).with_name(CONDITION_ERROR_NAME)
        )
    );
    assert!(event.cause().is_none());
}

#[tokio::test]
async fn test_gate_false_with_suppressed_dispatch() {
    let (env, sink) = env();
    let lifecycle = Lifecycle::builder("script/run", Scripted)
        .with_gate(|_, _| Some(false))
        .suppress_skip_dispatch(true)
        .build();

    let event = lifecycle.call(Script::Succeed("never"), &env).await;

    assert!(sink.is_empty());
    assert!(event.is_condition_skipped());
}

#[tokio::test]
async fn test_gate_skip_goes_through_custom_normalizer() {
    let (env, _sink) = env();
    let lifecycle = Lifecycle::builder("script/run", Scripted)
        .with_gate(|_, _| Some(false))
        .with_error_normalizer(|error: &anyhow::Error| {
            let mut serialized = error
                .downcast_ref::<SerializedError>()
                .cloned()
                .unwrap_or_else(|| SerializedError::from_message(error.to_string()));
            serialized.code = Some("E_CUSTOM".to_string());
            serialized
        })
        .build();

    let event = lifecycle.call(Script::Succeed("never"), &env).await;

    assert!(event.is_condition_skipped());
    assert!(event.cause().is_none());
    assert_eq!(
        event.error(),
        Some(
            &SerializedError::from_message(CONDITION_ERROR_MESSAGE)
                .with_name(CONDITION_ERROR_NAME)
                .with_code("E_CUSTOM")
        )
    );
}

#[tokio::test]
async fn test_typed_options_accept_gate() {
    let (env, sink) = env();
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::<Scripted>::default().with_gate(|_, api| Some(!api.get_state().busy)),
    );

    assert!(lifecycle.call(Script::Succeed("ok"), &env).await.is_fulfilled());
    assertions::assert_started_then_settled(&sink.events());
}

#[tokio::test]
async fn test_gate_true_and_undecided_proceed() {
    let (env, sink) = env();
    let allow = Lifecycle::builder("script/allow", Scripted)
        .with_gate(|_, _| Some(true))
        .build();
    let undecided = Lifecycle::builder("script/undecided", Scripted)
        .with_gate(|_, _| None)
        .build();

    assert!(allow.call(Script::Succeed("a"), &env).await.is_fulfilled());
    assert!(undecided.call(Script::Succeed("b"), &env).await.is_fulfilled());
    assertions::assert_terminal_count(&sink.events(), 2);
}

#[tokio::test]
async fn test_gate_reads_state_and_arg() {
    let sink = RecordingSink::<Event>::new();
    let busy = Environment::new(sink.clone(), || AppState { busy: true }, ());
    let idle = Environment::new(sink.clone(), || AppState { busy: false }, ());
    let lifecycle = Lifecycle::builder("script/run", Scripted)
        .with_gate(|arg, api| Some(!api.get_state().busy && *arg != Script::Succeed("blocked")))
        .build();

    assert!(lifecycle.call(Script::Succeed("x"), &busy).await.is_condition_skipped());
    assert!(lifecycle.call(Script::Succeed("blocked"), &idle).await.is_condition_skipped());
    assert!(lifecycle.call(Script::Succeed("x"), &idle).await.is_fulfilled());
}

#[tokio::test]
async fn test_gate_panic_is_thrown_not_skip() {
    let (env, sink) = env();
    let lifecycle = Lifecycle::builder("script/run", Scripted)
        .with_gate(|_, _| panic!("gate exploded"))
        .suppress_skip_dispatch(true)
        .build();

    let event = lifecycle.call(Script::Succeed("never"), &env).await;

    assert!(event.is_rejected());
    assert!(!event.is_condition_skipped());
    assert!(event.error().and_then(|e| e.message.as_deref()).unwrap().contains("gate exploded"));

    let events = sink.events();
    assertions::assert_not_started(&events);
    assertions::assert_terminal_count(&events, 1);
}

// ============================================================================
// Request ids
// ============================================================================

#[tokio::test]
async fn test_generator_called_once_per_invocation() {
    let (env, _sink) = env();
    let ids = SequentialIdGenerator::new("op");
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::default().with_id_generator(ids.clone()),
    );

    let handles: Vec<_> = (0..10).map(|_| lifecycle.call(Script::Succeed("ok"), &env)).collect();
    assert_eq!(ids.calls(), 10);

    let mut seen = HashSet::new();
    for handle in handles {
        let event = handle.await;
        assert!(seen.insert(event.request_id().to_string()));
    }
    assert_eq!(ids.calls(), 10);
    assert!(seen.contains("op-1") && seen.contains("op-10"));
}

#[tokio::test]
async fn test_default_request_ids_are_unique() {
    let (env, _sink) = env();
    let lifecycle = scripted();

    let ids: HashSet<String> = (0..100)
        .map(|_| lifecycle.call(Script::Succeed("ok"), &env).request_id().to_string())
        .collect();

    assert_eq!(ids.len(), 100);
}

// ============================================================================
// Abort
// ============================================================================

#[tokio::test]
async fn test_abort_before_start_is_noop() {
    let (env, sink) = env();

    // The driver has not been polled yet on the current-thread runtime
    let handle = scripted().call(Script::Sleep(20), &env);
    assert!(!handle.abort_with_reason("too early"));

    let event = handle.await;
    assert!(event.is_fulfilled());
    assert!(!event.is_aborted());
    assertions::assert_started_then_settled(&sink.events());
}

#[tokio::test]
async fn test_abort_after_start_with_reason() {
    let (env, sink) = env();

    let handle = scripted().call(Script::Sleep(5_000), &env);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.abort_with_reason("x"));

    let event = handle.await;
    assert!(event.is_aborted());
    assert!(!event.is_rejected_with_value());
    assert!(!event.is_condition_skipped());
    assert_eq!(
        event.error(),
        Some(&SerializedError::from_message("x").with_name(ABORT_ERROR_NAME))
    );
    assert!(event.cause().is_some());
    assertions::assert_started_then_settled(&sink.events());
}

#[tokio::test]
async fn test_abort_default_reason() {
    let (env, _sink) = env();

    let handle = scripted().call(Script::Sleep(5_000), &env);
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort();

    let error = handle.unwrap().await.unwrap_err();
    assert_eq!(
        error.serialized(),
        Some(&SerializedError::from_message(DEFAULT_ABORT_REASON).with_name(ABORT_ERROR_NAME))
    );
}

#[tokio::test]
async fn test_abort_twice_produces_one_terminal() {
    let (env, sink) = env();

    let handle = scripted().call(Script::Sleep(5_000), &env);
    let abort = handle.abort_handle();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(abort.abort_with_reason("first"));
    assert!(!handle.abort_with_reason("second"));

    let event = handle.await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(event.error().and_then(|e| e.message.as_deref()), Some("first"));
    assertions::assert_terminal_count(&sink.events(), 1);
}

#[tokio::test]
async fn test_computation_observes_abort_signal() {
    let (env, _sink) = env();

    let handle = scripted().call(Script::WaitForAbort, &env);
    let signal = handle.signal();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort_with_reason("stop");

    // Abort wins the race even though the computation completes right after
    assert!(handle.await.is_aborted());
    assert_eq!(signal.reason().as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_aborted_computation_runs_to_completion_unobserved() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let slow = computation_fn(move |ms: u64, _api: ComputationApi<u64, u64, ()>| {
        let flag = Arc::clone(&flag);
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Failure<()>>(ms)
        }
    });
    let sink = RecordingSink::new();
    let env = Environment::new(sink.clone(), || (), ());

    let handle = Lifecycle::new("slow/op", slow).call(60, &env);
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.abort();

    assert!(handle.await.is_aborted());
    assert!(!finished.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(finished.load(Ordering::SeqCst));
    assertions::assert_terminal_count(&sink.events(), 1);
}

#[tokio::test]
async fn test_fallback_cancellation_runs_to_completion() {
    let (env, _sink) = env();
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::default().with_cancellation(CancellationSupport::Unsupported),
    );

    let handle = lifecycle.call(Script::Sleep(30), &env);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(!handle.abort_with_reason("ignored"));
    assert!(!handle.signal().is_aborted());

    let event = handle.await;
    assert!(event.is_fulfilled());
}

// ============================================================================
// Handle extras
// ============================================================================

#[tokio::test]
async fn test_wait_with_timeout() {
    let (env, _sink) = env();

    let slow = scripted().call(Script::Sleep(5_000), &env);
    let result = slow.wait_with_timeout(Duration::from_millis(20)).await;
    assert_eq!(result.err(), Some(LifecycleError::Timeout));

    let fast = scripted().call(Script::Succeed("ok"), &env);
    let result = fast.wait_with_timeout(Duration::from_secs(1)).await;
    assert!(result.is_ok_and(|event| event.is_fulfilled()));
}

#[test]
fn test_try_call_outside_runtime() {
    let (env, _sink) = env();
    let ids = SequentialIdGenerator::new("op");
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::default().with_id_generator(ids.clone()),
    );

    let result = lifecycle.try_call(Script::Succeed("ok"), &env);

    assert!(matches!(result, Err(LifecycleError::NoRuntime)));
    assert_eq!(ids.calls(), 0);
}

#[tokio::test]
async fn test_try_call_inside_runtime() {
    let (env, _sink) = env();

    let handle = scripted().try_call(Script::Succeed("ok"), &env).unwrap();
    assert!(handle.await.is_fulfilled());
}

// ============================================================================
// Downstream consumers
// ============================================================================

/// Loading state kept by a reducer that matches on event creators
#[derive(Debug, Default)]
struct LoadingState {
    in_flight: HashSet<String>,
    results: Vec<String>,
    failures: Vec<SerializedError>,
}

fn reduce(lifecycle: &Lifecycle<Scripted>, state: &mut LoadingState, event: &Event) {
    if lifecycle.pending().matches(event) {
        state.in_flight.insert(event.request_id().to_string());
    } else if lifecycle.fulfilled().matches(event) {
        state.in_flight.remove(event.request_id());
        if let LifecycleEvent::Fulfilled { payload, .. } = event {
            state.results.push(payload.clone());
        }
    } else if lifecycle.rejected().matches(event) {
        state.in_flight.remove(event.request_id());
        state.failures.extend(event.error().cloned());
    }
}

#[tokio::test]
async fn test_reducer_tracks_loading_with_matchers() {
    let (env, sink) = env();
    let lifecycle = scripted();
    let other = Lifecycle::new("other/op", Scripted);

    let first = lifecycle.call(Script::Succeed("one"), &env);
    let second = lifecycle.call(Script::Throw("two"), &env);
    let unrelated = other.call(Script::Succeed("ignored"), &env);
    first.await;
    second.await;
    unrelated.await;

    let mut state = LoadingState::default();
    for event in sink.events() {
        reduce(&lifecycle, &mut state, &event);
    }

    assert!(state.in_flight.is_empty());
    assert_eq!(state.results, vec!["one".to_string()]);
    assert_eq!(state.failures.len(), 1);
    assert_eq!(state.failures[0].message.as_deref(), Some("two"));
}

#[tokio::test]
async fn test_broadcast_sink_observers() {
    let sink = BroadcastSink::<Event>::new();
    let mut rx = sink.subscribe();
    let env = Environment::new(sink.clone(), AppState::default, ());

    let handle = scripted().call(Script::Succeed("ok"), &env);
    let request_id = handle.request_id().to_string();

    let terminal = BroadcastSink::wait_for(
        &mut rx,
        |event| event.request_id() == request_id && event.request_status().is_terminal(),
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert!(terminal.is_fulfilled());
    assert!(handle.await.is_fulfilled());
}

#[tokio::test]
async fn test_terminal_event_serializes_without_cause() {
    let (env, _sink) = env();
    let lifecycle = create_lifecycle(
        "script/run",
        Scripted,
        LifecycleOptions::default().with_id_generator(SequentialIdGenerator::new("req")),
    );

    let handle = lifecycle.call(Script::Sleep(5_000), &env);
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort_with_reason("user left");
    let event = handle.await;

    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["status"], "rejected");
    assert_eq!(value["type_prefix"], "script/run");
    assert_eq!(value["error"], json!({ "name": "AbortError", "message": "user left" }));
    assert_eq!(value["meta"]["request_id"], "req-1");
    assert_eq!(value["meta"]["aborted"], true);
    assert_eq!(value["meta"]["condition"], false);
    assert!(value.get("cause").is_none());
}
