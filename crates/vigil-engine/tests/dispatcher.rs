//! Trace dispatch: subscription filter and first-non-Continue wins.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vigil_core::{BreakpointKind, ExecError, Signal, TraceEvent, VigilError};
use vigil_engine::extension::ExtensionDescriptor;
use vigil_engine::module::{Callable, ClientData};

mod fixtures;
use fixtures::{engine_with, signalling, trace_method, TEST_MODULE};

fn trace(method: &str, kind: BreakpointKind) -> ExtensionDescriptor {
    ExtensionDescriptor::trace(method, TEST_MODULE, "Hooks", method).on(kind)
}

fn event(kind: BreakpointKind) -> TraceEvent {
    TraceEvent::new(kind, serde_json::json!({ "command": "set", "name": "x" }))
}

#[tokio::test]
async fn first_break_stops_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = Arc::clone(&calls);
        Callable::trace_fn(move |_: &TraceEvent, _: Option<&ClientData>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Signal::Continue)
        })
    };
    let engine = engine_with(vec![
        trace_method("a", signalling(Signal::Continue)),
        trace_method("b", signalling(Signal::Break)),
        trace_method("c", counted),
    ]);
    let a = engine.register_extension(trace("a", BreakpointKind::BeforeCommand)).unwrap();
    let b = engine.register_extension(trace("b", BreakpointKind::BeforeCommand)).unwrap();
    engine.register_extension(trace("c", BreakpointKind::BeforeCommand)).unwrap();

    let report = engine.notify_detailed(&event(BreakpointKind::BeforeCommand)).await;
    assert_eq!(report.signal, Signal::Break);
    assert_eq!(report.invoked, vec![a, b]);
    assert_eq!(report.responder, Some(b));
    assert!(report.failure.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsubscribed_kinds_are_not_invoked() {
    let engine = engine_with(vec![trace_method("a", signalling(Signal::Break))]);
    engine.register_extension(trace("a", BreakpointKind::BeforeVariableSet)).unwrap();

    let report = engine.notify_detailed(&event(BreakpointKind::BeforeCommand)).await;
    assert_eq!(report.signal, Signal::Continue);
    assert!(report.invoked.is_empty());

    let signal = engine
        .notify(BreakpointKind::BeforeVariableSet, serde_json::json!({ "name": "x" }))
        .await;
    assert_eq!(signal, Signal::Break);
}

#[tokio::test]
async fn failing_trace_yields_error() {
    let failing = Callable::trace_fn(|_: &TraceEvent, _: Option<&ClientData>| {
        Err(VigilError::Internal("tracer crashed".into()))
    });
    let engine = engine_with(vec![
        trace_method("bad", failing),
        trace_method("never", signalling(Signal::Break)),
    ]);
    let bad = engine.register_extension(trace("bad", BreakpointKind::Test)).unwrap();
    engine.register_extension(trace("never", BreakpointKind::Test)).unwrap();

    let report = engine.notify_detailed(&event(BreakpointKind::Test)).await;
    assert_eq!(report.signal, Signal::Error);
    assert_eq!(report.responder, Some(bad));
    assert!(matches!(report.failure, Some(ExecError::CallableFailed(_))));
    assert_eq!(report.invoked.len(), 1);
}

#[tokio::test]
async fn disabled_trace_is_skipped() {
    let engine = engine_with(vec![trace_method("a", signalling(Signal::Break))]);
    let a = engine
        .register_extension(trace("a", BreakpointKind::AfterCommand).disabled())
        .unwrap();

    assert_eq!(
        engine.notify(BreakpointKind::AfterCommand, serde_json::Value::Null).await,
        Signal::Continue
    );
    engine.set_enabled(a, true).unwrap();
    assert_eq!(
        engine.notify(BreakpointKind::AfterCommand, serde_json::Value::Null).await,
        Signal::Break
    );
    assert_eq!(
        engine.metrics().trace_signals.get(&[("signal", "break")]),
        1
    );
}
