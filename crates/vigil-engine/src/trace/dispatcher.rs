use std::sync::Arc;
use std::time::Instant;

use vigil_core::{BreakpointKind, ExecError, ExtensionId, ExtensionKind, Signal, TraceEvent};

use crate::extension::{ExtensionRegistry, InvokeArgs, InvokeOutput, Invoker};
use crate::obs::EngineMetrics;

/// Outcome of one `notify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceReport {
    pub signal: Signal,
    /// Traces actually invoked, in order.
    pub invoked: Vec<ExtensionId>,
    /// The trace whose non-`Continue` signal ended dispatch.
    pub responder: Option<ExtensionId>,
    /// Set when the responder failed rather than returning a signal.
    pub failure: Option<ExecError>,
}

/// Sequentially consults traces subscribed to a breakpoint kind.
///
/// Unlike policies, traces are not reduced: the first non-`Continue` signal
/// wins and later traces are skipped. A failing trace yields `Error`.
pub struct TraceDispatcher {
    extensions: Arc<ExtensionRegistry>,
    invoker: Invoker,
    metrics: Arc<EngineMetrics>,
}

impl TraceDispatcher {
    pub fn new(
        extensions: Arc<ExtensionRegistry>,
        invoker: Invoker,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            extensions,
            invoker,
            metrics,
        }
    }

    pub async fn notify(&self, kind: BreakpointKind, data: serde_json::Value) -> Signal {
        self.notify_detailed(&TraceEvent::new(kind, data)).await.signal
    }

    pub async fn notify_detailed(&self, event: &TraceEvent) -> TraceReport {
        let traces: Vec<_> = self
            .extensions
            .active(ExtensionKind::Trace)
            .into_iter()
            .filter(|ext| ext.descriptor().listens_to(event.kind))
            .collect();

        let mut report = TraceReport {
            signal: Signal::Continue,
            invoked: Vec::with_capacity(traces.len()),
            responder: None,
            failure: None,
        };

        for ext in traces {
            let bound = ext.bound();
            if bound.is_none() && ext.is_retired() {
                continue;
            }
            report.invoked.push(ext.id());

            let started = Instant::now();
            let result = self
                .invoker
                .execute(
                    bound.as_ref(),
                    InvokeArgs::Trace {
                        event,
                        client_data: ext.descriptor().client_data.as_ref(),
                    },
                )
                .await;
            self.metrics
                .invoke_duration
                .observe(&[("kind", "trace")], started.elapsed());

            let signal = match result {
                Ok(InvokeOutput::Signal(signal)) => signal,
                Ok(InvokeOutput::Checked) => {
                    // policy output from a trace slot: treat as a failure
                    report.failure = Some(ExecError::CallableFailed(
                        "trace returned no signal".into(),
                    ));
                    Signal::Error
                }
                Err(error) => {
                    match &error {
                        ExecError::NotBound => tracing::error!(
                            extension = %ext.id(),
                            name = %ext.name(),
                            breakpoint = %event.kind,
                            "trace notified before it was bound"
                        ),
                        ExecError::CallableFailed(detail) => tracing::warn!(
                            extension = %ext.id(),
                            name = %ext.name(),
                            breakpoint = %event.kind,
                            detail = %detail,
                            "trace failed"
                        ),
                    }
                    report.failure = Some(error);
                    Signal::Error
                }
            };

            if !signal.is_continue() {
                tracing::debug!(
                    extension = %ext.id(),
                    breakpoint = %event.kind,
                    signal = signal.as_str(),
                    "trace stopped dispatch"
                );
                self.metrics.trace_signals.inc(&[("signal", signal.as_str())]);
                report.signal = signal;
                report.responder = Some(ext.id());
                return report;
            }
        }

        self.metrics
            .trace_signals
            .inc(&[("signal", Signal::Continue.as_str())]);
        report
    }
}
