//! Uniform, fault-isolating call wrapper around bound callables.
//!
//! Rules:
//! - Unbound => `ExecError::NotBound`, nothing is called.
//! - `Err` returns, panics, argument/signature mismatches and timeouts all
//!   become `ExecError::CallableFailed`; nothing escapes to the caller.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;

use vigil_core::{Ballot, ExecError, ExtensionKind, Signal, TraceEvent};

use super::binder::{panic_message, BoundCallable};
use crate::module::{Callable, ClientData};

/// Arguments for one invocation, shaped by extension kind.
pub enum InvokeArgs<'a> {
    Policy {
        ballot: &'a mut Ballot,
        client_data: Option<&'a ClientData>,
    },
    Trace {
        event: &'a TraceEvent,
        client_data: Option<&'a ClientData>,
    },
}

impl InvokeArgs<'_> {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            InvokeArgs::Policy { .. } => ExtensionKind::Policy,
            InvokeArgs::Trace { .. } => ExtensionKind::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutput {
    /// A policy ran to completion; its votes are on the ballot.
    Checked,
    /// A trace returned a signal.
    Signal(Signal),
}

#[derive(Debug, Clone, Default)]
pub struct Invoker {
    timeout: Option<Duration>,
}

impl Invoker {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Bound every call by `timeout`; a call that overruns is a failure.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn execute(
        &self,
        bound: Option<&BoundCallable>,
        args: InvokeArgs<'_>,
    ) -> Result<InvokeOutput, ExecError> {
        let Some(bound) = bound else {
            return Err(ExecError::NotBound);
        };

        match (&bound.callable, args) {
            (Callable::Policy(cb), InvokeArgs::Policy { ballot, client_data }) => self
                .guard(cb.check(ballot, client_data))
                .await
                .map(|()| InvokeOutput::Checked),
            (Callable::Trace(cb), InvokeArgs::Trace { event, client_data }) => self
                .guard(cb.trace(event, client_data))
                .await
                .map(InvokeOutput::Signal),
            (callable, args) => Err(ExecError::CallableFailed(format!(
                "{} callable invoked with {} arguments",
                callable.signature(),
                args.kind()
            ))),
        }
    }

    async fn guard<T, F>(&self, fut: F) -> Result<T, ExecError>
    where
        F: Future<Output = vigil_core::Result<T>>,
    {
        let caught = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, caught).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ExecError::CallableFailed(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                }
            },
            None => caught.await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExecError::CallableFailed(e.to_string())),
            Err(payload) => Err(ExecError::CallableFailed(format!(
                "panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}
