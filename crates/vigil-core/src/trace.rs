//! Breakpoint events and trace signals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of evaluation event a trace subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    BeforeCommand,
    AfterCommand,
    BeforeVariableGet,
    BeforeVariableSet,
    BeforeVariableUnset,
    BeforeProcedureBody,
    AfterProcedureBody,
    BeforeLambdaBody,
    AfterLambdaBody,
    Test,
}

impl BreakpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakpointKind::BeforeCommand => "before_command",
            BreakpointKind::AfterCommand => "after_command",
            BreakpointKind::BeforeVariableGet => "before_variable_get",
            BreakpointKind::BeforeVariableSet => "before_variable_set",
            BreakpointKind::BeforeVariableUnset => "before_variable_unset",
            BreakpointKind::BeforeProcedureBody => "before_procedure_body",
            BreakpointKind::AfterProcedureBody => "after_procedure_body",
            BreakpointKind::BeforeLambdaBody => "before_lambda_body",
            BreakpointKind::AfterLambdaBody => "after_lambda_body",
            BreakpointKind::Test => "test",
        }
    }
}

impl fmt::Display for BreakpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trace's per-invocation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Consult the next trace.
    Continue,
    /// Abort evaluation with an error.
    Error,
    /// Stop evaluation at this point.
    Break,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Continue => "continue",
            Signal::Error => "error",
            Signal::Break => "break",
        }
    }

    pub fn is_continue(self) -> bool {
        matches!(self, Signal::Continue)
    }
}

/// One breakpoint event raised by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub kind: BreakpointKind,
    /// Host-defined payload (e.g. `{"name": "x", "value": "1"}`).
    pub data: serde_json::Value,
}

impl TraceEvent {
    pub fn new(kind: BreakpointKind, data: serde_json::Value) -> Self {
        Self { kind, data }
    }

    /// String field of an object payload, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}
