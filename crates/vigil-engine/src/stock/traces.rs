use serde::Deserialize;

use vigil_core::error::Result;
use vigil_core::{Signal, TraceEvent};

use super::rules;
use crate::module::ClientData;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WatchRules {
    names: Vec<String>,
    #[serde(default = "default_watch_signal")]
    signal: Signal,
}

fn default_watch_signal() -> Signal {
    Signal::Break
}

/// Log every event and let evaluation continue.
pub fn log(event: &TraceEvent, _client_data: Option<&ClientData>) -> Result<Signal> {
    tracing::debug!(breakpoint = %event.kind, data = %event.data, "trace event");
    Ok(Signal::Continue)
}

/// Stop on access to a watched variable (event field `name`).
pub fn watch_variables(event: &TraceEvent, client_data: Option<&ClientData>) -> Result<Signal> {
    let rules: WatchRules = rules(client_data, "watch_variables")?;
    match event.field("name") {
        Some(name) if rules.names.iter().any(|n| n == name) => {
            tracing::info!(breakpoint = %event.kind, variable = %name, "watched variable hit");
            Ok(rules.signal)
        }
        _ => Ok(Signal::Continue),
    }
}
