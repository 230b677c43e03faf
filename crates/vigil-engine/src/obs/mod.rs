//! Lightweight in-process metrics.
//!
//! Exposes Prometheus-compatible counters for checks, votes, failures and
//! binding without pulling in an external metrics stack. Rendered on demand
//! by `Engine::render_metrics`.

pub mod metrics;

pub use metrics::EngineMetrics;
