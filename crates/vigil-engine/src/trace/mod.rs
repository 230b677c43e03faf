//! Trace layer: consult subscribed traces for one breakpoint event.

pub mod dispatcher;

pub use dispatcher::{TraceDispatcher, TraceReport};
