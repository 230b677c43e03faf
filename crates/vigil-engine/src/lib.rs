//! Vigil engine library entry.
//!
//! Wires the module registry, binder, invoker, policy coordinator and trace
//! dispatcher behind the `Engine` facade. Consumed by the demo binary
//! (`main.rs`) and by integration tests.

pub mod config;
pub mod engine;
pub mod extension;
pub mod module;
pub mod obs;
pub mod policy;
pub mod stock;
pub mod trace;

pub use engine::{Engine, EngineSettings};
