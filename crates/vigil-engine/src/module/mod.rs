//! Extension modules (capability providers) and the tables they publish.
//!
//! A module publishes a [`CodeUnit`] of named types and methods at load time.
//! The binder resolves descriptors against it with plain map lookups.

pub mod code_unit;
pub mod registry;

pub use code_unit::{
    bind_callable, resolve_method, resolve_type, Binding, Callable, ClientData, CodeUnit,
    MethodEntry, PolicyCallback, PolicyFn, TraceCallback, TraceFn, TypeEntry, Visibility,
};
pub use registry::{ExtensionModule, ModuleRegistry, StaticModule};
