//! Extension descriptors, Setup (binding), invocation and the registry of
//! registered extensions.

pub mod binder;
pub mod descriptor;
pub mod invoker;
pub mod registry;

pub use binder::{Binder, BoundCallable};
pub use descriptor::ExtensionDescriptor;
pub use invoker::{InvokeArgs, InvokeOutput, Invoker};
pub use registry::{Extension, ExtensionRegistry};
