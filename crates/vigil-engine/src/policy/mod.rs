//! Policy layer: consult every active policy for one privileged operation
//! and reduce their votes to a verdict.

pub mod coordinator;

pub use coordinator::{CheckReport, PolicyCoordinator, PolicyFailure};
