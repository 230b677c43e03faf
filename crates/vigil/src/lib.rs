//! Top-level facade crate for Vigil.
//!
//! Re-exports core types and the engine library so users can depend on a single crate.

pub mod core {
    pub use vigil_core::*;
}

pub mod engine {
    pub use vigil_engine::*;
}

pub use vigil_core::{Verdict, VigilError};
pub use vigil_engine::Engine;
