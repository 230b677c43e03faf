//! Vigil core: identities, flags, error taxonomy and the vote protocol.
//!
//! This crate defines the contracts shared by the engine, extension modules
//! and hosts. It carries no runtime dependencies so extension authors can
//! depend on it without pulling in the engine.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `VigilError`/`Result` so a host never
//! crashes on a misconfigured or misbehaving extension.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod decision;
pub mod error;
pub mod flags;
pub mod id;
pub mod trace;

/// Shared result type.
pub use error::{BindError, ErrorCode, ExecError, Result, VigilError};
pub use decision::{Ballot, DecisionContext, Operation, Verdict, Vote, VoteRecord};
pub use flags::{CapabilityFlags, ExtensionFlags, LookupFlags};
pub use id::{ExtensionId, ExtensionKind, ModuleId};
pub use trace::{BreakpointKind, Signal, TraceEvent};
