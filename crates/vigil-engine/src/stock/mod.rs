//! Built-in extension module.
//!
//! Ships ready-made command policies and traces configured entirely through
//! JSON client data, so hosts can enforce common rules without writing a
//! module of their own.

pub mod policies;
pub mod traces;

use serde::de::DeserializeOwned;

use vigil_core::error::{Result, VigilError};
use vigil_core::CapabilityFlags;

use crate::module::{Callable, ClientData, CodeUnit, MethodEntry, StaticModule, TypeEntry};

/// Module id of the built-in module.
pub const STOCK_MODULE: &str = "vigil.stock";

pub fn stock_module() -> StaticModule {
    let policy = CapabilityFlags::COMMAND_POLICY | CapabilityFlags::SYSTEM;
    let trace = CapabilityFlags::TRACE | CapabilityFlags::SYSTEM;

    let unit = CodeUnit::new(STOCK_MODULE)
        .with_type(
            TypeEntry::new("CommandPolicies")
                .method(MethodEntry::new(
                    "allow_subcommands",
                    policy,
                    Callable::policy_fn(policies::allow_subcommands),
                ))
                .method(MethodEntry::new(
                    "deny_subcommands",
                    policy,
                    Callable::policy_fn(policies::deny_subcommands),
                ))
                .method(MethodEntry::new(
                    "deny_commands",
                    policy,
                    Callable::policy_fn(policies::deny_commands),
                ))
                .method(MethodEntry::new(
                    "allow_directories",
                    policy,
                    Callable::policy_fn(policies::allow_directories),
                ))
                .method(MethodEntry::new(
                    "deny_directories",
                    policy,
                    Callable::policy_fn(policies::deny_directories),
                ))
                .method(MethodEntry::new(
                    "allow_uris",
                    policy,
                    Callable::policy_fn(policies::allow_uris),
                ))
                .method(MethodEntry::new(
                    "deny_uris",
                    policy,
                    Callable::policy_fn(policies::deny_uris),
                )),
        )
        .with_type(
            TypeEntry::new("Traces")
                .method(MethodEntry::new("log", trace, Callable::trace_fn(traces::log)))
                .method(MethodEntry::new(
                    "watch_variables",
                    trace,
                    Callable::trace_fn(traces::watch_variables),
                )),
        );

    StaticModule::new(STOCK_MODULE, unit)
}

/// Decode a stock extension's JSON client data into its rule set.
fn rules<T: DeserializeOwned>(client_data: Option<&ClientData>, method: &str) -> Result<T> {
    let value = client_data
        .and_then(|d| d.downcast_ref::<serde_json::Value>())
        .ok_or_else(|| VigilError::BadRequest(format!("{method}: client data must be JSON")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| VigilError::BadRequest(format!("{method}: invalid client data: {e}")))
}
