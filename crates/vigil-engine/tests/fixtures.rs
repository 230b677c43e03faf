//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use vigil_core::{Ballot, CapabilityFlags, Signal, TraceEvent, VigilError};
use vigil_engine::module::{Callable, ClientData, CodeUnit, ExtensionModule, MethodEntry, StaticModule, TypeEntry};
use vigil_engine::{Engine, EngineSettings};

pub const TEST_MODULE: &str = "test.module";

pub fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

pub fn approving(reason: &'static str) -> Callable {
    Callable::policy_fn(move |ballot: &mut Ballot, _: Option<&ClientData>| {
        ballot.approve(reason);
        Ok(())
    })
}

pub fn denying(reason: &'static str) -> Callable {
    Callable::policy_fn(move |ballot: &mut Ballot, _: Option<&ClientData>| {
        ballot.deny(reason);
        Ok(())
    })
}

pub fn abstaining() -> Callable {
    Callable::policy_fn(|_: &mut Ballot, _: Option<&ClientData>| Ok(()))
}

/// Approves, then fails; the approval must not count.
pub fn approve_then_fail() -> Callable {
    Callable::policy_fn(|ballot: &mut Ballot, _: Option<&ClientData>| {
        ballot.approve("half done");
        Err(VigilError::Internal("policy blew up".into()))
    })
}

pub fn signalling(signal: Signal) -> Callable {
    Callable::trace_fn(move |_: &TraceEvent, _: Option<&ClientData>| Ok(signal))
}

pub fn policy_method(name: &str, callable: Callable) -> MethodEntry {
    MethodEntry::new(name, CapabilityFlags::COMMAND_POLICY, callable)
}

pub fn trace_method(name: &str, callable: Callable) -> MethodEntry {
    MethodEntry::new(name, CapabilityFlags::TRACE, callable)
}

/// `test.module` publishing one type `Hooks` with the given methods.
pub fn module(methods: Vec<MethodEntry>) -> Arc<dyn ExtensionModule> {
    let ty = methods
        .into_iter()
        .fold(TypeEntry::new("Hooks"), |ty, m| ty.method(m));
    Arc::new(StaticModule::new(TEST_MODULE, CodeUnit::new(TEST_MODULE).with_type(ty)))
}

pub fn engine_with(methods: Vec<MethodEntry>) -> Engine {
    let engine = Engine::new(EngineSettings::default());
    engine.load_module(module(methods)).unwrap();
    engine
}
