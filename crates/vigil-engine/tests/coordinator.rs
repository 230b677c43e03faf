//! Policy coordination and sticky-denial reduction.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use vigil_core::{Ballot, ExecError, Verdict, Vote};
use vigil_engine::extension::ExtensionDescriptor;
use vigil_engine::module::{Callable, ClientData};

mod fixtures;
use fixtures::{
    abstaining, approve_then_fail, approving, args, denying, engine_with, policy_method,
    TEST_MODULE,
};

fn policy(method: &str) -> ExtensionDescriptor {
    ExtensionDescriptor::policy(method, TEST_MODULE, "Hooks", method)
}

#[tokio::test]
async fn no_policies_applies_default() {
    let engine = engine_with(vec![]);
    assert_eq!(engine.check_operation("clock", &args(&["format"])).await, Verdict::DefaultApplied);
}

#[tokio::test]
async fn approval_then_denial_is_denied() {
    let engine = engine_with(vec![
        policy_method("approve", approving("fine by me")),
        policy_method("deny", denying("not today")),
    ]);
    engine.register_extension(policy("approve")).unwrap();
    engine.register_extension(policy("deny")).unwrap();

    let report = engine.check_detailed("clock", &args(&["format"])).await;
    assert_eq!(report.verdict, Verdict::Denied);
    assert_eq!(report.votes.len(), 2);
    assert_eq!(report.deny_reasons(), vec!["not today"]);
    assert_eq!(report.denial_message(), "clock: not today");
}

#[tokio::test]
async fn approvals_alone_allow() {
    let engine = engine_with(vec![
        policy_method("approve", approving("yes")),
        policy_method("abstain", abstaining()),
    ]);
    engine.register_extension(policy("approve")).unwrap();
    engine.register_extension(policy("abstain")).unwrap();

    assert_eq!(engine.check_operation("clock", &[]).await, Verdict::Allowed);
}

#[tokio::test]
async fn failing_policy_abstains_completely() {
    let engine = engine_with(vec![policy_method("flaky", approve_then_fail())]);
    let id = engine.register_extension(policy("flaky")).unwrap();

    let report = engine.check_detailed("clock", &[]).await;
    assert_eq!(report.verdict, Verdict::DefaultApplied);
    assert!(report.votes.is_empty(), "partial votes must be discarded");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].extension, id);
    assert!(matches!(report.failures[0].error, ExecError::CallableFailed(_)));

    let metrics = engine.metrics();
    assert_eq!(metrics.policy_failures.get(&[("reason", "CALLABLE_FAILED")]), 1);
    assert_eq!(metrics.checks.get(&[("verdict", "default_applied")]), 1);
}

#[tokio::test]
async fn unbound_policy_is_reported_not_fatal() {
    let engine = engine_with(vec![policy_method("approve", approving("yes"))]);
    let err = engine
        .register_extension(policy("missing"))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "NOT_FOUND");
    engine.register_extension(policy("approve")).unwrap();

    let report = engine.check_detailed("clock", &[]).await;
    assert_eq!(report.verdict, Verdict::Allowed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error, ExecError::NotBound);
}

#[tokio::test]
async fn disabled_policies_are_skipped() {
    let engine = engine_with(vec![
        policy_method("approve", approving("yes")),
        policy_method("deny", denying("no")),
    ]);
    engine.register_extension(policy("approve")).unwrap();
    let deny = engine.register_extension(policy("deny").disabled()).unwrap();

    assert_eq!(engine.check_operation("clock", &[]).await, Verdict::Allowed);

    engine.set_enabled(deny, true).unwrap();
    assert_eq!(engine.check_operation("clock", &[]).await, Verdict::Denied);
}

#[tokio::test]
async fn policies_run_in_registration_order() {
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let recorder = |tag: &'static str| {
        let seen = Arc::clone(&seen);
        Callable::policy_fn(move |_: &mut Ballot, _: Option<&ClientData>| {
            seen.lock().unwrap().push(tag);
            Ok(())
        })
    };
    let engine = engine_with(vec![
        policy_method("first", recorder("first")),
        policy_method("second", recorder("second")),
        policy_method("third", recorder("third")),
    ]);
    for name in ["second", "third", "first"] {
        engine.register_extension(policy(name)).unwrap();
    }

    engine.check_operation("clock", &[]).await;
    assert_eq!(*seen.lock().unwrap(), vec!["second", "third", "first"]);
}

#[tokio::test]
async fn policies_see_operation_and_args() {
    let inspect = Callable::policy_fn(|ballot: &mut Ballot, _: Option<&ClientData>| {
        if ballot.operation().name == "file" && ballot.args() == ["delete".to_string()] {
            ballot.deny("file delete is off limits");
        } else {
            ballot.approve("harmless");
        }
        Ok(())
    });
    let engine = engine_with(vec![policy_method("inspect", inspect)]);
    engine.register_extension(policy("inspect")).unwrap();

    assert_eq!(engine.check_operation("file", &args(&["delete"])).await, Verdict::Denied);
    assert_eq!(engine.check_operation("file", &args(&["exists"])).await, Verdict::Allowed);

    let report = engine.check_detailed("file", &args(&["exists"])).await;
    assert!(report.votes.iter().all(|v| v.vote == Vote::Approved));
}

#[tokio::test]
async fn authorize_resolves_default_with_settings() {
    let engine = engine_with(vec![policy_method("deny", denying("clock format is locked"))]);

    let err = engine.authorize("clock", &[]).await.unwrap_err();
    assert_eq!(err.code().as_str(), "DENIED");

    engine.register_extension(policy("deny")).unwrap();
    let err = engine.authorize("clock", &[]).await.unwrap_err();
    assert!(err.to_string().contains("clock format is locked"), "{err}");
}

struct Nested {
    engine: std::sync::OnceLock<vigil_engine::Engine>,
}

#[async_trait::async_trait]
impl vigil_engine::module::PolicyCallback for Nested {
    async fn check(&self, ballot: &mut Ballot, _: Option<&ClientData>) -> vigil_core::Result<()> {
        if ballot.operation().name != "outer" {
            return Ok(());
        }
        let engine = self.engine.get().expect("engine set");
        match engine.check_operation("inner", &[]).await {
            Verdict::Denied => ballot.deny("inner operation is denied"),
            _ => ballot.approve("inner operation is fine"),
        }
        Ok(())
    }
}

#[tokio::test]
async fn nested_check_uses_its_own_context() {
    let nested = Arc::new(Nested {
        engine: std::sync::OnceLock::new(),
    });
    let inner_denier = Callable::policy_fn(|ballot: &mut Ballot, _: Option<&ClientData>| {
        if ballot.operation().name == "inner" {
            ballot.deny("no inner");
        }
        Ok(())
    });
    let engine = engine_with(vec![
        policy_method("nested", Callable::Policy(nested.clone())),
        policy_method("inner", inner_denier),
    ]);
    nested.engine.set(engine.clone()).ok().unwrap();
    engine.register_extension(policy("nested")).unwrap();
    engine.register_extension(policy("inner")).unwrap();

    let report = engine.check_detailed("outer", &[]).await;
    assert_eq!(report.verdict, Verdict::Denied);
    // only the outer check's votes; the nested check kept its own
    assert_eq!(report.deny_reasons(), vec!["inner operation is denied"]);
}

struct Slow;

#[async_trait::async_trait]
impl vigil_engine::module::PolicyCallback for Slow {
    async fn check(&self, ballot: &mut Ballot, _: Option<&ClientData>) -> vigil_core::Result<()> {
        ballot.deny("too late to count");
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok(())
    }
}

#[tokio::test]
async fn timed_out_policy_abstains() {
    let engine = vigil_engine::Engine::new(vigil_engine::EngineSettings {
        invoke_timeout: Some(std::time::Duration::from_millis(20)),
        ..Default::default()
    });
    engine
        .load_module(fixtures::module(vec![
            policy_method("slow", Callable::policy(Slow)),
            policy_method("approve", approving("yes")),
        ]))
        .unwrap();
    engine.register_extension(policy("slow")).unwrap();
    engine.register_extension(policy("approve")).unwrap();

    let report = engine.check_detailed("clock", &[]).await;
    assert_eq!(report.verdict, Verdict::Allowed);
    assert_eq!(report.failures.len(), 1);
}

struct Remover {
    engine: std::sync::OnceLock<vigil_engine::Engine>,
    victim: std::sync::OnceLock<vigil_core::ExtensionId>,
}

#[async_trait::async_trait]
impl vigil_engine::module::PolicyCallback for Remover {
    async fn check(&self, ballot: &mut Ballot, _: Option<&ClientData>) -> vigil_core::Result<()> {
        if let (Some(engine), Some(victim)) = (self.engine.get(), self.victim.get()) {
            let _ = engine.unregister_extension(*victim);
        }
        ballot.approve("removed the next policy");
        Ok(())
    }
}

#[tokio::test]
async fn policy_unregistered_mid_check_is_skipped() {
    let remover = Arc::new(Remover {
        engine: std::sync::OnceLock::new(),
        victim: std::sync::OnceLock::new(),
    });
    let engine = engine_with(vec![
        policy_method("remover", Callable::Policy(remover.clone())),
        policy_method("victim", denying("should never vote")),
    ]);
    engine.register_extension(policy("remover")).unwrap();
    let victim = engine.register_extension(policy("victim")).unwrap();
    remover.engine.set(engine.clone()).ok().unwrap();
    remover.victim.set(victim).unwrap();

    let report = engine.check_detailed("clock", &[]).await;
    assert_eq!(report.verdict, Verdict::Allowed);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(engine.extension(victim).is_none());
}
