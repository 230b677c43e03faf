use std::sync::Arc;
use std::time::Instant;

use vigil_core::{
    DecisionContext, ExecError, ExtensionId, ExtensionKind, Operation, Verdict, Vote, VoteRecord,
};

use crate::extension::{ExtensionRegistry, InvokeArgs, Invoker};
use crate::obs::EngineMetrics;

/// A policy that could not take part in a check; it counted as abstaining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFailure {
    pub extension: ExtensionId,
    pub name: String,
    pub error: ExecError,
}

/// Everything one check produced.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub operation: Operation,
    pub verdict: Verdict,
    pub votes: Vec<VoteRecord>,
    pub failures: Vec<PolicyFailure>,
}

impl CheckReport {
    pub fn deny_reasons(&self) -> Vec<&str> {
        self.votes
            .iter()
            .filter(|v| v.vote == Vote::Denied)
            .map(|v| v.reason.as_str())
            .collect()
    }

    /// Combined deny reasons, used as the operation's failure message.
    pub fn denial_message(&self) -> String {
        let reasons: Vec<&str> = self
            .deny_reasons()
            .into_iter()
            .filter(|r| !r.is_empty())
            .collect();
        if reasons.is_empty() {
            format!("{} denied by policy", self.operation.name)
        } else {
            format!("{}: {}", self.operation.name, reasons.join("; "))
        }
    }
}

/// Runs the registered policies for one operation.
///
/// Each check gets its own `DecisionContext`; the registry lock is held only
/// while taking the snapshot, never during a policy call. A policy may
/// therefore start a nested check from inside its callback.
pub struct PolicyCoordinator {
    extensions: Arc<ExtensionRegistry>,
    invoker: Invoker,
    metrics: Arc<EngineMetrics>,
}

impl PolicyCoordinator {
    pub fn new(
        extensions: Arc<ExtensionRegistry>,
        invoker: Invoker,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            extensions,
            invoker,
            metrics,
        }
    }

    pub async fn check_operation(&self, operation: &str, args: &[String]) -> Verdict {
        self.check_detailed(operation, args).await.verdict
    }

    pub async fn check_detailed(&self, operation: &str, args: &[String]) -> CheckReport {
        let mut ctx = DecisionContext::new(Operation::new(operation, args.to_vec()));
        let mut failures = Vec::new();

        for ext in self.extensions.active(ExtensionKind::Policy) {
            let bound = ext.bound();
            if bound.is_none() && ext.is_retired() {
                // unregistered after the snapshot was taken
                continue;
            }
            let mut ballot = ctx.ballot(ext.id());

            let started = Instant::now();
            let result = self
                .invoker
                .execute(
                    bound.as_ref(),
                    InvokeArgs::Policy {
                        ballot: &mut ballot,
                        client_data: ext.descriptor().client_data.as_ref(),
                    },
                )
                .await;
            self.metrics
                .invoke_duration
                .observe(&[("kind", "policy")], started.elapsed());

            match result {
                Ok(_) => {
                    for record in ballot.pending() {
                        self.metrics.votes.inc(&[("vote", record.vote.as_str())]);
                    }
                    ctx.commit(ballot);
                }
                Err(error) => {
                    match &error {
                        ExecError::NotBound => tracing::error!(
                            extension = %ext.id(),
                            name = %ext.name(),
                            operation = %operation,
                            "policy consulted before it was bound; counted as abstaining"
                        ),
                        ExecError::CallableFailed(detail) => tracing::warn!(
                            extension = %ext.id(),
                            name = %ext.name(),
                            operation = %operation,
                            detail = %detail,
                            "policy failed; counted as abstaining"
                        ),
                    }
                    self.metrics
                        .policy_failures
                        .inc(&[("reason", error.code().as_str())]);
                    failures.push(PolicyFailure {
                        extension: ext.id(),
                        name: ext.name().to_string(),
                        error,
                    });
                }
            }
        }

        let verdict = ctx.verdict();
        tracing::debug!(summary = %ctx.summary(), "policy check complete");
        self.metrics.checks.inc(&[("verdict", verdict.as_str())]);

        CheckReport {
            operation: ctx.operation().clone(),
            verdict,
            votes: ctx.into_votes(),
            failures,
        }
    }
}
