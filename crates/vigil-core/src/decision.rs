//! Vote protocol for one privileged-operation check.
//!
//! Policies cast `Approved`/`Denied` votes into a [`DecisionContext`] through
//! a [`Ballot`]. The verdict is a fold over the recorded votes:
//! - any `Denied` vote => `Denied` (sticky, absorbs every approval)
//! - otherwise any `Approved` vote => `Allowed`
//! - no votes => `DefaultApplied` (the host default governs)
//!
//! A context belongs to exactly one check and is dropped after the verdict
//! is taken. Nested checks build their own context.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::id::ExtensionId;

/// A single policy vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Approved,
    Denied,
}

impl Vote {
    pub fn as_str(self) -> &'static str {
        match self {
            Vote::Approved => "approved",
            Vote::Denied => "denied",
        }
    }
}

/// Final outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    Denied,
    /// Nobody voted; the host's configured default decides.
    DefaultApplied,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Denied => "denied",
            Verdict::DefaultApplied => "default_applied",
        }
    }

    /// Collapse to allow/deny given the host default for `DefaultApplied`.
    pub fn resolve(self, allow_by_default: bool) -> bool {
        match self {
            Verdict::Allowed => true,
            Verdict::Denied => false,
            Verdict::DefaultApplied => allow_by_default,
        }
    }
}

/// One recorded vote. Kept for audit even when a later vote disagrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub voter: ExtensionId,
    pub vote: Vote,
    pub reason: String,
}

/// Reduce a vote sequence to a verdict.
///
/// Pure and order-independent: the accumulator only ever moves towards
/// `Denied`, so any permutation of the same votes folds to the same value.
pub fn reduce<'a>(votes: impl IntoIterator<Item = &'a VoteRecord>) -> Verdict {
    votes
        .into_iter()
        .fold(Verdict::DefaultApplied, |acc, record| match (acc, record.vote) {
            (Verdict::Denied, _) | (_, Vote::Denied) => Verdict::Denied,
            (_, Vote::Approved) => Verdict::Allowed,
        })
}

/// The operation being authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub name: String,
    pub args: Vec<String>,
}

impl Operation {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// First argument, which ensemble-style commands use as the sub-command.
    pub fn sub_command(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Per-check vote accumulator.
#[derive(Debug)]
pub struct DecisionContext {
    operation: Arc<Operation>,
    votes: Vec<VoteRecord>,
}

impl DecisionContext {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation: Arc::new(operation),
            votes: Vec::new(),
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn approve(&mut self, voter: ExtensionId, reason: impl Into<String>) {
        self.record(voter, Vote::Approved, reason.into());
    }

    pub fn deny(&mut self, voter: ExtensionId, reason: impl Into<String>) {
        self.record(voter, Vote::Denied, reason.into());
    }

    fn record(&mut self, voter: ExtensionId, vote: Vote, reason: String) {
        self.votes.push(VoteRecord {
            voter,
            vote,
            reason,
        });
    }

    pub fn votes(&self) -> &[VoteRecord] {
        &self.votes
    }

    pub fn into_votes(self) -> Vec<VoteRecord> {
        self.votes
    }

    pub fn verdict(&self) -> Verdict {
        reduce(&self.votes)
    }

    /// Reasons attached to `Denied` votes, in recording order.
    pub fn deny_reasons(&self) -> Vec<&str> {
        self.votes
            .iter()
            .filter(|r| r.vote == Vote::Denied)
            .map(|r| r.reason.as_str())
            .collect()
    }

    /// Open a ballot for one policy invocation.
    pub fn ballot(&self, voter: ExtensionId) -> Ballot {
        Ballot {
            voter,
            operation: Arc::clone(&self.operation),
            pending: Vec::new(),
        }
    }

    /// Append a finished ballot's votes. Only called for policies whose
    /// invocation succeeded; a failed policy's ballot is dropped unread.
    pub fn commit(&mut self, ballot: Ballot) {
        self.votes.extend(ballot.pending);
    }

    /// One-line audit summary for debug logging.
    pub fn summary(&self) -> String {
        let approved = self
            .votes
            .iter()
            .filter(|r| r.vote == Vote::Approved)
            .count();
        let denied = self.votes.len() - approved;
        let mut out = format!(
            "operation={:?} approved={approved} denied={denied} verdict={}",
            self.operation.to_string(),
            self.verdict().as_str()
        );
        let reasons = self.deny_reasons();
        if !reasons.is_empty() {
            out.push_str(&format!(" reasons={reasons:?}"));
        }
        out
    }
}

/// A policy's voting handle for one check.
///
/// Votes stay pending until the coordinator commits the ballot.
#[derive(Debug)]
pub struct Ballot {
    voter: ExtensionId,
    operation: Arc<Operation>,
    pending: Vec<VoteRecord>,
}

impl Ballot {
    pub fn voter(&self) -> ExtensionId {
        self.voter
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn args(&self) -> &[String] {
        &self.operation.args
    }

    pub fn approve(&mut self, reason: impl Into<String>) {
        self.push(Vote::Approved, reason.into());
    }

    pub fn deny(&mut self, reason: impl Into<String>) {
        self.push(Vote::Denied, reason.into());
    }

    fn push(&mut self, vote: Vote, reason: String) {
        self.pending.push(VoteRecord {
            voter: self.voter,
            vote,
            reason,
        });
    }

    pub fn pending(&self) -> &[VoteRecord] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    fn op() -> Operation {
        Operation::new("exec", vec!["ls".into()])
    }

    fn arb_votes(min: usize, max: usize) -> impl Strategy<Value = Vec<Vote>> {
        prop::collection::vec(prop_oneof![Just(Vote::Approved), Just(Vote::Denied)], min..max)
    }

    fn records(votes: &[Vote]) -> Vec<VoteRecord> {
        let voter = ExtensionId::new();
        votes
            .iter()
            .map(|&vote| VoteRecord {
                voter,
                vote,
                reason: String::new(),
            })
            .collect()
    }

    #[test]
    fn empty_context_applies_default() {
        let ctx = DecisionContext::new(op());
        assert_eq!(ctx.verdict(), Verdict::DefaultApplied);
        assert!(ctx.verdict().resolve(true));
        assert!(!ctx.verdict().resolve(false));
    }

    #[test]
    fn deny_after_approve_by_same_voter_is_kept() {
        let voter = ExtensionId::new();
        let mut ctx = DecisionContext::new(op());
        ctx.approve(voter, "looks fine");
        ctx.deny(voter, "changed my mind");
        assert_eq!(ctx.votes().len(), 2);
        assert_eq!(ctx.verdict(), Verdict::Denied);
        assert_eq!(ctx.deny_reasons(), vec!["changed my mind"]);
    }

    #[test]
    fn ballot_votes_only_land_on_commit() {
        let mut ctx = DecisionContext::new(op());
        let mut ballot = ctx.ballot(ExtensionId::new());
        ballot.deny("no");
        assert_eq!(ballot.operation().name, "exec");
        assert_eq!(ctx.verdict(), Verdict::DefaultApplied);

        let dropped = ctx.ballot(ExtensionId::new());
        drop(dropped);
        ctx.commit(ballot);
        assert_eq!(ctx.verdict(), Verdict::Denied);
    }

    #[test]
    fn summary_lists_deny_reasons() {
        let mut ctx = DecisionContext::new(op());
        ctx.approve(ExtensionId::new(), "ok");
        ctx.deny(ExtensionId::new(), "exec disabled");
        let s = ctx.summary();
        assert!(s.contains("approved=1 denied=1"), "{s}");
        assert!(s.contains("exec disabled"), "{s}");
    }

    proptest! {
        #[test]
        fn denial_absorbs(mut votes in arb_votes(0, 16), at in 0usize..16) {
            let at = at.min(votes.len());
            votes.insert(at, Vote::Denied);
            prop_assert_eq!(reduce(&records(&votes)), Verdict::Denied);
        }

        #[test]
        fn approvals_without_denial_allow(n in 1usize..16) {
            let votes = vec![Vote::Approved; n];
            prop_assert_eq!(reduce(&records(&votes)), Verdict::Allowed);
        }

        #[test]
        fn reduction_is_order_independent(votes in arb_votes(0, 16), seed in any::<u64>()) {
            let forward = records(&votes);
            let mut shuffled = forward.clone();
            // deterministic permutation driven by the seed
            let len = shuffled.len();
            if len > 1 {
                for i in 0..len {
                    let j = (seed as usize).wrapping_add(i * 7) % len;
                    shuffled.swap(i, j);
                }
            }
            shuffled.reverse();
            prop_assert_eq!(reduce(&forward), reduce(&shuffled));
        }

        #[test]
        fn reduction_is_idempotent(votes in arb_votes(0, 16)) {
            let recs = records(&votes);
            let first = reduce(&recs);
            prop_assert_eq!(first, reduce(&recs));
            let mut ctx = DecisionContext::new(op());
            let mut ballot = ctx.ballot(ExtensionId::new());
            for v in &votes {
                match v {
                    Vote::Approved => ballot.approve("a"),
                    Vote::Denied => ballot.deny("d"),
                }
            }
            ctx.commit(ballot);
            prop_assert_eq!(ctx.verdict(), first);
            prop_assert_eq!(ctx.verdict(), ctx.verdict());
        }
    }
}
