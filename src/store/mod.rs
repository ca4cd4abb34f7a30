//! Storage contracts consumed by the gate.
//!
//! The shared mutable store is an explicit dependency so tests can
//! substitute the in-memory implementation for the Postgres one.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrincipalStatus {
    Active,
    Blacklisted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipTier {
    Basic,
    Premium,
}

impl MembershipTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }
}

/// User identity as owned by the external store. The gate reads `status`
/// and reads/writes `quota`; everything else is a pass-through snapshot.
#[derive(Clone, Debug)]
pub struct Principal {
    pub subject_id: Uuid,
    pub name: String,
    pub credential_hash: String,
    pub status: PrincipalStatus,
    pub quota: i64,
    pub tier: MembershipTier,
}

/// Identifies a unique billable inference request: the exact
/// (subject, prompt, question-text) tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub subject_id: Uuid,
    pub prompt_id: Uuid,
    pub question: String,
}

impl Fingerprint {
    #[must_use]
    pub fn new(subject_id: Uuid, prompt_id: Uuid, question: impl Into<String>) -> Self {
        Self {
            subject_id,
            prompt_id,
            question: question.into(),
        }
    }

    /// Stable digest over the full tuple, used for lease keys and indexed
    /// storage lookups.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.subject_id.as_bytes());
        hasher.update(self.prompt_id.as_bytes());
        hasher.update(self.question.as_bytes());
        hasher.finalize().into()
    }
}

/// Outcome of the atomic persist-and-debit commit.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Answer stored and one quota unit debited.
    Committed,
    /// Another writer won the race; the stored answer is returned instead.
    Existing(String),
    /// No quota left; nothing was stored.
    QuotaExhausted,
}

#[async_trait]
pub trait GateStore: Send + Sync {
    /// Look up a principal by login name.
    async fn find_principal(&self, name: &str) -> Result<Option<Principal>>;

    async fn get_principal(&self, subject_id: Uuid) -> Result<Option<Principal>>;

    /// Fetch the system prompt content for `prompt_id`.
    async fn get_prompt(&self, prompt_id: Uuid) -> Result<Option<String>>;

    /// Look up a previously computed answer for the exact fingerprint.
    async fn find_answer(&self, fingerprint: &Fingerprint) -> Result<Option<String>>;

    /// Persist the answer and debit one quota unit together, both or
    /// neither. Creation must be unique per fingerprint: a concurrent
    /// duplicate resolves to [`CommitOutcome::Existing`] without a second
    /// debit.
    async fn commit_answer(&self, fingerprint: &Fingerprint, answer: &str)
        -> Result<CommitOutcome>;

    /// Bulk quota reset for every principal in `tier`; returns the number
    /// of principals updated. Invoked by the scheduled replenishment job.
    async fn reset_quota(&self, tier: MembershipTier, new_quota: i64) -> Result<u64>;
}
