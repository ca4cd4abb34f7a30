//! Quota-gated answer cache.
//!
//! A cache hit is a correctness shortcut, not just a performance one: it is
//! what guarantees idempotent quota consumption for repeated identical
//! questions. The entry is a persisted record, never evicted here.

use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::AskError;
use crate::provider::Provider;
use crate::store::{CommitOutcome, Fingerprint, GateStore};

/// Where a resolved answer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerSource {
    Cached,
    Computed,
}

/// Serializes concurrent identical requests and drives the
/// lookup → quota check → compute → persist-and-debit sequence.
#[derive(Debug, Default)]
pub struct AnswerCache {
    leases: Mutex<HashMap<[u8; 32], Arc<Mutex<()>>>>,
}

impl AnswerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-fingerprint mutual exclusion: the second caller for the same
    /// fingerprint waits for the first's result and then takes the
    /// cache-hit path. Leases with no remaining holder are dropped.
    async fn lease(&self, key: [u8; 32]) -> Arc<Mutex<()>> {
        let mut leases = self.leases.lock().await;
        leases.retain(|_, lease| Arc::strong_count(lease) > 1);
        Arc::clone(leases.entry(key).or_default())
    }

    /// Resolve `fingerprint` to an answer.
    ///
    /// A hit consumes no quota and never calls the provider. On a miss the
    /// quota is checked before the provider is invoked, and debited only
    /// together with the persisted entry. Provider failures and caller
    /// cancellation before the commit leave no state behind.
    ///
    /// # Errors
    ///
    /// [`AskError::QuotaExhausted`], [`AskError::PromptNotFound`],
    /// [`AskError::Upstream`] on compute failure, and
    /// [`AskError::AnswerNotSaved`] when the computed answer could not be
    /// persisted (quota stays untouched).
    pub async fn resolve(
        &self,
        store: &dyn GateStore,
        provider: &dyn Provider,
        fingerprint: &Fingerprint,
    ) -> Result<(String, AnswerSource), AskError> {
        let lease = self.lease(fingerprint.digest()).await;
        let _guard = lease.lock().await;

        if let Some(answer) = store.find_answer(fingerprint).await? {
            return Ok((answer, AnswerSource::Cached));
        }

        let principal = store
            .get_principal(fingerprint.subject_id)
            .await?
            .ok_or_else(|| {
                AskError::Internal(anyhow!("unknown subject {}", fingerprint.subject_id))
            })?;
        if principal.quota <= 0 {
            return Err(AskError::QuotaExhausted);
        }

        let prompt = store
            .get_prompt(fingerprint.prompt_id)
            .await?
            .ok_or(AskError::PromptNotFound)?;

        // Nothing has been mutated yet; a compute failure leaves the
        // request fully retryable.
        let answer = provider.compute(&prompt, &fingerprint.question).await?;

        match store.commit_answer(fingerprint, &answer).await {
            Ok(CommitOutcome::Committed) => {
                info!(subject = %fingerprint.subject_id, "answer computed and quota debited");
                Ok((answer, AnswerSource::Computed))
            }
            // Compare-and-swap backstop: another process created the entry
            // between our lookup and commit.
            Ok(CommitOutcome::Existing(existing)) => Ok((existing, AnswerSource::Cached)),
            Ok(CommitOutcome::QuotaExhausted) => Err(AskError::QuotaExhausted),
            Err(err) => {
                error!("failed to persist computed answer: {err:#}");
                Err(AskError::AnswerNotSaved { answer })
            }
        }
    }
}
