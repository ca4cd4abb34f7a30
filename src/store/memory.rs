//! In-process store for tests and single-node embeddings.
//!
//! All operations run under one mutex, which makes `commit_answer`'s
//! both-or-neither contract a single critical section.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CommitOutcome, Fingerprint, GateStore, MembershipTier, Principal};

#[derive(Debug, Default)]
struct Inner {
    principals: HashMap<Uuid, Principal>,
    prompts: HashMap<Uuid, String>,
    answers: HashMap<[u8; 32], String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_principal(&self, principal: Principal) {
        let mut inner = self.inner.lock().await;
        inner.principals.insert(principal.subject_id, principal);
    }

    pub async fn insert_prompt(&self, prompt_id: Uuid, content: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.prompts.insert(prompt_id, content.into());
    }

    /// Current quota for `subject_id`, for test assertions.
    pub async fn quota_of(&self, subject_id: Uuid) -> Option<i64> {
        let inner = self.inner.lock().await;
        inner
            .principals
            .get(&subject_id)
            .map(|principal| principal.quota)
    }
}

#[async_trait]
impl GateStore for MemoryStore {
    async fn find_principal(&self, name: &str) -> Result<Option<Principal>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .principals
            .values()
            .find(|principal| principal.name == name)
            .cloned())
    }

    async fn get_principal(&self, subject_id: Uuid) -> Result<Option<Principal>> {
        let inner = self.inner.lock().await;
        Ok(inner.principals.get(&subject_id).cloned())
    }

    async fn get_prompt(&self, prompt_id: Uuid) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.prompts.get(&prompt_id).cloned())
    }

    async fn find_answer(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.answers.get(&fingerprint.digest()).cloned())
    }

    async fn commit_answer(
        &self,
        fingerprint: &Fingerprint,
        answer: &str,
    ) -> Result<CommitOutcome> {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.answers.get(&fingerprint.digest()) {
            return Ok(CommitOutcome::Existing(existing.clone()));
        }

        let Some(principal) = inner.principals.get_mut(&fingerprint.subject_id) else {
            bail!("unknown subject {}", fingerprint.subject_id);
        };
        if principal.quota <= 0 {
            return Ok(CommitOutcome::QuotaExhausted);
        }
        principal.quota -= 1;
        inner.answers.insert(fingerprint.digest(), answer.to_string());
        Ok(CommitOutcome::Committed)
    }

    async fn reset_quota(&self, tier: MembershipTier, new_quota: i64) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut updated = 0;
        for principal in inner.principals.values_mut() {
            if principal.tier == tier {
                principal.quota = new_quota;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
