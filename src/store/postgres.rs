//! Postgres-backed store.
//!
//! `commit_answer` relies on the unique key over
//! `(user_id, prompt_id, question_sha)` and a conditional quota decrement
//! inside one transaction, so the persist-and-debit step is both-or-neither
//! even across service instances.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    CommitOutcome, Fingerprint, GateStore, MembershipTier, Principal, PrincipalStatus,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Unknown statuses fail closed.
fn parse_status(status: &str) -> PrincipalStatus {
    if status == "active" {
        PrincipalStatus::Active
    } else {
        PrincipalStatus::Blacklisted
    }
}

fn parse_tier(tier: &str) -> MembershipTier {
    if tier == "premium" {
        MembershipTier::Premium
    } else {
        MembershipTier::Basic
    }
}

fn row_to_principal(row: &sqlx::postgres::PgRow) -> Principal {
    let status: String = row.get("status");
    let tier: String = row.get("tier");
    Principal {
        subject_id: row.get("id"),
        name: row.get("name"),
        credential_hash: row.get("credential_hash"),
        status: parse_status(&status),
        quota: row.get("quota"),
        tier: parse_tier(&tier),
    }
}

#[async_trait]
impl GateStore for PgStore {
    async fn find_principal(&self, name: &str) -> Result<Option<Principal>> {
        let query = r"
            SELECT id, name, credential_hash, status::text AS status, quota, tier::text AS tier
            FROM users
            WHERE name = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup principal by name")?;
        Ok(row.as_ref().map(row_to_principal))
    }

    async fn get_principal(&self, subject_id: Uuid) -> Result<Option<Principal>> {
        let query = r"
            SELECT id, name, credential_hash, status::text AS status, quota, tier::text AS tier
            FROM users
            WHERE id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup principal")?;
        Ok(row.as_ref().map(row_to_principal))
    }

    async fn get_prompt(&self, prompt_id: Uuid) -> Result<Option<String>> {
        let query = "SELECT content FROM prompts WHERE id = $1 LIMIT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(prompt_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup prompt")?;
        Ok(row.map(|row| row.get("content")))
    }

    async fn find_answer(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let query = r"
            SELECT answer_content
            FROM answers
            WHERE user_id = $1
              AND prompt_id = $2
              AND question_sha = $3
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(fingerprint.subject_id)
            .bind(fingerprint.prompt_id)
            .bind(fingerprint.digest().to_vec())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup answer")?;
        Ok(row.map(|row| row.get("answer_content")))
    }

    async fn commit_answer(
        &self,
        fingerprint: &Fingerprint,
        answer: &str,
    ) -> Result<CommitOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin answer commit transaction")?;

        let query = r"
            INSERT INTO answers
                (user_id, prompt_id, question_sha, question_content, answer_content)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, prompt_id, question_sha) DO NOTHING
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(fingerprint.subject_id)
            .bind(fingerprint.prompt_id)
            .bind(fingerprint.digest().to_vec())
            .bind(&fingerprint.question)
            .bind(answer)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert answer")?;

        if result.rows_affected() == 0 {
            // Lost the creation race; the winner's answer stands.
            let _ = tx.rollback().await;
            return match self.find_answer(fingerprint).await? {
                Some(existing) => Ok(CommitOutcome::Existing(existing)),
                None => Err(anyhow!("conflicting answer row disappeared during commit")),
            };
        }

        let query = r"
            UPDATE users
            SET quota = quota - 1,
                updated_at = NOW()
            WHERE id = $1
              AND quota > 0
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(fingerprint.subject_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to debit quota")?;

        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Ok(CommitOutcome::QuotaExhausted);
        }

        tx.commit().await.context("commit answer transaction")?;
        Ok(CommitOutcome::Committed)
    }

    async fn reset_quota(&self, tier: MembershipTier, new_quota: i64) -> Result<u64> {
        let query = r"
            UPDATE users
            SET quota = $1,
                updated_at = NOW()
            WHERE tier::text = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(new_quota)
            .bind(tier.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to reset quota")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_status, parse_tier};
    use crate::store::{MembershipTier, PrincipalStatus};

    #[test]
    fn status_parsing_fails_closed() {
        assert_eq!(parse_status("active"), PrincipalStatus::Active);
        assert_eq!(parse_status("blacklisted"), PrincipalStatus::Blacklisted);
        assert_eq!(parse_status("suspended"), PrincipalStatus::Blacklisted);
    }

    #[test]
    fn tier_parsing_defaults_to_basic() {
        assert_eq!(parse_tier("premium"), MembershipTier::Premium);
        assert_eq!(parse_tier("basic"), MembershipTier::Basic);
        assert_eq!(parse_tier(""), MembershipTier::Basic);
    }
}
