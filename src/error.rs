//! Error taxonomy for the access-control core.
//!
//! Credential and token errors are terminal for the request and surfaced
//! as-is. Upstream errors are safe for the caller to retry because no state
//! mutation happens before a successful compute.

use thiserror::Error;

/// Authentication and session failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is blacklisted")]
    AccountBlacklisted,

    /// Hard lockout: rejected unconditionally until the flag expires.
    #[error("account locked, retry after {retry_after}s")]
    AccountLocked { retry_after: u64 },

    /// Backoff phase: the caller must wait before the next attempt.
    #[error("too many attempts, retry after {retry_after}s")]
    Throttled { retry_after: u64 },

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    /// The token is cryptographically valid but was evicted from the
    /// subject's device slot list.
    #[error("device not registered")]
    DeviceNotRegistered,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Failures from the downstream inference provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("inference provider unavailable: {0}")]
    Unavailable(String),

    #[error("inference provider timed out")]
    Timeout,
}

/// Failures while resolving a quota-gated answer.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("quota exhausted")]
    QuotaExhausted,

    #[error("prompt not found")]
    PromptNotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The provider returned an answer but persisting it failed. Quota was
    /// not debited; the caller may serve the transient answer without a
    /// guarantee of future cache hits.
    #[error("computed answer could not be persisted")]
    AnswerNotSaved { answer: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
