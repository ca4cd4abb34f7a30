//! Facade composing the access-control components.
//!
//! Login: throttle check → principal lookup → credential verify → blacklist
//! check → clear throttle → issue token → register device slot.
//! Authorize: signature and expiry → revocation tombstone → device slot
//! membership. The pieces stay separate so each check remains a stateless
//! or independently-locked primitive.

use anyhow::anyhow;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::answers::{AnswerCache, AnswerSource};
use crate::clock::Clock;
use crate::config::GateConfig;
use crate::devices::DeviceRegistry;
use crate::error::{AskError, AuthError};
use crate::password;
use crate::provider::Provider;
use crate::revocation::RevocationRegistry;
use crate::store::{Fingerprint, GateStore, MembershipTier, Principal, PrincipalStatus};
use crate::throttle::{LoginThrottle, ThrottleDecision};
use crate::token::{TokenError, TokenKeeper};

/// Result of a successful login: the signed token plus a snapshot of the
/// principal for the response payload.
#[derive(Debug)]
pub struct LoginGrant {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: i64,
    pub principal: Principal,
}

/// Identity attached to an authorized request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub subject_id: Uuid,
    pub token_id: Uuid,
    pub expires_at: i64,
}

pub struct Gate {
    config: GateConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn GateStore>,
    provider: Arc<dyn Provider>,
    tokens: TokenKeeper,
    revocations: RevocationRegistry,
    devices: DeviceRegistry,
    throttle: LoginThrottle,
    answers: AnswerCache,
}

impl Gate {
    #[must_use]
    pub fn new(
        config: GateConfig,
        signing_secret: &SecretString,
        store: Arc<dyn GateStore>,
        provider: Arc<dyn Provider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenKeeper::new(signing_secret, config.token_ttl());
        let throttle = LoginThrottle::new(config.throttle_policy());
        Self {
            config,
            clock,
            store,
            provider,
            tokens,
            revocations: RevocationRegistry::new(),
            devices: DeviceRegistry::new(),
            throttle,
            answers: AnswerCache::new(),
        }
    }

    /// Authenticate `name` with `secret` and mint a session token.
    ///
    /// # Errors
    ///
    /// [`AuthError::Throttled`] or [`AuthError::AccountLocked`] before
    /// credentials are consulted, [`AuthError::InvalidCredentials`] on a
    /// bad name or secret, [`AuthError::AccountBlacklisted`] for disabled
    /// accounts.
    pub async fn login(&self, name: &str, secret: &str) -> Result<LoginGrant, AuthError> {
        match self.throttle.check(name, self.clock.now()).await {
            ThrottleDecision::Locked { retry_after } => {
                warn!(principal = name, retry_after, "login rejected: locked");
                return Err(AuthError::AccountLocked { retry_after });
            }
            ThrottleDecision::Delayed { retry_after } => {
                warn!(principal = name, retry_after, "login rejected: backoff");
                return Err(AuthError::Throttled { retry_after });
            }
            ThrottleDecision::Proceed => {}
        }

        let Some(principal) = self.store.find_principal(name).await? else {
            // Unknown names count as failures so probing backs off the
            // same way bad passwords do.
            self.throttle.record_failure(name, self.clock.now()).await;
            return Err(AuthError::InvalidCredentials);
        };

        // The hash comparison is intentionally slow; keep it off the
        // latency-sensitive request path.
        let verified = {
            let secret = secret.to_string();
            let stored_hash = principal.credential_hash.clone();
            tokio::task::spawn_blocking(move || password::verify(&secret, &stored_hash))
                .await
                .map_err(|err| anyhow!("credential verification task failed: {err}"))?
        };
        if !verified {
            self.throttle.record_failure(name, self.clock.now()).await;
            return Err(AuthError::InvalidCredentials);
        }

        if principal.status == PrincipalStatus::Blacklisted {
            return Err(AuthError::AccountBlacklisted);
        }

        self.throttle.clear(name).await;

        let issued = self
            .tokens
            .issue(principal.subject_id, self.clock.as_ref())
            .map_err(|err| anyhow!("failed to issue token: {err}"))?;
        self.devices
            .register(
                principal.subject_id,
                issued.claims.jti,
                self.config.max_devices(),
                self.config.token_ttl(),
                self.clock.now(),
            )
            .await;

        info!(subject = %principal.subject_id, "login succeeded");
        Ok(LoginGrant {
            token: issued.token,
            token_id: issued.claims.jti,
            expires_at: issued.claims.exp,
            principal,
        })
    }

    /// Validate a presented token: signature, expiry, revocation, and
    /// device slot membership, in that order.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenInvalid`], [`AuthError::TokenExpired`],
    /// [`AuthError::TokenRevoked`], or [`AuthError::DeviceNotRegistered`].
    pub async fn authorize(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self
            .tokens
            .verify(token, self.clock.as_ref())
            .map_err(auth_error)?;

        if self
            .revocations
            .is_revoked(claims.jti, self.clock.now())
            .await
        {
            return Err(AuthError::TokenRevoked);
        }
        if !self
            .devices
            .is_active(claims.sub, claims.jti, self.clock.now())
            .await
        {
            return Err(AuthError::DeviceNotRegistered);
        }

        Ok(AuthContext {
            subject_id: claims.sub,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Revoke the presented token for the rest of its natural lifetime.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenInvalid`] or [`AuthError::TokenExpired`]; an
    /// expired token has nothing left to revoke.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self
            .tokens
            .verify(token, self.clock.as_ref())
            .map_err(auth_error)?;

        let remaining = TokenKeeper::remaining(&claims, self.clock.as_ref());
        self.revocations
            .revoke(claims.jti, remaining, self.clock.now())
            .await;
        info!(subject = %claims.sub, "session revoked");
        Ok(())
    }

    /// Resolve a question for `subject_id` through the quota-gated cache.
    ///
    /// # Errors
    ///
    /// See [`AnswerCache::resolve`].
    pub async fn ask(
        &self,
        subject_id: Uuid,
        prompt_id: Uuid,
        question: &str,
    ) -> Result<(String, AnswerSource), AskError> {
        let fingerprint = Fingerprint::new(subject_id, prompt_id, question);
        self.answers
            .resolve(self.store.as_ref(), self.provider.as_ref(), &fingerprint)
            .await
    }

    /// Bulk quota replenishment for a membership tier; returns the number
    /// of principals updated.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn reset_quota(&self, tier: MembershipTier, new_quota: i64) -> anyhow::Result<u64> {
        let updated = self.store.reset_quota(tier, new_quota).await?;
        info!(tier = tier.as_str(), new_quota, updated, "quota reset");
        Ok(updated)
    }
}

fn auth_error(err: TokenError) -> AuthError {
    match err {
        TokenError::Expired => AuthError::TokenExpired,
        TokenError::Invalid | TokenError::Signing => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::auth_error;
    use crate::error::AuthError;
    use crate::token::TokenError;

    #[test]
    fn token_errors_map_onto_auth_errors() {
        assert!(matches!(
            auth_error(TokenError::Expired),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            auth_error(TokenError::Invalid),
            AuthError::TokenInvalid
        ));
    }
}
