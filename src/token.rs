//! Signed, time-bound session tokens.
//!
//! Issue and verify are stateless primitives: verification checks the
//! signature and expiry only. Revocation and device membership are separate,
//! composed checks so the issuer stays pure.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token")]
    Signing,
}

/// Claims carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject identifier.
    pub sub: Uuid,
    /// Unique token identifier, fresh per issuance.
    pub jti: Uuid,
    /// Issue time, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// HS256 issuer/verifier with a server-held secret fixed at deployment.
pub struct TokenKeeper {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeeper {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a signed token for `subject` with a fresh token id.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if claim encoding fails.
    pub fn issue(&self, subject: Uuid, clock: &dyn Clock) -> Result<IssuedToken, TokenError> {
        let iat = clock.unix_seconds();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: subject,
            jti: Uuid::new_v4(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Signing)?;
        Ok(IssuedToken { token, claims })
    }

    /// Check signature and expiry.
    ///
    /// # Errors
    ///
    /// `TokenError::Invalid` on a bad signature or malformed token,
    /// `TokenError::Expired` once `exp` has passed.
    pub fn verify(&self, token: &str, clock: &dyn Clock) -> Result<TokenClaims, TokenError> {
        // Expiry is checked against the injected clock, not the library's
        // wall clock, so `Expired` stays a distinct, testable outcome.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;
        if clock.unix_seconds() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Lifetime left on `claims`, floored at zero.
    #[must_use]
    pub fn remaining(claims: &TokenClaims, clock: &dyn Clock) -> Duration {
        let left = claims.exp.saturating_sub(clock.unix_seconds());
        u64::try_from(left).map_or(Duration::ZERO, Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenError, TokenKeeper};
    use crate::clock::ManualClock;
    use secrecy::SecretString;
    use std::time::Duration;
    use uuid::Uuid;

    fn keeper(ttl_seconds: u64) -> TokenKeeper {
        let secret = SecretString::from("unit-test-secret".to_string());
        TokenKeeper::new(&secret, Duration::from_secs(ttl_seconds))
    }

    #[test]
    fn issue_then_verify_round_trip() {
        let clock = ManualClock::new(1_700_000_000);
        let keeper = keeper(1_800);
        let subject = Uuid::new_v4();

        let issued = keeper.issue(subject, &clock).expect("issue");
        assert_eq!(issued.claims.sub, subject);
        assert_eq!(issued.claims.exp, issued.claims.iat + 1_800);

        let claims = keeper.verify(&issued.token, &clock).expect("verify");
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn token_ids_are_unique_per_issuance() {
        let clock = ManualClock::new(1_700_000_000);
        let keeper = keeper(60);
        let subject = Uuid::new_v4();

        let first = keeper.issue(subject, &clock).expect("issue");
        let second = keeper.issue(subject, &clock).expect("issue");
        assert_ne!(first.claims.jti, second.claims.jti);
    }

    #[test]
    fn expired_is_distinct_from_invalid() {
        let clock = ManualClock::new(1_700_000_000);
        let keeper = keeper(60);
        let issued = keeper.issue(Uuid::new_v4(), &clock).expect("issue");

        clock.advance(Duration::from_secs(61));
        assert_eq!(
            keeper.verify(&issued.token, &clock),
            Err(TokenError::Expired)
        );
        assert_eq!(
            keeper.verify("garbage.token.value", &clock),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let clock = ManualClock::new(1_700_000_000);
        let keeper = keeper(60);
        let issued = keeper.issue(Uuid::new_v4(), &clock).expect("issue");

        let other = TokenKeeper::new(
            &SecretString::from("a-different-secret".to_string()),
            Duration::from_secs(60),
        );
        assert_eq!(
            other.verify(&issued.token, &clock),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn remaining_floors_at_zero() {
        let clock = ManualClock::new(1_700_000_000);
        let keeper = keeper(60);
        let issued = keeper.issue(Uuid::new_v4(), &clock).expect("issue");

        assert_eq!(
            TokenKeeper::remaining(&issued.claims, &clock),
            Duration::from_secs(60)
        );
        clock.advance(Duration::from_secs(120));
        assert_eq!(
            TokenKeeper::remaining(&issued.claims, &clock),
            Duration::ZERO
        );
    }
}
