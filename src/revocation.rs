//! Tombstones for explicitly invalidated token ids.
//!
//! An entry lives only as long as the token it shadows would have; after the
//! original expiry the issuer's own expiry check rejects the token, so the
//! tombstone may be forgotten. Expired entries are purged lazily on write.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RevocationRegistry {
    tombstones: Mutex<HashMap<Uuid, Instant>>,
}

impl RevocationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `token_id` invalid for `remaining_ttl`.
    ///
    /// A zero remaining lifetime means the token has already expired and
    /// this is a no-op.
    pub async fn revoke(&self, token_id: Uuid, remaining_ttl: Duration, now: Instant) {
        if remaining_ttl.is_zero() {
            return;
        }
        let mut tombstones = self.tombstones.lock().await;
        tombstones.retain(|_, expires_at| *expires_at > now);
        tombstones.insert(token_id, now + remaining_ttl);
    }

    pub async fn is_revoked(&self, token_id: Uuid, now: Instant) -> bool {
        let tombstones = self.tombstones.lock().await;
        tombstones
            .get(&token_id)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::RevocationRegistry;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    #[tokio::test]
    async fn revoked_until_original_expiry() {
        let registry = RevocationRegistry::new();
        let token_id = Uuid::new_v4();
        let now = Instant::now();

        registry
            .revoke(token_id, Duration::from_secs(60), now)
            .await;
        assert!(registry.is_revoked(token_id, now).await);
        assert!(
            registry
                .is_revoked(token_id, now + Duration::from_secs(59))
                .await
        );
        // Past the original expiry the tombstone no longer matters.
        assert!(
            !registry
                .is_revoked(token_id, now + Duration::from_secs(60))
                .await
        );
    }

    #[tokio::test]
    async fn revoking_an_expired_token_is_a_noop() {
        let registry = RevocationRegistry::new();
        let token_id = Uuid::new_v4();
        let now = Instant::now();

        registry.revoke(token_id, Duration::ZERO, now).await;
        assert!(!registry.is_revoked(token_id, now).await);
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_revoked() {
        let registry = RevocationRegistry::new();
        assert!(!registry.is_revoked(Uuid::new_v4(), Instant::now()).await);
    }

    #[tokio::test]
    async fn stale_tombstones_are_purged_on_write() {
        let registry = RevocationRegistry::new();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let now = Instant::now();

        registry.revoke(stale, Duration::from_secs(10), now).await;
        let later = now + Duration::from_secs(30);
        registry.revoke(fresh, Duration::from_secs(10), later).await;

        let tombstones = registry.tombstones.lock().await;
        assert!(!tombstones.contains_key(&stale));
        assert!(tombstones.contains_key(&fresh));
    }
}
