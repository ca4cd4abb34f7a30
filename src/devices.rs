//! Per-subject device slot lists.
//!
//! Each subject holds an ordered, most-recent-first list of active token
//! ids, bounded to the device cap. Eviction from the list is itself the
//! enforcement mechanism: an evicted token stays cryptographically valid but
//! fails the membership check, so nothing needs to be revoked individually.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
struct SlotList {
    tokens: VecDeque<Uuid>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    slots: Mutex<HashMap<Uuid, SlotList>>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `token_id`, truncate to `max_devices`, refresh the sliding
    /// TTL. The whole sequence runs under one lock so concurrent logins for
    /// the same subject can never leave the list over the cap.
    pub async fn register(
        &self,
        subject: Uuid,
        token_id: Uuid,
        max_devices: usize,
        ttl: Duration,
        now: Instant,
    ) {
        let mut slots = self.slots.lock().await;
        slots.retain(|_, list| list.expires_at > now);

        let list = slots.entry(subject).or_insert_with(|| SlotList {
            tokens: VecDeque::new(),
            expires_at: now + ttl,
        });
        list.tokens.push_front(token_id);
        list.tokens.truncate(max_devices);
        list.expires_at = now + ttl;
    }

    /// Membership test against the subject's current slot list.
    pub async fn is_active(&self, subject: Uuid, token_id: Uuid, now: Instant) -> bool {
        let slots = self.slots.lock().await;
        slots
            .get(&subject)
            .is_some_and(|list| list.expires_at > now && list.tokens.contains(&token_id))
    }
}
