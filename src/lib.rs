//! # Pordisto (Access Control & Quota Gating Core)
//!
//! `pordisto` is the access-control core of an AI answer service. It
//! authenticates users, bounds how many devices a user may stay logged in
//! on, revokes tokens on logout, throttles repeated failed logins, and
//! gates expensive inference calls behind a per-request deduplication cache
//! that also enforces a consumable usage quota.
//!
//! ## Sessions
//!
//! Tokens are signed, time-bound JWTs carrying a subject id and a unique
//! token id. Verification is a stateless primitive; revocation tombstones
//! and the per-subject device slot list are separate, composed checks. The
//! device list is bounded with strict FIFO eviction: evicting a token from
//! the list is the enforcement mechanism, no per-token revocation needed.
//!
//! ## Throttling
//!
//! Failed logins move a principal through
//! `Clear → Warming → Delayed → Locked`: a windowed failure counter, then
//! exponential backoff, then a hard lockout flag with its own TTL. A
//! successful verification clears everything immediately.
//!
//! ## Quota-gated answers
//!
//! An answer is keyed by the exact (subject, prompt, question) fingerprint.
//! A hit consumes no quota and never reaches the provider; a miss checks
//! quota, computes, then persists the entry and debits one unit atomically.
//! Repeated identical questions never cost more than one quota unit, and a
//! transient downstream failure never costs any.
//!
//! The shared store and the inference provider are trait dependencies
//! ([`store::GateStore`], [`provider::Provider`]); an in-memory store and a
//! hand-driven clock ship with the crate so embedders can test without
//! Postgres or a live provider.

pub mod answers;
pub mod clock;
pub mod config;
pub mod devices;
pub mod error;
pub mod gate;
pub mod password;
pub mod provider;
pub mod revocation;
pub mod store;
pub mod throttle;
pub mod token;

pub use answers::AnswerSource;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GateConfig;
pub use error::{AskError, AuthError, UpstreamError};
pub use gate::{AuthContext, Gate, LoginGrant};
pub use store::{GateStore, MembershipTier, Principal, PrincipalStatus};
