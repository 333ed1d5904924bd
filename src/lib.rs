//! TaskBazar - points marketplace backend
//!
//! Users earn and spend points through a spin-wheel, a daily bonus, referrals
//! and a micro-task marketplace where creators fund campaigns and pay workers
//! for approved proofs.
//!
//! # How it works
//!
//! 1. Every `/api` route verifies the caller's bearer ID token
//! 2. The handler reads the caller's stats from the document store
//! 3. A business rule is checked (balance, daily limit, ownership, one referral)
//! 4. Balances are written back and a history or notification entry appended
//!
//! # Known limitations
//!
//! - Checks and writes are separate round trips, so concurrent requests for
//!   the same user can race past a guard
//! - A failure mid-handler does not undo writes already made
//! - Refund and reward amounts are taken from the request as given

pub mod auth;
pub mod bazar;
pub mod bonus;
pub mod campaign;
pub mod config;
pub mod error;
pub mod ledger;
pub mod paths;
pub mod referral;
pub mod server;
pub mod store;
pub mod wheel;

pub use auth::{AuthUser, IdentityToolkitVerifier, IdentityVerifier, StaticVerifier};
pub use bazar::TaskBazar;
pub use config::Config;
pub use error::ApiError;
pub use ledger::{Ledger, TxKind, UserStats};
pub use store::{MemoryStore, RtdbStore, Store, StoreError};
pub use wheel::PRIZES;
