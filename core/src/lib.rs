//! # Arena Core
//!
//! Core types and traits for the Arena tournament ledger.
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace:
//!
//! - **Documents**: typed records (`Tournament`, `UserAccount`, `Transaction`,
//!   `PaymentRequest`) persisted as JSON documents in named collections
//! - **Collection store**: the narrow `load` / `save` interface to durable storage
//! - **Environment**: injected `Clock` and `IdGenerator` dependencies
//! - **Errors**: the `LedgerError` taxonomy returned by every ledger operation
//! - **Patches**: explicit partial-update structs with absent-vs-cleared semantics
//!
//! ## Architecture Principles
//!
//! - The store is the single source of truth (no process-wide caches)
//! - Invariants live on the types (`Tournament::claim_seat`, `WalletBalance::apply`)
//! - Dependencies are injected via traits so tests run deterministically
//!
//! ## Example
//!
//! ```
//! use arena_core::tournament::{NewTournament, Region, Tournament};
//! use arena_core::ids::{GameId, TournamentId};
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//!
//! let mut tournament = Tournament::new(
//!     TournamentId::new("t-1"),
//!     NewTournament {
//!         game_id: GameId::new("chess"),
//!         name: "Friday Blitz".to_string(),
//!         region: Region::Usa,
//!         total_spots: 1,
//!         entry_fee: Decimal::ZERO,
//!         starts_at: None,
//!     },
//!     Utc::now(),
//! )?;
//!
//! tournament.claim_seat()?;
//! assert_eq!(tournament.spots_left, 0);
//! assert!(tournament.claim_seat().is_err());
//! # Ok::<(), arena_core::error::LedgerError>(())
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};

pub mod collection;
pub mod environment;
pub mod error;
pub mod ids;
pub mod patch;
pub mod payment;
pub mod store;
pub mod tournament;
pub mod wallet;

pub use collection::{CollectionName, Document};
pub use error::{LedgerError, StoreError};
pub use store::CollectionStore;
