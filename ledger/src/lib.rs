//! # Arena Ledger
//!
//! Tournament seat inventory, wallet ledger and payment request workflow on
//! top of a whole-collection document store.
//!
//! # Architecture
//!
//! ```text
//!              ┌───────────────────────────────┐
//!   HTTP ────► │          ArenaService         │
//!              └───────────────────────────────┘
//!                 │            │            │
//!                 ▼            ▼            ▼
//!          SeatInventory  WalletLedger  PaymentWorkflow
//!                 │            ▲            │
//!                 └─ fees ─────┘◄─ credits ─┘
//!                              │
//!                              ▼
//!                    MutationSerializer (one gate per collection)
//!                              │
//!                              ▼
//!                       CollectionStore
//! ```
//!
//! Every mutation reloads its collection under that collection's gate, so
//! concurrent requests never lose each other's writes. Cross-collection
//! operations nest gates in a fixed order:
//! tournaments → payment_requests → users → transactions.
//!
//! # Modules
//!
//! - [`seats`]: tournaments, enrollment and cancellation
//! - [`wallet`]: balances, postings and the transaction log
//! - [`payments`]: idempotent approval of credit top-ups
//! - [`service`]: the facade used by the HTTP layer
//! - [`api`] / [`server`]: axum handlers and router
//! - [`config`] / [`app`]: configuration and bootstrap

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod app;
pub mod config;
pub mod metrics;
pub mod payments;
pub mod seats;
pub mod server;
pub mod service;
pub mod wallet;

pub use app::{ArenaApp, StartupError};
pub use config::Config;
pub use seats::SeatResult;
pub use server::{AppState, build_router};
pub use service::ArenaService;
pub use wallet::{CreditOutcome, LedgerEntry, ReconciliationReport};
