//! # Arena Runtime
//!
//! Runtime support for the Arena tournament ledger.
//!
//! This crate provides:
//! - [`gate::MutationSerializer`]: one async gate per collection, held across
//!   each load → modify → save cycle so concurrent writers never lose updates
//! - [`retry`]: bounded exponential backoff for transient store failures
//! - [`metrics`]: Prometheus recorder and gate/store metrics
//!
//! ## Example
//!
//! ```no_run
//! use arena_core::tournament::Tournament;
//! use arena_runtime::gate::{MutationSerializer, Outcome};
//! use arena_runtime::retry::RetryPolicy;
//! # use std::sync::Arc;
//! # async fn example(store: Arc<dyn arena_core::CollectionStore>) -> Result<(), arena_core::LedgerError> {
//! let serializer = MutationSerializer::new(store, RetryPolicy::default());
//!
//! let open = serializer
//!     .with_collection::<Tournament, _, _>(|tournaments| {
//!         Ok(Outcome::Unchanged(tournaments.iter().filter(|t| t.spots_left > 0).count()))
//!     })
//!     .await?;
//! # let _ = open;
//! # Ok(())
//! # }
//! ```

pub mod gate;
pub mod metrics;
pub mod retry;

pub use gate::{CollectionLease, MutationSerializer, Outcome, run_to_completion};
pub use retry::{RetryExhausted, RetryPolicy, retry_with_backoff};
