//! The persistent collection store abstraction.
//!
//! The only durable storage available to the ledger is a whole-collection
//! read/modify/write store: no transactions, no per-record locking. This
//! trait captures exactly that contract so the ledger can be run against
//! PostgreSQL in production and an in-memory map in tests.
//!
//! # Implementations
//!
//! - `PostgresCollectionStore` (in `arena-postgres`): one JSONB row per collection
//! - `InMemoryCollectionStore` (in `arena-testing`): fast, deterministic testing
//!
//! # Concurrency
//!
//! Implementations are not expected to provide any isolation between a
//! `load` and a later `save`. Every write must go through the mutation
//! serializer in `arena-runtime`, which holds the collection's gate across
//! the whole load → modify → save cycle.

use crate::collection::CollectionName;
use crate::error::StoreError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Whole-collection document store.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` so it can be shared as `Arc<dyn CollectionStore>`.
pub trait CollectionStore: Send + Sync {
    /// Load every document in a collection.
    ///
    /// A collection that was never saved is empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backing storage cannot be read.
    fn load<'a>(&'a self, collection: &'a CollectionName) -> StoreFuture<'a, Vec<Value>>;

    /// Replace every document in a collection.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write did not happen. Callers must treat
    /// a failed save as "nothing was written".
    fn save<'a>(
        &'a self,
        collection: &'a CollectionName,
        documents: Vec<Value>,
    ) -> StoreFuture<'a, ()>;

    /// Check that the backing storage is reachable.
    ///
    /// The default implementation always succeeds.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the storage is unreachable.
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
