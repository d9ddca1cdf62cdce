//! In-memory collection stores for fast, deterministic testing.
//!
//! - [`InMemoryCollectionStore`]: `HashMap`-based whole-collection storage
//! - [`FlakyCollectionStore`]: injects transient load/save failures

#![allow(clippy::unwrap_used)] // Seeding helpers unwrap encode/decode failures
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use arena_core::collection::{Document, decode_documents, encode_documents};
use arena_core::store::StoreFuture;
use arena_core::{CollectionName, CollectionStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// In-memory collection store.
///
/// Clones share the same data. An optional latency is applied to every load
/// and save, which widens the window for interleaving in concurrency tests.
///
/// # Example
///
/// ```
/// use arena_core::wallet::UserAccount;
/// use arena_core::tournament::Region;
/// use arena_core::ids::UserId;
/// use arena_testing::{InMemoryCollectionStore, test_clock};
/// use arena_core::environment::Clock;
///
/// let store = InMemoryCollectionStore::new();
/// let user = UserAccount::new(UserId::new("u-1"), "Ada".into(), Region::Usa, test_clock().now()).unwrap();
/// store.seed(&[user.clone()]);
///
/// assert_eq!(store.documents::<UserAccount>(), vec![user]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCollectionStore {
    collections: Arc<RwLock<HashMap<CollectionName, Vec<Value>>>>,
    saves: Arc<RwLock<HashMap<CollectionName, usize>>>,
    latency: Option<Duration>,
}

impl InMemoryCollectionStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sleeps for `latency` on every load and save.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Replace a collection with the given typed documents.
    pub fn seed<T: Document>(&self, documents: &[T]) {
        let raw = encode_documents(documents).unwrap();
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(T::COLLECTION, raw);
    }

    /// Read a collection back as typed documents.
    #[must_use]
    pub fn documents<T: Document>(&self) -> Vec<T> {
        decode_documents(self.raw(&T::COLLECTION)).unwrap()
    }

    /// Raw documents of a collection (empty if never saved).
    #[must_use]
    pub fn raw(&self, collection: &CollectionName) -> Vec<Value> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful saves of a collection.
    #[must_use]
    pub fn save_count(&self, collection: &CollectionName) -> usize {
        self.saves
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .copied()
            .unwrap_or(0)
    }

    /// Clear all data (for test isolation)
    pub fn clear(&self) {
        self.collections.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.saves.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl CollectionStore for InMemoryCollectionStore {
    fn load<'a>(&'a self, collection: &'a CollectionName) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(async move {
            self.pause().await;
            Ok(self.raw(collection))
        })
    }

    fn save<'a>(
        &'a self,
        collection: &'a CollectionName,
        documents: Vec<Value>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.pause().await;
            self.collections
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(collection.clone(), documents);
            *self
                .saves
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(collection.clone())
                .or_insert(0) += 1;
            Ok(())
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FailureBudget {
    loads: usize,
    saves: usize,
}

/// A store that fails on demand.
///
/// Failures are injected per collection and consumed one per call; a failed
/// save never reaches the inner store.
///
/// # Example
///
/// ```
/// use arena_core::CollectionStore;
/// use arena_core::collection::CollectionName;
/// use arena_testing::FlakyCollectionStore;
///
/// # async fn example() {
/// let store = FlakyCollectionStore::new();
/// store.fail_next_saves(&CollectionName::USERS, 1);
///
/// assert!(store.save(&CollectionName::USERS, vec![]).await.is_err());
/// assert!(store.save(&CollectionName::USERS, vec![]).await.is_ok());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FlakyCollectionStore {
    inner: InMemoryCollectionStore,
    budgets: Mutex<HashMap<CollectionName, FailureBudget>>,
    unreachable: AtomicBool,
}

impl FlakyCollectionStore {
    /// Create a flaky store over a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flaky store over an existing in-memory store.
    #[must_use]
    pub fn wrap(inner: InMemoryCollectionStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The wrapped store, for seeding and assertions.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryCollectionStore {
        &self.inner
    }

    /// Fail the next `count` saves of a collection (`0` clears).
    pub fn fail_next_saves(&self, collection: &CollectionName, count: usize) {
        self.budgets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.clone())
            .or_default()
            .saves = count;
    }

    /// Fail the next `count` loads of a collection (`0` clears).
    pub fn fail_next_loads(&self, collection: &CollectionName, count: usize) {
        self.budgets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.clone())
            .or_default()
            .loads = count;
    }

    /// Make `ping` fail until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn take_failure(&self, collection: &CollectionName, save: bool) -> bool {
        let mut budgets = self.budgets.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(budget) = budgets.get_mut(collection) else {
            return false;
        };
        let remaining = if save {
            &mut budget.saves
        } else {
            &mut budget.loads
        };
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }
}

impl CollectionStore for FlakyCollectionStore {
    fn load<'a>(&'a self, collection: &'a CollectionName) -> StoreFuture<'a, Vec<Value>> {
        if self.take_failure(collection, false) {
            return Box::pin(async move {
                Err(StoreError::Unavailable(format!(
                    "injected load failure for {collection}"
                )))
            });
        }
        self.inner.load(collection)
    }

    fn save<'a>(
        &'a self,
        collection: &'a CollectionName,
        documents: Vec<Value>,
    ) -> StoreFuture<'a, ()> {
        if self.take_failure(collection, true) {
            return Box::pin(async move {
                Err(StoreError::Unavailable(format!(
                    "injected save failure for {collection}"
                )))
            });
        }
        self.inner.save(collection, documents)
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        let unreachable = self.unreachable.load(Ordering::SeqCst);
        Box::pin(async move {
            if unreachable {
                Err(StoreError::Unavailable("store unreachable".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
    }

    impl Document for Note {
        const COLLECTION: CollectionName = CollectionName::from_static("notes");

        fn document_id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn unknown_collection_loads_empty() {
        let store = InMemoryCollectionStore::new();
        let docs = store.load(&CollectionName::new("missing")).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_whole_collection() {
        let store = InMemoryCollectionStore::new();
        store.seed(&[Note { id: "a".into() }, Note { id: "b".into() }]);

        store
            .save(&Note::COLLECTION, vec![serde_json::json!({"id": "c"})])
            .await
            .unwrap();

        assert_eq!(store.documents::<Note>(), vec![Note { id: "c".into() }]);
        assert_eq!(store.save_count(&Note::COLLECTION), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_per_collection() {
        let store = FlakyCollectionStore::new();
        store.fail_next_saves(&Note::COLLECTION, 2);

        assert!(store.save(&Note::COLLECTION, vec![]).await.is_err());
        assert!(store.save(&CollectionName::USERS, vec![]).await.is_ok());
        assert!(store.save(&Note::COLLECTION, vec![]).await.is_err());
        assert!(store.save(&Note::COLLECTION, vec![]).await.is_ok());
        assert_eq!(store.inner().save_count(&Note::COLLECTION), 1);
    }

    #[tokio::test]
    async fn ping_follows_reachability() {
        let store = FlakyCollectionStore::new();
        assert!(store.ping().await.is_ok());
        store.set_unreachable(true);
        assert!(store.ping().await.is_err());
    }
}
