//! Per-collection mutation gates.
//!
//! The collection store has no transactions: a write replaces a whole
//! collection. Two uncoordinated read/modify/write cycles on the same
//! collection therefore lose one of the updates. [`MutationSerializer`] owns
//! one async mutex per collection and holds it for the entire
//! load → modify → save cycle, so at most one mutation of a collection is in
//! flight at any moment.
//!
//! # Guarantees
//!
//! - Mutations of one collection are applied one at a time, in the order
//!   callers reached the gate (tokio's mutex is fair), so no caller starves.
//! - Mutations of different collections proceed in parallel.
//! - A caller dropped while queued leaves nothing behind.
//! - Once [`MutationSerializer::with_collection`] holds the gate, the
//!   mutation runs to completion on its own task even if the caller goes
//!   away, so the gate is never released halfway through a commit.
//!
//! # Nesting
//!
//! Operations that span collections hold more than one lease at a time.
//! They must acquire gates in this order, and never the reverse:
//!
//! ```text
//! tournaments → payment_requests → users → transactions
//! ```

use crate::metrics::GateMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use arena_core::collection::{Document, decode_documents, encode_documents};
use arena_core::{CollectionName, CollectionStore, LedgerError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{Mutex as GateMutex, OwnedMutexGuard};

/// Result of a gated mutation: whether the collection must be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<R> {
    /// Documents were modified; commit them
    Changed(R),
    /// Nothing changed; skip the save
    Unchanged(R),
}

impl<R> Outcome<R> {
    /// The value carried by either variant.
    pub fn into_inner(self) -> R {
        match self {
            Self::Changed(value) | Self::Unchanged(value) => value,
        }
    }
}

struct Inner {
    store: Arc<dyn CollectionStore>,
    gates: Mutex<HashMap<CollectionName, Arc<GateMutex<()>>>>,
    policy: RetryPolicy,
}

/// Serializes every mutation of a collection through a single gate.
///
/// Cheap to clone; clones share the same gates.
#[derive(Clone)]
pub struct MutationSerializer {
    inner: Arc<Inner>,
}

impl MutationSerializer {
    /// Create a serializer over `store`.
    ///
    /// `policy` bounds the retries of both loads and saves.
    #[must_use]
    pub fn new(store: Arc<dyn CollectionStore>, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                gates: Mutex::new(HashMap::new()),
                policy,
            }),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CollectionStore> {
        &self.inner.store
    }

    /// The retry policy applied to loads and saves.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    fn gate(&self, collection: &CollectionName) -> Arc<GateMutex<()>> {
        // The map only ever grows, so a poisoned lock still holds valid gates.
        let mut gates = self
            .inner
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            gates
                .entry(collection.clone())
                .or_insert_with(|| Arc::new(GateMutex::new(()))),
        )
    }

    /// Acquire the gate for `T`'s collection and load its documents.
    ///
    /// Dropping the returned future while it is still queued is safe and
    /// leaves the gate untouched. Dropping the lease without committing
    /// discards every change made through it.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the collection cannot be
    /// loaded after retries, or `LedgerError::Internal` if a stored document
    /// does not decode.
    pub async fn lease<T: Document>(&self) -> Result<CollectionLease<T>, LedgerError> {
        let collection = T::COLLECTION;
        let gate = self.gate(&collection);

        let queued_at = Instant::now();
        let guard = gate.lock_owned().await;
        GateMetrics::record_wait(collection.as_str(), queued_at.elapsed());

        let documents = self.load_documents::<T>(&collection).await?;
        tracing::trace!(%collection, documents = documents.len(), "Gate acquired");

        Ok(CollectionLease {
            _guard: guard,
            documents,
            collection,
            store: Arc::clone(&self.inner.store),
            policy: self.inner.policy.clone(),
        })
    }

    /// Load a consistent snapshot of a collection without taking its gate.
    ///
    /// Saves replace a collection atomically, so the snapshot always reflects
    /// a whole committed state, though possibly not the newest one.
    ///
    /// # Errors
    ///
    /// Same as [`MutationSerializer::lease`].
    pub async fn snapshot<T: Document>(&self) -> Result<Vec<T>, LedgerError> {
        self.load_documents::<T>(&T::COLLECTION).await
    }

    async fn load_documents<T: Document>(
        &self,
        collection: &CollectionName,
    ) -> Result<Vec<T>, LedgerError> {
        let store = self.inner.store.as_ref();
        let operation = format!("load {collection}");
        let raw = retry_with_backoff(&self.inner.policy, &operation, move || {
            store.load(collection)
        })
        .await
        .map_err(|exhausted| LedgerError::StoreUnavailable {
            collection: collection.clone(),
            source: exhausted.last_error,
        })?;

        decode_documents::<T>(raw).map_err(|e| LedgerError::Internal(e.to_string()))
    }

    /// Run one read/modify/write cycle on `T`'s collection under its gate.
    ///
    /// `mutate` receives the loaded documents. Returning
    /// [`Outcome::Changed`] saves them; [`Outcome::Unchanged`] releases the
    /// gate without writing; an error discards every change.
    ///
    /// # Errors
    ///
    /// Returns the error from `mutate`, or a store error from
    /// [`MutationSerializer::lease`] or [`CollectionLease::commit`].
    pub async fn with_collection<T, R, F>(&self, mutate: F) -> Result<R, LedgerError>
    where
        T: Document,
        R: Send + 'static,
        F: FnOnce(&mut Vec<T>) -> Result<Outcome<R>, LedgerError> + Send + 'static,
    {
        let mut lease = self.lease::<T>().await?;
        run_to_completion(async move {
            match mutate(lease.documents_mut())? {
                Outcome::Changed(value) => {
                    lease.commit().await?;
                    Ok(value)
                }
                Outcome::Unchanged(value) => Ok(value),
            }
        })
        .await
    }
}

impl std::fmt::Debug for MutationSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationSerializer")
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one collection's documents.
///
/// The gate stays held until the lease is committed or dropped.
pub struct CollectionLease<T: Document> {
    _guard: OwnedMutexGuard<()>,
    documents: Vec<T>,
    collection: CollectionName,
    store: Arc<dyn CollectionStore>,
    policy: RetryPolicy,
}

impl<T: Document> CollectionLease<T> {
    /// Collection this lease guards.
    #[must_use]
    pub const fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// Documents as loaded (plus any local changes).
    #[must_use]
    pub fn documents(&self) -> &[T] {
        &self.documents
    }

    /// Mutable access to the documents.
    pub fn documents_mut(&mut self) -> &mut Vec<T> {
        &mut self.documents
    }

    /// Find a document by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&T> {
        self.documents.iter().find(|doc| doc.document_id() == id)
    }

    /// Find a document by id, mutably.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut T> {
        self.documents.iter_mut().find(|doc| doc.document_id() == id)
    }

    /// Save the documents and release the gate.
    ///
    /// Saves are retried according to the serializer's policy. On failure
    /// nothing was written and the gate is released.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreWriteFailure` carrying the attempt count and
    /// the last store error once retries are exhausted, or
    /// `LedgerError::Internal` if a document cannot be encoded.
    pub async fn commit(self) -> Result<(), LedgerError> {
        let raw = encode_documents(&self.documents).map_err(|e| LedgerError::Internal(e.to_string()))?;
        let count = raw.len();

        let store = self.store.as_ref();
        let collection = &self.collection;
        let raw = &raw;
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let operation = format!("save {collection}");

        let saved = retry_with_backoff(&self.policy, &operation, move || {
            attempts_ref.fetch_add(1, Ordering::Relaxed);
            store.save(collection, raw.clone())
        })
        .await;

        match saved {
            Ok(()) => {
                let attempts = attempts.load(Ordering::Relaxed);
                GateMetrics::record_commit(collection.as_str(), attempts);
                tracing::debug!(%collection, documents = count, attempts, "Collection committed");
                Ok(())
            }
            Err(exhausted) => {
                GateMetrics::record_save_failure(collection.as_str(), exhausted.attempts);
                Err(LedgerError::StoreWriteFailure {
                    collection: collection.clone(),
                    attempts: exhausted.attempts,
                    source: exhausted.last_error,
                })
            }
        }
    }
}

/// Drive a gated section on its own task.
///
/// The section keeps running if the caller's future is dropped, so a lease
/// acquired inside it is always committed or released, never abandoned
/// mid-save.
///
/// # Errors
///
/// Returns the section's own error, or `LedgerError::Internal` if the task
/// panicked.
pub async fn run_to_completion<F, R>(section: F) -> Result<R, LedgerError>
where
    F: Future<Output = Result<R, LedgerError>> + Send + 'static,
    R: Send + 'static,
{
    tokio::spawn(section)
        .await
        .map_err(|e| LedgerError::Internal(format!("gated section failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use arena_core::StoreError;
    use arena_testing::{FlakyCollectionStore, InMemoryCollectionStore};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: i64,
    }

    impl Document for Counter {
        const COLLECTION: CollectionName = CollectionName::from_static("counters");

        fn document_id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Marker {
        id: String,
    }

    impl Document for Marker {
        const COLLECTION: CollectionName = CollectionName::from_static("markers");

        fn document_id(&self) -> &str {
            &self.id
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
            .build()
    }

    fn increment(docs: &mut Vec<Counter>) -> Result<Outcome<i64>, LedgerError> {
        if docs.is_empty() {
            docs.push(Counter { id: "c".to_string(), value: 0 });
        }
        let counter = &mut docs[0];
        counter.value += 1;
        Ok(Outcome::Changed(counter.value))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_never_lose_updates() {
        let store = Arc::new(InMemoryCollectionStore::with_latency(Duration::from_millis(1)));
        let serializer = MutationSerializer::new(store.clone(), fast_policy(0));

        let mut handles = Vec::new();
        for _ in 0..40 {
            let serializer = serializer.clone();
            handles.push(tokio::spawn(async move {
                serializer.with_collection::<Counter, _, _>(increment).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let counters = store.documents::<Counter>();
        assert_eq!(counters[0].value, 40);
        assert_eq!(store.save_count(&Counter::COLLECTION), 40);
    }

    #[tokio::test]
    async fn different_collections_do_not_block_each_other() {
        let store = Arc::new(InMemoryCollectionStore::new());
        let serializer = MutationSerializer::new(store, fast_policy(0));

        let _held = serializer.lease::<Counter>().await.unwrap();
        let other = tokio::time::timeout(Duration::from_millis(200), serializer.lease::<Marker>())
            .await
            .expect("lease on another collection should not wait");
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn dropping_a_queued_caller_leaves_the_gate_usable() {
        let store = Arc::new(InMemoryCollectionStore::new());
        let serializer = MutationSerializer::new(store, fast_policy(0));

        let held = serializer.lease::<Counter>().await.unwrap();
        let queued =
            tokio::time::timeout(Duration::from_millis(20), serializer.lease::<Counter>()).await;
        assert!(queued.is_err(), "second lease should still be queued");

        drop(held);
        let value = serializer.with_collection::<Counter, _, _>(increment).await.unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn unchanged_outcome_skips_the_save() {
        let store = Arc::new(InMemoryCollectionStore::new());
        let serializer = MutationSerializer::new(store.clone(), fast_policy(0));

        let len = serializer
            .with_collection::<Counter, _, _>(|docs| Ok(Outcome::Unchanged(docs.len())))
            .await
            .unwrap();

        assert_eq!(len, 0);
        assert_eq!(store.save_count(&Counter::COLLECTION), 0);
    }

    #[tokio::test]
    async fn rejected_mutation_discards_changes() {
        let store = Arc::new(InMemoryCollectionStore::new());
        store.seed(&[Counter { id: "c".to_string(), value: 5 }]);
        let serializer = MutationSerializer::new(store.clone(), fast_policy(0));

        let result = serializer
            .with_collection::<Counter, (), _>(|docs| {
                docs[0].value = 99;
                Err(LedgerError::Validation("nope".to_string()))
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(store.documents::<Counter>()[0].value, 5);
    }

    #[tokio::test]
    async fn save_is_retried_until_it_succeeds() {
        let flaky = Arc::new(FlakyCollectionStore::new());
        flaky.fail_next_saves(&Counter::COLLECTION, 2);
        let serializer = MutationSerializer::new(flaky.clone(), fast_policy(3));

        let value = serializer.with_collection::<Counter, _, _>(increment).await.unwrap();

        assert_eq!(value, 1);
        assert_eq!(flaky.inner().documents::<Counter>()[0].value, 1);
    }

    #[tokio::test]
    async fn exhausted_save_reports_attempts_and_writes_nothing() {
        let flaky = Arc::new(FlakyCollectionStore::new());
        flaky.fail_next_saves(&Counter::COLLECTION, 10);
        let serializer = MutationSerializer::new(flaky.clone(), fast_policy(2));

        let result = serializer.with_collection::<Counter, _, _>(increment).await;

        match result {
            Err(LedgerError::StoreWriteFailure { collection, attempts, source }) => {
                assert_eq!(collection, Counter::COLLECTION);
                assert_eq!(attempts, 3);
                assert!(matches!(source, StoreError::Unavailable(_)));
            }
            other => panic!("expected StoreWriteFailure, got {other:?}"),
        }
        assert!(flaky.inner().documents::<Counter>().is_empty());

        // The gate was released; the next mutation goes through.
        flaky.fail_next_saves(&Counter::COLLECTION, 0);
        assert_eq!(
            serializer.with_collection::<Counter, _, _>(increment).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn load_failure_surfaces_as_store_unavailable() {
        let flaky = Arc::new(FlakyCollectionStore::new());
        flaky.fail_next_loads(&Counter::COLLECTION, 5);
        let serializer = MutationSerializer::new(flaky, fast_policy(1));

        let result = serializer.lease::<Counter>().await;
        assert!(matches!(result, Err(LedgerError::StoreUnavailable { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn gated_section_finishes_after_caller_is_dropped() {
        let store = Arc::new(InMemoryCollectionStore::with_latency(Duration::from_millis(30)));
        let serializer = MutationSerializer::new(store.clone(), fast_policy(0));
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();

        let caller = {
            let serializer = serializer.clone();
            tokio::spawn(async move {
                serializer
                    .with_collection::<Counter, _, _>(move |docs| {
                        let _ = entered_tx.send(());
                        increment(docs)
                    })
                    .await
            })
        };

        entered_rx.await.unwrap();
        caller.abort();

        // The next mutation queues behind the abandoned one and sees its write.
        let value = serializer.with_collection::<Counter, _, _>(increment).await.unwrap();
        assert_eq!(value, 2);
    }
}
