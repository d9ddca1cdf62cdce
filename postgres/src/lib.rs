//! `PostgreSQL` collection store for the Arena tournament ledger.
//!
//! Each collection is one row in `arena_collections`; its documents live in a
//! single JSONB array. A save is one upsert statement, so readers always see
//! a whole collection from a single committed save.
//!
//! ```sql
//! CREATE TABLE arena_collections (
//!     name TEXT PRIMARY KEY,
//!     documents JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! The store provides no isolation between a load and a later save; every
//! mutation must go through `arena_runtime::gate::MutationSerializer`.
//!
//! # Example
//!
//! ```no_run
//! use arena_postgres::PostgresCollectionStore;
//!
//! # async fn example() -> Result<(), arena_core::StoreError> {
//! let store = PostgresCollectionStore::connect("postgres://localhost/arena", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use arena_core::store::StoreFuture;
use arena_core::{CollectionName, CollectionStore, StoreError};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Instant;

/// PostgreSQL-backed whole-collection store.
#[derive(Clone, Debug)]
pub struct PostgresCollectionStore {
    pool: PgPool,
}

impl PostgresCollectionStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the `arena_collections` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_collection(&self, collection: &CollectionName) -> Result<Vec<Value>, StoreError> {
        let started = Instant::now();
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT documents FROM arena_collections WHERE name = $1")
                .bind(collection.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        metrics::histogram!("postgres_collection_load_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match row {
            None => Ok(Vec::new()),
            Some((Value::Array(documents),)) => Ok(documents),
            Some((other,)) => Err(StoreError::SerializationError(format!(
                "collection {collection} is not a JSON array: {other}"
            ))),
        }
    }

    async fn save_collection(
        &self,
        collection: &CollectionName,
        documents: Vec<Value>,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        let count = documents.len();

        sqlx::query(
            "INSERT INTO arena_collections (name, documents, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (name) DO UPDATE
             SET documents = EXCLUDED.documents, updated_at = now()",
        )
        .bind(collection.as_str())
        .bind(Value::Array(documents))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        metrics::histogram!("postgres_collection_save_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::trace!(%collection, documents = count, "Collection saved");
        Ok(())
    }
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(error.to_string())
        }
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreError::SerializationError(error.to_string())
        }
        other => StoreError::DatabaseError(other.to_string()),
    }
}

impl CollectionStore for PostgresCollectionStore {
    fn load<'a>(&'a self, collection: &'a CollectionName) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(self.load_collection(collection))
    }

    fn save<'a>(
        &'a self,
        collection: &'a CollectionName,
        documents: Vec<Value>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.save_collection(collection, documents))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
    }
}
