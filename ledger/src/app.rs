//! Application bootstrap: store selection and service wiring.

use crate::config::{StoreBackend, StoreConfig};
use crate::service::ArenaService;
use arena_core::environment::{SystemClock, UuidGenerator};
use arena_core::{CollectionStore, StoreError};
use arena_postgres::PostgresCollectionStore;
use arena_testing::InMemoryCollectionStore;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while starting the ledger.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The collection store could not be reached or migrated.
    #[error("Collection store initialization failed: {0}")]
    Store(#[from] StoreError),
}

/// The wired service plus the store it runs on.
#[derive(Clone)]
pub struct ArenaApp {
    /// Ledger operations
    pub service: ArenaService,
    /// Backing store, for readiness checks
    pub store: Arc<dyn CollectionStore>,
}

impl ArenaApp {
    /// Connect the configured store and wire the service with the system
    /// clock and UUID ids.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Store` if the postgres backend cannot connect
    /// or migrate.
    pub async fn new(config: &StoreConfig) -> Result<Self, StartupError> {
        let store = connect_store(config).await?;
        let service = ArenaService::new(
            Arc::clone(&store),
            config.retry_policy(),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
        );
        Ok(Self { service, store })
    }
}

impl std::fmt::Debug for ArenaApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaApp")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Open the store selected by `config.backend`.
///
/// # Errors
///
/// Returns the store error if postgres cannot connect or migrate.
pub async fn connect_store(
    config: &StoreConfig,
) -> Result<Arc<dyn CollectionStore>, StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryCollectionStore::new()))
        }
        StoreBackend::Postgres => {
            let store =
                PostgresCollectionStore::connect(&config.database_url, config.max_connections)
                    .await?;
            store.migrate().await?;
            tracing::info!(
                max_connections = config.max_connections,
                "Connected to PostgreSQL collection store"
            );
            Ok(Arc::new(store))
        }
    }
}
