//! Application state for the ledger HTTP server.

use crate::app::ArenaApp;
use crate::service::ArenaService;
use arena_core::CollectionStore;
use axum::extract::FromRef;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Ledger operations
    pub service: ArenaService,
    /// Backing store, used by the readiness probe
    pub store: Arc<dyn CollectionStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(service: ArenaService, store: Arc<dyn CollectionStore>) -> Self {
        Self { service, store }
    }
}

impl From<ArenaApp> for AppState {
    fn from(app: ArenaApp) -> Self {
        Self::new(app.service, app.store)
    }
}

// Lets the shared readiness handler extract the store from AppState.
impl FromRef<AppState> for Arc<dyn CollectionStore> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.store)
    }
}
