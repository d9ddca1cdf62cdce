//! HTTP API handlers, one module per resource.
//!
//! Handlers are thin: extract, call [`ArenaService`](crate::service::ArenaService),
//! map the error through `AppError`.

pub mod payments;
pub mod tournaments;
pub mod users;
