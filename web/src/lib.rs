//! Axum integration for the Arena tournament ledger.
//!
//! This crate holds the HTTP plumbing shared by Arena services:
//!
//! - [`AppError`]: maps ledger errors onto status codes and a `{code, message}` body
//! - [`extractors`]: the acting user (`X-User-Id`) and the correlation id
//! - [`middleware::correlation_id`]: request spans and `X-Correlation-ID` echo
//! - [`handlers::health`]: liveness and store-readiness endpoints
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** the acting user and JSON body
//! 3. **Call** the ledger service
//! 4. **Map** `LedgerError` to an HTTP response via `AppError`

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{ActingUser, CorrelationId, USER_ID_HEADER};
pub use middleware::CORRELATION_ID_HEADER;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
