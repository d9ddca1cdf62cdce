//! Request correlation middleware.
//!
//! [`correlation_id`] runs every request inside a tracing span tagged with a
//! correlation id, stores the id in the request extensions for the
//! [`CorrelationId`](crate::extractors::CorrelationId) extractor, and echoes
//! it in the response's `X-Correlation-ID` header.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware};
//! use arena_web::middleware::correlation_id;
//!
//! let app = Router::new()
//!     .route("/api/wallet", get(get_wallet))
//!     .layer(middleware::from_fn(correlation_id));
//! ```

use crate::extractors::CorrelationId;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Attach a correlation id to the request, its span and its response.
///
/// A valid UUID in the incoming header is reused; anything else is replaced.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(CorrelationId(id));

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %id,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
