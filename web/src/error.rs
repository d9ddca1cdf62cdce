//! Error types for web handlers.
//!
//! [`AppError`] bridges ledger errors and HTTP responses. Every error body
//! has the same shape:
//!
//! ```json
//! { "code": "NO_SPOTS_LEFT", "message": "no spots remaining" }
//! ```

use arena_core::LedgerError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Wallet>, AppError> {
///     let wallet = state.service.get_balance(&user_id).await?;
///     Ok(Json(wallet))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// HTTP status for a ledger error.
///
/// - 404: unknown tournament, user or payment request
/// - 409: the request conflicts with current state (seats, tokens, terminal status)
/// - 422: insufficient funds or invalid input
/// - 503: transient store failure; the whole request may be retried
/// - 500: anything else
#[must_use]
pub const fn status_for(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::NoSpotsLeft(_)
        | LedgerError::AtCapacity(_)
        | LedgerError::AlreadyEnrolled { .. }
        | LedgerError::DuplicateToken(_)
        | LedgerError::AlreadyApproved(_)
        | LedgerError::AlreadyDeclined(_) => StatusCode::CONFLICT,
        LedgerError::InsufficientFunds { .. } | LedgerError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::StoreWriteFailure { .. } | LedgerError::StoreUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        let app_error = Self::new(status_for(&error), error.user_message(), error.code());
        if error.is_rejection() {
            app_error
        } else {
            app_error.with_source(anyhow::Error::new(error))
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        } else {
            tracing::debug!(status = %self.status, code = %self.code, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}
