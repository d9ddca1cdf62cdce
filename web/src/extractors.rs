//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id
//! - [`ActingUser`]: the authenticated user making the request
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     correlation_id: CorrelationId,
//!     ActingUser(user_id): ActingUser,
//! ) -> Result<Json<WalletBalance>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, %user_id, "Reading wallet");
//!     Ok(Json(state.service.get_balance(&user_id).await?))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use arena_core::ids::UserId;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated user id.
///
/// Authentication happens upstream; by the time a request reaches the
/// ledger the gateway has replaced this header with the verified identity.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Correlation ID for request tracing.
///
/// Uses the id stored by the correlation middleware if it ran, otherwise the
/// `X-Correlation-ID` header, otherwise a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(*existing);
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The user on whose behalf the request acts.
///
/// Rejects with 401 if the `X-User-Id` header is missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<UserId>().ok())
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("missing or invalid user identity"))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let req = Request::builder().body(()).expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_ne!(correlation_id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn acting_user_reads_the_header() {
        let req = Request::builder()
            .header(USER_ID_HEADER, " player-7 ")
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let ActingUser(user_id) = ActingUser::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(user_id, UserId::new("player-7"));
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        for req in [
            Request::builder().body(()).expect("Valid request"),
            Request::builder()
                .header(USER_ID_HEADER, "   ")
                .body(())
                .expect("Valid request"),
        ] {
            let (mut parts, _) = req.into_parts();
            let rejection = ActingUser::from_request_parts(&mut parts, &())
                .await
                .expect_err("Should reject");
            assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
