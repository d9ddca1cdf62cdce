//! Payment request API endpoints.
//!
//! - POST /api/payment-requests - Submit a top-up for the acting user
//! - GET /api/payment-requests?status= - List requests, newest first
//! - GET /api/payment-requests/:token - Get one request
//! - POST /api/payment-requests/:token/approve - Approve and credit
//! - POST /api/payment-requests/:token/decline - Decline
//!
//! Approve and decline are idempotent: repeating the call that produced the
//! current status returns the stored request with 200.

#![allow(clippy::missing_errors_doc)] // Handlers return AppError

use crate::server::state::AppState;
use arena_core::Decimal;
use arena_core::ids::PaymentToken;
use arena_core::payment::{PaymentRequest, PaymentStatus};
use arena_web::{ActingUser, AppError, CorrelationId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Request to submit a payment top-up.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    /// External payment reference, unique per request
    #[serde(alias = "transactionId")]
    pub token: PaymentToken,
    /// Credits requested
    pub amount: Decimal,
}

/// Query parameters for listing payment requests.
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentRequestsQuery {
    /// Only requests in this status
    pub status: Option<PaymentStatus>,
}

/// Submit a payment request for the acting user.
pub async fn submit(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ActingUser(user_id): ActingUser,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRequest>), AppError> {
    let token: PaymentToken = request
        .token
        .as_str()
        .parse()
        .map_err(|e: arena_core::ids::ParseIdError| AppError::bad_request(e.to_string()))?;
    tracing::info!(correlation_id = %correlation_id.0, %user_id, %token, "Payment request received");

    let created = state
        .service
        .submit_payment_request(user_id, request.amount, token)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List payment requests.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentRequestsQuery>,
) -> Result<Json<Vec<PaymentRequest>>, AppError> {
    Ok(Json(state.service.list_payment_requests(query.status).await?))
}

/// Get one payment request.
pub async fn get(
    State(state): State<AppState>,
    Path(token): Path<PaymentToken>,
) -> Result<Json<PaymentRequest>, AppError> {
    Ok(Json(state.service.get_payment_request(&token).await?))
}

/// Approve a payment request.
pub async fn approve(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(token): Path<PaymentToken>,
) -> Result<Json<PaymentRequest>, AppError> {
    tracing::info!(correlation_id = %correlation_id.0, %token, "Approving payment request");
    Ok(Json(state.service.approve_payment_request(&token).await?))
}

/// Decline a payment request.
pub async fn decline(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(token): Path<PaymentToken>,
) -> Result<Json<PaymentRequest>, AppError> {
    tracing::info!(correlation_id = %correlation_id.0, %token, "Declining payment request");
    Ok(Json(state.service.decline_payment_request(&token).await?))
}
