//! User and wallet API endpoints.
//!
//! - POST /api/users - Register the acting user
//! - GET /api/users/me - Read the acting user's account
//! - PATCH /api/users/me - Update the acting user's profile
//! - GET /api/wallet - Acting user's balances
//! - GET /api/wallet/transactions - Acting user's transactions, newest first
//! - POST /api/admin/users/:id/adjustments - Manual balance correction
//! - GET /api/admin/users/:id/reconciliation - Balance against log check
//! - POST /api/admin/users/:id/journal/flush - Finish pending log appends

#![allow(clippy::missing_errors_doc)] // Handlers return AppError

use crate::server::state::AppState;
use crate::wallet::ReconciliationReport;
use arena_core::ids::UserId;
use arena_core::patch::UserPatch;
use arena_core::tournament::Region;
use arena_core::wallet::{Currency, Transaction, UserAccount, WalletBalance};
use arena_core::Decimal;
use arena_web::{ActingUser, AppError, CorrelationId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// Request to register the acting user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    /// Display name
    pub display_name: String,
    /// Home region
    pub region: Region,
}

/// Public view of an account. The journal stays internal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// User id
    pub id: UserId,
    /// Display name
    pub display_name: String,
    /// Home region
    pub region: Region,
    /// Current balances
    pub wallet: WalletBalance,
}

impl From<UserAccount> for UserResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            display_name: account.display_name,
            region: account.region,
            wallet: account.wallet,
        }
    }
}

/// Manual balance correction. Positive amounts credit, negative debit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    /// Currency to correct
    pub currency: Currency,
    /// Signed amount
    pub amount: Decimal,
    /// Reason recorded on the transaction
    pub description: String,
}

/// Result of a journal flush.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    /// Transactions newly appended to the log
    pub appended: usize,
}

/// Register the acting user with an empty wallet.
pub async fn register_user(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ActingUser(user_id): ActingUser,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    tracing::info!(correlation_id = %correlation_id.0, %user_id, "Registering user");
    let account = state
        .service
        .register_user(user_id, request.display_name, request.region)
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Read the acting user's account.
pub async fn get_me(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.service.get_user(&user_id).await?.into()))
}

/// Update the acting user's profile.
pub async fn update_me(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(patch): Json<UserPatch>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.service.update_user(&user_id, patch).await?.into()))
}

/// Acting user's balances.
pub async fn get_wallet(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<WalletBalance>, AppError> {
    Ok(Json(state.service.get_wallet_balance(&user_id).await?))
}

/// Acting user's transactions, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.service.list_transactions(&user_id).await?))
}

/// Post an administrative adjustment.
pub async fn adjust_balance(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ActingUser(admin): ActingUser,
    Path(user_id): Path<UserId>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    tracing::info!(
        correlation_id = %correlation_id.0,
        %admin,
        %user_id,
        amount = %request.amount,
        "Balance adjustment"
    );
    let txn = state
        .service
        .adjust_balance(user_id, request.currency, request.amount, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

/// Compare a user's balances with their transactions.
pub async fn reconcile(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<ReconciliationReport>, AppError> {
    Ok(Json(state.service.reconcile(&user_id).await?))
}

/// Append any journaled transactions of a user to the log.
pub async fn flush_journal(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<FlushResponse>, AppError> {
    let appended = state.service.flush_journal(&user_id).await?;
    Ok(Json(FlushResponse { appended }))
}
