//! Tournament API endpoints.
//!
//! - POST /api/tournaments - Create a tournament
//! - GET /api/tournaments?region= - List tournaments
//! - GET /api/tournaments/:id - Get one tournament
//! - PATCH /api/tournaments/:id - Partial update
//! - DELETE /api/tournaments/:id - Delete
//! - PUT /api/tournaments/:id/capacity - Resize
//! - POST /api/tournaments/:id/enrollment - Claim a seat for the acting user
//! - DELETE /api/tournaments/:id/enrollment - Release the acting user's seat
//! - POST /api/tournaments/:id/payouts - Pay winnings to a player

#![allow(clippy::missing_errors_doc)] // Handlers return AppError

use crate::seats::SeatResult;
use crate::server::state::AppState;
use arena_core::Decimal;
use arena_core::ids::{TournamentId, UserId};
use arena_core::patch::TournamentPatch;
use arena_core::tournament::{NewTournament, Region, Tournament};
use arena_core::wallet::Transaction;
use arena_web::{ActingUser, CorrelationId, WebResult};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Query parameters for listing tournaments.
#[derive(Debug, Default, Deserialize)]
pub struct ListTournamentsQuery {
    /// Only tournaments hosted in this region
    pub region: Option<Region>,
}

/// Request to change capacity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeRequest {
    /// New capacity (at least 1)
    pub total_spots: u32,
}

/// Request to pay winnings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    /// Winner
    pub user_id: UserId,
    /// Prize amount
    pub amount: Decimal,
}

/// Create a tournament.
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(input): Json<NewTournament>,
) -> WebResult<(StatusCode, Json<Tournament>)> {
    let tournament = state.service.create_tournament(input).await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

/// List tournaments, newest first.
pub async fn list_tournaments(
    State(state): State<AppState>,
    Query(query): Query<ListTournamentsQuery>,
) -> WebResult<Json<Vec<Tournament>>> {
    Ok(Json(state.service.list_tournaments(query.region).await?))
}

/// Get one tournament.
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> WebResult<Json<Tournament>> {
    Ok(Json(state.service.get_tournament(&id).await?))
}

/// Apply a partial update.
pub async fn update_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
    Json(patch): Json<TournamentPatch>,
) -> WebResult<Json<Tournament>> {
    Ok(Json(state.service.update_tournament(&id, patch).await?))
}

/// Delete a tournament.
pub async fn delete_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> WebResult<StatusCode> {
    state.service.delete_tournament(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change capacity, preserving taken seats.
pub async fn resize_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
    Json(request): Json<ResizeRequest>,
) -> WebResult<Json<Tournament>> {
    Ok(Json(
        state
            .service
            .resize_tournament(&id, request.total_spots)
            .await?,
    ))
}

/// Claim a seat for the acting user.
pub async fn enroll(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ActingUser(user_id): ActingUser,
    Path(id): Path<TournamentId>,
) -> WebResult<(StatusCode, Json<SeatResult>)> {
    tracing::debug!(correlation_id = %correlation_id.0, tournament_id = %id, %user_id, "Enroll request");
    let seat = state.service.enroll_in_tournament(&id, &user_id).await?;
    Ok((StatusCode::CREATED, Json(seat)))
}

/// Release the acting user's seat.
pub async fn cancel_enrollment(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ActingUser(user_id): ActingUser,
    Path(id): Path<TournamentId>,
) -> WebResult<Json<SeatResult>> {
    tracing::debug!(correlation_id = %correlation_id.0, tournament_id = %id, %user_id, "Cancel request");
    Ok(Json(state.service.cancel_enrollment(&id, &user_id).await?))
}

/// Pay winnings from a tournament.
pub async fn payout_winnings(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
    Json(request): Json<PayoutRequest>,
) -> WebResult<(StatusCode, Json<Transaction>)> {
    let txn = state
        .service
        .payout_winnings(request.user_id, &id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}
