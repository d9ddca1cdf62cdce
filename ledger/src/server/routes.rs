//! Router configuration for the Arena ledger.

use super::state::AppState;
use crate::api::{payments, tournaments, users};
use arena_web::handlers::{health_check, readiness_check};
use arena_web::middleware::correlation_id;
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health probes sit at the root; everything else is nested under `/api`.
/// Every request gets a correlation id and an HTTP trace span.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Users and wallets
        .route("/users", post(users::register_user))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/wallet", get(users::get_wallet))
        .route("/wallet/transactions", get(users::list_transactions))
        // Tournaments
        .route(
            "/tournaments",
            post(tournaments::create_tournament).get(tournaments::list_tournaments),
        )
        .route(
            "/tournaments/:id",
            get(tournaments::get_tournament)
                .patch(tournaments::update_tournament)
                .delete(tournaments::delete_tournament),
        )
        .route("/tournaments/:id/capacity", put(tournaments::resize_tournament))
        .route(
            "/tournaments/:id/enrollment",
            post(tournaments::enroll).delete(tournaments::cancel_enrollment),
        )
        .route("/tournaments/:id/payouts", post(tournaments::payout_winnings))
        // Payment requests
        .route(
            "/payment-requests",
            post(payments::submit).get(payments::list),
        )
        .route("/payment-requests/:token", get(payments::get))
        .route("/payment-requests/:token/approve", post(payments::approve))
        .route("/payment-requests/:token/decline", post(payments::decline))
        // Administration
        .route("/admin/users/:id/adjustments", post(users::adjust_balance))
        .route("/admin/users/:id/reconciliation", get(users::reconcile))
        .route("/admin/users/:id/journal/flush", post(users::flush_journal));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(correlation_id))
        .with_state(state)
}
