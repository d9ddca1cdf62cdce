//! HTTP surface: routing, status codes and error bodies.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use arena_core::Decimal;
use arena_ledger::{AppState, build_router};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use common::Harness;
use serde_json::{Value, json};

struct Api {
    harness: Harness,
    server: TestServer,
}

impl Api {
    fn new() -> Self {
        let harness = Harness::new();
        let state = AppState::new(harness.service.clone(), harness.store.clone());
        let server = TestServer::new(build_router(state)).unwrap();
        Self { harness, server }
    }

    fn as_user(request: TestRequest, user: &'static str) -> TestRequest {
        request.add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static(user),
        )
    }

    async fn register(&self, user: &'static str) {
        Self::as_user(self.server.post("/api/users"), user)
            .json(&json!({ "displayName": user, "region": "INDIA" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    async fn grant(&self, user: &str, amount: u32) {
        Self::as_user(
            self.server.post(&format!("/api/admin/users/{user}/adjustments")),
            "admin",
        )
        .json(&json!({ "currency": "credits", "amount": amount, "description": "grant" }))
        .await
        .assert_status(StatusCode::CREATED);
    }

    async fn create_tournament(&self, total_spots: u32, entry_fee: u32) -> String {
        let response = self
            .server
            .post("/api/tournaments")
            .json(&json!({
                "gameId": "chess",
                "name": "Friday Blitz",
                "region": "INDIA",
                "totalSpots": total_spots,
                "entryFee": entry_fee,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    async fn credits(&self, user: &'static str) -> Decimal {
        let wallet = Self::as_user(self.server.get("/api/wallet"), user)
            .await
            .json::<Value>();
        decimal(&wallet["credits"])
    }
}

/// Decimals serialize as strings; accept numbers too.
fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[tokio::test]
async fn probes_report_liveness_and_store_readiness() {
    let api = Api::new();

    api.server.get("/health").await.assert_status_ok();
    api.server.get("/ready").await.assert_status_ok();

    api.harness.store.set_unreachable(true);
    let response = api.server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "unavailable");
    api.server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn requests_without_a_user_are_unauthorized() {
    let api = Api::new();

    let response = api.server.get("/api/wallet").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn registration_exposes_profile_and_wallet() {
    let api = Api::new();
    api.register("alice").await;

    let me = Api::as_user(api.server.get("/api/users/me"), "alice")
        .await
        .json::<Value>();
    assert_eq!(me["id"], "alice");
    assert_eq!(me["region"], "INDIA");
    assert!(me.get("journal").is_none());
    assert_eq!(decimal(&me["wallet"]["credits"]), Decimal::ZERO);

    let updated = Api::as_user(api.server.patch("/api/users/me"), "alice")
        .json(&json!({ "displayName": "Alice A." }))
        .await
        .json::<Value>();
    assert_eq!(updated["displayName"], "Alice A.");

    let response = Api::as_user(api.server.get("/api/users/me"), "nobody").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn enrollment_flow_over_http() {
    let api = Api::new();
    api.register("alice").await;
    api.register("bob").await;
    api.grant("alice", 30).await;
    api.grant("bob", 30).await;
    let id = api.create_tournament(1, 10).await;
    let enrollment = format!("/api/tournaments/{id}/enrollment");

    let seat = Api::as_user(api.server.post(&enrollment), "alice").await;
    seat.assert_status(StatusCode::CREATED);
    let seat = seat.json::<Value>();
    assert_eq!(seat["spotsLeft"], 0);
    assert_eq!(seat["totalSpots"], 1);
    assert_eq!(api.credits("alice").await, Decimal::from(20));

    let sold_out = Api::as_user(api.server.post(&enrollment), "bob").await;
    sold_out.assert_status(StatusCode::CONFLICT);
    assert_eq!(sold_out.json::<Value>()["code"], "NO_SPOTS_LEFT");
    assert_eq!(api.credits("bob").await, Decimal::from(30));

    let history = Api::as_user(api.server.get("/api/wallet/transactions"), "alice")
        .await
        .json::<Value>();
    assert_eq!(history[0]["type"], "tournament_entry");
    assert_eq!(decimal(&history[0]["amount"]), Decimal::from(-10));

    let released = Api::as_user(api.server.delete(&enrollment), "alice").await;
    released.assert_status_ok();
    assert_eq!(released.json::<Value>()["spotsLeft"], 1);
    assert_eq!(api.credits("alice").await, Decimal::from(30));

    let report = api
        .server
        .get("/api/admin/users/alice/reconciliation")
        .await
        .json::<Value>();
    assert_eq!(report["transactions"], 3);
}

#[tokio::test]
async fn insufficient_funds_is_unprocessable() {
    let api = Api::new();
    api.register("carol").await;
    let id = api.create_tournament(4, 10).await;

    let response = Api::as_user(
        api.server.post(&format!("/api/tournaments/{id}/enrollment")),
        "carol",
    )
    .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "INSUFFICIENT_FUNDS");

    let tournament = api
        .server
        .get(&format!("/api/tournaments/{id}"))
        .await
        .json::<Value>();
    assert_eq!(tournament["spotsLeft"], 4);
}

#[tokio::test]
async fn tournament_lifecycle() {
    let api = Api::new();
    let id = api.create_tournament(4, 0).await;
    let path = format!("/api/tournaments/{id}");

    let resized = api
        .server
        .put(&format!("{path}/capacity"))
        .json(&json!({ "totalSpots": 8 }))
        .await
        .json::<Value>();
    assert_eq!(resized["spotsLeft"], 8);

    let listed = api
        .server
        .get("/api/tournaments")
        .add_query_param("region", "USA")
        .await
        .json::<Vec<Value>>();
    assert!(listed.is_empty());

    api.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    api.server
        .get(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_approval_is_idempotent_over_http() {
    let api = Api::new();
    api.register("dave").await;

    let submitted = Api::as_user(api.server.post("/api/payment-requests"), "dave")
        .json(&json!({ "transactionId": "T1", "amount": 50 }))
        .await;
    submitted.assert_status(StatusCode::CREATED);
    assert_eq!(submitted.json::<Value>()["status"], "pending");

    let duplicate = Api::as_user(api.server.post("/api/payment-requests"), "dave")
        .json(&json!({ "token": "T1", "amount": 5 }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["code"], "DUPLICATE_TOKEN");

    for _ in 0..2 {
        let approved = api.server.post("/api/payment-requests/T1/approve").await;
        approved.assert_status_ok();
        assert_eq!(approved.json::<Value>()["status"], "approved");
    }
    assert_eq!(api.credits("dave").await, Decimal::from(50));

    let declined = api.server.post("/api/payment-requests/T1/decline").await;
    declined.assert_status(StatusCode::CONFLICT);
    assert_eq!(declined.json::<Value>()["code"], "ALREADY_APPROVED");

    let blank = Api::as_user(api.server.post("/api/payment-requests"), "dave")
        .json(&json!({ "token": "   ", "amount": 5 }))
        .await;
    blank.assert_status(StatusCode::BAD_REQUEST);
}
