//! Business metrics for the Arena ledger.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `arena_enrollments_total{outcome}` - Seat claims and releases by outcome
//! - `arena_payment_requests_total{status}` - Payment requests by resulting status
//! - `arena_ledger_entries_total{currency,direction}` - Wallet entries written
//!
//! The collection gate metrics (`collection_*`) are recorded by
//! `arena-runtime`.

use arena_core::wallet::Currency;
use metrics::describe_counter;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "arena_enrollments_total",
        "Tournament seat operations by outcome (enrolled, cancelled, rejected, compensated)"
    );
    describe_counter!(
        "arena_payment_requests_total",
        "Payment requests by status (pending, approved, declined)"
    );
    describe_counter!(
        "arena_ledger_entries_total",
        "Ledger transactions written, by currency and direction (credit, debit)"
    );

    tracing::info!("Business metrics registered");
}

/// Record the outcome of a seat operation.
pub fn record_enrollment(outcome: &'static str) {
    metrics::counter!("arena_enrollments_total", "outcome" => outcome).increment(1);
    tracing::debug!(outcome, "Recorded enrollment metric");
}

/// Record a payment request reaching `status`.
pub fn record_payment_request(status: &'static str) {
    metrics::counter!("arena_payment_requests_total", "status" => status).increment(1);
}

/// Record a committed ledger entry.
pub fn record_entry(currency: Currency, credit: bool) {
    let direction = if credit { "credit" } else { "debit" };
    metrics::counter!(
        "arena_ledger_entries_total",
        "currency" => currency.as_str(),
        "direction" => direction
    )
    .increment(1);
}
