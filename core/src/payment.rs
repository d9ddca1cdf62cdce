//! Payment top-up requests.
//!
//! A request moves through a three-state machine:
//!
//! ```text
//!            approve
//!   pending ─────────► approved
//!      │
//!      └─────────────► declined
//!            decline
//! ```
//!
//! Both terminal states are final. Re-applying the transition that produced
//! the current terminal state is a no-op; applying the other one is an error.

use crate::collection::{CollectionName, Document};
use crate::error::LedgerError;
use crate::ids::{PaymentToken, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a payment request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Waiting for an administrator
    Pending,
    /// Credits granted
    Approved,
    /// Rejected, no wallet effect
    Declined,
}

impl PaymentStatus {
    /// Lowercase name used in logs, metrics and query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What resolving a request requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The request is pending; perform the transition
    Apply,
    /// The request is already in the requested terminal state
    AlreadyDone,
}

/// A payment top-up request keyed by its user-supplied token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// External payment reference; unique across all requests
    pub id: PaymentToken,
    /// Requesting user
    pub user_id: UserId,
    /// Credits to grant on approval
    pub amount: Decimal,
    /// Current status
    pub status: PaymentStatus,
    /// When the request was submitted
    pub requested_date: DateTime<Utc>,
    /// When the request was approved or declined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<DateTime<Utc>>,
}

impl PaymentRequest {
    /// Creates a pending request.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the amount is not positive.
    pub fn new(
        id: PaymentToken,
        user_id: UserId,
        amount: Decimal,
        requested_date: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "payment amount must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            id,
            user_id,
            amount,
            status: PaymentStatus::Pending,
            requested_date,
            processed_date: None,
        })
    }

    /// Check whether the request can be approved.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AlreadyDeclined` if the request was declined.
    pub fn approval(&self) -> Result<Transition, LedgerError> {
        match self.status {
            PaymentStatus::Pending => Ok(Transition::Apply),
            PaymentStatus::Approved => Ok(Transition::AlreadyDone),
            PaymentStatus::Declined => Err(LedgerError::AlreadyDeclined(self.id.clone())),
        }
    }

    /// Check whether the request can be declined.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AlreadyApproved` if the request was approved.
    pub fn decline(&self) -> Result<Transition, LedgerError> {
        match self.status {
            PaymentStatus::Pending => Ok(Transition::Apply),
            PaymentStatus::Declined => Ok(Transition::AlreadyDone),
            PaymentStatus::Approved => Err(LedgerError::AlreadyApproved(self.id.clone())),
        }
    }

    /// Move a pending request into a terminal status.
    ///
    /// Terminal requests are immutable; calling this on one has no effect.
    pub fn resolve(&mut self, status: PaymentStatus, processed_at: DateTime<Utc>) {
        if self.status != PaymentStatus::Pending || status == PaymentStatus::Pending {
            return;
        }
        self.status = status;
        self.processed_date = Some(processed_at);
    }
}

impl Document for PaymentRequest {
    const COLLECTION: CollectionName = CollectionName::PAYMENT_REQUESTS;

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending() -> PaymentRequest {
        PaymentRequest::new(PaymentToken::new("T1"), UserId::new("u-1"), dec!(50), Utc::now())
            .unwrap()
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let now = Utc::now();
        for amount in [dec!(0), dec!(-5)] {
            let result = PaymentRequest::new(PaymentToken::new("T"), UserId::new("u"), amount, now);
            assert!(matches!(result, Err(LedgerError::Validation(_))));
        }
    }

    #[test]
    fn approved_request_is_idempotent_and_cannot_be_declined() {
        let mut request = pending();
        assert_eq!(request.approval().unwrap(), Transition::Apply);

        request.resolve(PaymentStatus::Approved, Utc::now());
        assert_eq!(request.approval().unwrap(), Transition::AlreadyDone);
        assert_eq!(
            request.decline(),
            Err(LedgerError::AlreadyApproved(PaymentToken::new("T1")))
        );
    }

    #[test]
    fn declined_request_cannot_be_approved() {
        let mut request = pending();
        request.resolve(PaymentStatus::Declined, Utc::now());
        assert_eq!(request.decline().unwrap(), Transition::AlreadyDone);
        assert_eq!(
            request.approval(),
            Err(LedgerError::AlreadyDeclined(PaymentToken::new("T1")))
        );
    }

    #[test]
    fn terminal_requests_never_change() {
        let mut request = pending();
        let approved_at = Utc::now();
        request.resolve(PaymentStatus::Approved, approved_at);
        let snapshot = request.clone();

        request.resolve(PaymentStatus::Declined, Utc::now());
        request.resolve(PaymentStatus::Pending, Utc::now());
        assert_eq!(request, snapshot);
        assert_eq!(request.processed_date, Some(approved_at));
    }
}
