//! Error types for the ledger and its store.
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`]: what a `CollectionStore` implementation reports
//!   (database down, malformed document, ...)
//! - [`LedgerError`]: what every ledger operation returns to its caller. It
//!   separates business-rule rejections (never retried automatically) from
//!   transient store failures (retried internally, then surfaced).

use crate::collection::CollectionName;
use crate::ids::{PaymentToken, TournamentId, UserId};
use crate::wallet::Currency;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors reported by a collection store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A document could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Errors returned by ledger operations.
///
/// # Rejections vs. failures
///
/// Business-rule rejections (`InsufficientFunds`, `NoSpotsLeft`,
/// `DuplicateToken`, ...) mean the request was understood and refused; the
/// store was not touched. `StoreWriteFailure` and `StoreUnavailable` are
/// transient: the operation had no effect and can be retried as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The referenced document does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of document that was looked up
        entity: &'static str,
        /// Id that was looked up
        id: String,
    },

    /// A debit would drive a wallet balance below zero.
    #[error("Insufficient {currency}: balance {balance} < requested {requested}")]
    InsufficientFunds {
        /// Currency that was debited
        currency: Currency,
        /// Balance at the time of the debit
        balance: Decimal,
        /// Amount that was requested
        requested: Decimal,
    },

    /// The tournament has no seats left.
    #[error("Tournament {0} has no spots left")]
    NoSpotsLeft(TournamentId),

    /// A seat release would push `spots_left` above `total_spots`.
    #[error("Tournament {0} is already at full capacity")]
    AtCapacity(TournamentId),

    /// The user already holds a seat in the tournament.
    #[error("User {user_id} is already enrolled in tournament {tournament_id}")]
    AlreadyEnrolled {
        /// Tournament that was entered
        tournament_id: TournamentId,
        /// User that tried to enter twice
        user_id: UserId,
    },

    /// A payment request with this token already exists (in any state).
    #[error("Payment token {0} has already been submitted")]
    DuplicateToken(PaymentToken),

    /// The payment request was approved earlier; it cannot be declined.
    #[error("Payment request {0} is already approved")]
    AlreadyApproved(PaymentToken),

    /// The payment request was declined earlier; it cannot be approved.
    #[error("Payment request {0} is already declined")]
    AlreadyDeclined(PaymentToken),

    /// Input failed validation before any state was touched.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Saving a collection failed even after the bounded retries.
    #[error("Write to collection {collection} failed after {attempts} attempts: {source}")]
    StoreWriteFailure {
        /// Collection that could not be written
        collection: CollectionName,
        /// Number of save attempts made
        attempts: usize,
        /// Last error reported by the store
        source: StoreError,
    },

    /// Loading a collection failed.
    #[error("Collection {collection} could not be loaded: {source}")]
    StoreUnavailable {
        /// Collection that could not be read
        collection: CollectionName,
        /// Error reported by the store
        source: StoreError,
    },

    /// An unexpected internal failure (corrupt document, failed task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the failure is transient and the whole operation may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreWriteFailure { .. } | Self::StoreUnavailable { .. }
        )
    }

    /// Whether this is a business-rule rejection (the request was refused).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::StoreWriteFailure { .. } | Self::StoreUnavailable { .. } | Self::Internal(_)
        )
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::NoSpotsLeft(_) => "NO_SPOTS_LEFT",
            Self::AtCapacity(_) => "AT_CAPACITY",
            Self::AlreadyEnrolled { .. } => "ALREADY_ENROLLED",
            Self::DuplicateToken(_) => "DUPLICATE_TOKEN",
            Self::AlreadyApproved(_) => "ALREADY_APPROVED",
            Self::AlreadyDeclined(_) => "ALREADY_DECLINED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StoreWriteFailure { .. } | Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message suitable for showing to the acting user.
    ///
    /// Rejections name the invariant that blocked the action; transient
    /// failures collapse into a generic retry message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{entity} not found"),
            Self::InsufficientFunds { currency, .. } => {
                format!("insufficient {currency} balance")
            }
            Self::NoSpotsLeft(_) => "no spots remaining".to_string(),
            Self::AtCapacity(_) => "the tournament is already at full capacity".to_string(),
            Self::AlreadyEnrolled { .. } => "you are already enrolled in this tournament".to_string(),
            Self::DuplicateToken(_) => "this transaction id was already submitted".to_string(),
            Self::AlreadyApproved(_) => "this payment request was already approved".to_string(),
            Self::AlreadyDeclined(_) => "this payment request was already declined".to_string(),
            Self::Validation(message) => message.clone(),
            Self::StoreWriteFailure { .. } | Self::StoreUnavailable { .. } | Self::Internal(_) => {
                "the request could not be completed, please retry".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_display() {
        let error = LedgerError::InsufficientFunds {
            currency: Currency::Credits,
            balance: dec!(50),
            requested: dec!(100),
        };

        let display = format!("{error}");
        assert!(display.contains("balance 50"));
        assert!(display.contains("requested 100"));
        assert_eq!(error.user_message(), "insufficient credits balance");
        assert!(error.is_rejection());
        assert!(!error.is_transient());
    }

    #[test]
    fn store_write_failure_is_transient_with_generic_message() {
        let error = LedgerError::StoreWriteFailure {
            collection: CollectionName::USERS,
            attempts: 4,
            source: StoreError::Unavailable("connection reset".to_string()),
        };

        assert!(error.is_transient());
        assert!(!error.is_rejection());
        assert!(error.to_string().contains("after 4 attempts"));
        assert_eq!(
            error.user_message(),
            "the request could not be completed, please retry"
        );
    }

    #[test]
    fn duplicate_token_message_names_the_invariant() {
        let error = LedgerError::DuplicateToken(PaymentToken::new("T1"));
        assert_eq!(error.code(), "DUPLICATE_TOKEN");
        assert_eq!(
            error.user_message(),
            "this transaction id was already submitted"
        );
    }
}
