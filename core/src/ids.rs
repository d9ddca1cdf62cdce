//! Strongly typed identifiers.
//!
//! Every identifier in the ledger is an opaque string wrapped in a newtype so
//! a `UserId` can never be passed where a `TournamentId` is expected.
//!
//! # Validation
//!
//! - `FromStr::from_str()`: Validates input (rejects empty or blank strings)
//! - `From::from()` and `new()`: No validation (for trusted, application-controlled input)
//!
//! Use `FromStr` when parsing external input such as HTTP paths and headers.
//!
//! # Examples
//!
//! ```
//! use arena_core::ids::{PaymentToken, UserId};
//!
//! let user = UserId::new("user-42");
//! assert_eq!(user.as_str(), "user-42");
//!
//! let token: PaymentToken = "UTR-88231".parse().unwrap();
//! assert_eq!(token.to_string(), "UTR-88231");
//!
//! assert!("   ".parse::<PaymentToken>().is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: identifier must not be empty")]
pub struct ParseIdError {
    /// Which identifier failed to parse
    pub kind: &'static str,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` without validation.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a tournament document.
    TournamentId,
    "tournament id"
);

string_id!(
    /// Identifier of the game a tournament is played in.
    GameId,
    "game id"
);

string_id!(
    /// Identifier of a user, supplied by the identity provider.
    UserId,
    "user id"
);

string_id!(
    /// System-generated identifier of a ledger transaction.
    TransactionId,
    "transaction id"
);

string_id!(
    /// Identifier of an enrollment (the seat token handed back by `enroll`).
    EnrollmentId,
    "enrollment id"
);

string_id!(
    /// User-supplied external payment reference.
    ///
    /// The token is both the primary key of a payment request and its
    /// idempotency key: the same external payment can only be submitted once.
    PaymentToken,
    "payment token"
);
