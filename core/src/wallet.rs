//! Wallets, ledger transactions and user accounts.
//!
//! A user's [`WalletBalance`] holds two independent currencies. Every change
//! to a balance is paired with exactly one immutable [`Transaction`], so the
//! signed sum of a user's transactions per currency always equals the
//! balance for that currency.

use crate::collection::{CollectionName, Document};
use crate::error::LedgerError;
use crate::ids::{TransactionId, UserId};
use crate::patch::UserPatch;
use crate::tournament::Region;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two wallet currencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Prize money earned in tournaments
    Winnings,
    /// Purchased credits spent on tournament entry
    Credits,
}

impl Currency {
    /// Both currencies, in a stable order.
    pub const ALL: [Self; 2] = [Self::Winnings, Self::Credits];

    /// Lowercase name used in logs, metrics and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Winnings => "winnings",
            Self::Credits => "credits",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user balance pair. Both fields are always non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Winnings balance
    pub winnings: Decimal,
    /// Credits balance
    pub credits: Decimal,
}

impl WalletBalance {
    /// An empty wallet.
    pub const ZERO: Self = Self {
        winnings: Decimal::ZERO,
        credits: Decimal::ZERO,
    };

    /// Balance for one currency.
    #[must_use]
    pub const fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Winnings => self.winnings,
            Currency::Credits => self.credits,
        }
    }

    /// Apply a signed change to one currency.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientFunds` (and leaves the wallet
    /// untouched) if the change would make the balance negative, and
    /// `LedgerError::Validation` if it would overflow.
    pub fn apply(&mut self, currency: Currency, delta: Decimal) -> Result<(), LedgerError> {
        let balance = self.get(currency);
        let updated = balance.checked_add(delta).ok_or_else(|| {
            LedgerError::Validation(format!("{currency} balance would overflow"))
        })?;
        if updated < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds {
                currency,
                balance,
                requested: -delta,
            });
        }
        match currency {
            Currency::Winnings => self.winnings = updated,
            Currency::Credits => self.credits = updated,
        }
        Ok(())
    }
}

/// Why a ledger transaction was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits granted for an approved payment request
    CreditPurchase,
    /// Entry fee paid (negative) or refunded (positive)
    TournamentEntry,
    /// Prize paid out to a player
    WinningsPayout,
    /// Manual correction by an administrator
    AdminAdjustment,
}

impl TransactionType {
    /// Snake-case name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditPurchase => "credit_purchase",
            Self::TournamentEntry => "tournament_entry",
            Self::WinningsPayout => "winnings_payout",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }
}

/// An immutable ledger entry.
///
/// `amount` is signed: positive values increase the balance, negative values
/// decrease it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// System-generated id
    pub id: TransactionId,
    /// Owner of the wallet
    pub user_id: UserId,
    /// Why the entry was written
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Signed amount
    pub amount: Decimal,
    /// Currency the amount applies to
    pub currency: Currency,
    /// Human-readable description
    pub description: String,
    /// When the entry was written
    pub date: DateTime<Utc>,
    /// Optional back-reference (payment token, tournament id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl Document for Transaction {
    const COLLECTION: CollectionName = CollectionName::TRANSACTIONS;

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

/// A user document: profile fields plus the wallet.
///
/// `journal` holds transactions whose balance change is already committed
/// but which have not yet been appended to the transactions collection. The
/// ledger drains it on every subsequent operation for this user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// User id from the identity provider
    pub id: UserId,
    /// Display name
    pub display_name: String,
    /// Home region
    pub region: Region,
    /// Current balances
    pub wallet: WalletBalance,
    /// Transactions committed with the balance but not yet appended to the log
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub journal: Vec<Transaction>,
    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Creates an account with an empty wallet.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the display name is blank.
    pub fn new(
        id: UserId,
        display_name: String,
        region: Region,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(LedgerError::Validation(
                "display name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            display_name,
            region,
            wallet: WalletBalance::ZERO,
            journal: Vec::new(),
            created_at,
        })
    }

    /// Apply a profile patch. The wallet is never touched by a patch.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the new display name is blank.
    pub fn apply_patch(&mut self, patch: UserPatch) -> Result<(), LedgerError> {
        if let Some(name) = patch.display_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(LedgerError::Validation(
                    "display name cannot be empty".to_string(),
                ));
            }
            self.display_name = name;
        }
        if let Some(region) = patch.region {
            self.region = region;
        }
        Ok(())
    }
}

impl Document for UserAccount {
    const COLLECTION: CollectionName = CollectionName::USERS;

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn debit_to_exactly_zero_is_allowed() {
        let mut wallet = WalletBalance { winnings: dec!(0), credits: dec!(25.50) };
        wallet.apply(Currency::Credits, dec!(-25.50)).unwrap();
        assert_eq!(wallet.credits, dec!(0));
    }

    #[test]
    fn overdraft_is_rejected_without_mutation() {
        let mut wallet = WalletBalance { winnings: dec!(10), credits: dec!(50) };
        let err = wallet.apply(Currency::Credits, dec!(-100)).unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                currency: Currency::Credits,
                balance: dec!(50),
                requested: dec!(100),
            }
        );
        assert_eq!(wallet, WalletBalance { winnings: dec!(10), credits: dec!(50) });
    }

    #[test]
    fn overflow_is_rejected_without_mutation() {
        let mut wallet = WalletBalance { winnings: Decimal::MAX, credits: dec!(5) };
        let err = wallet.apply(Currency::Winnings, dec!(1)).unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(wallet, WalletBalance { winnings: Decimal::MAX, credits: dec!(5) });
    }

    #[test]
    fn transaction_serializes_with_wire_names() {
        let txn = Transaction {
            id: TransactionId::new("txn-1"),
            user_id: UserId::new("u-1"),
            kind: TransactionType::CreditPurchase,
            amount: dec!(50),
            currency: Currency::Credits,
            description: "Top-up".to_string(),
            date: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc),
            related_id: Some("T1".to_string()),
        };

        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["type"], "credit_purchase");
        assert_eq!(json["currency"], "credits");
        assert_eq!(json["relatedId"], "T1");
        assert_eq!(json["userId"], "u-1");
    }

    #[test]
    fn blank_display_name_is_rejected() {
        let now = Utc::now();
        assert!(UserAccount::new(UserId::new("u"), "  ".into(), Region::India, now).is_err());
    }

    proptest! {
        #[test]
        fn balances_never_go_negative(deltas in proptest::collection::vec(-500i64..500, 0..50)) {
            let mut wallet = WalletBalance::ZERO;
            for delta in deltas {
                let before = wallet;
                if wallet.apply(Currency::Winnings, Decimal::from(delta)).is_err() {
                    prop_assert_eq!(wallet, before);
                }
                prop_assert!(wallet.winnings >= Decimal::ZERO);
            }
        }
    }
}
