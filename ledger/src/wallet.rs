//! Wallet ledger: balances and the append-only transaction log.
//!
//! Balances live on user documents and the log lives in its own collection,
//! and the store cannot write both in one step. Every posting therefore goes
//! through a per-user journal:
//!
//! 1. Under the users gate: apply the change to the wallet and push the
//!    pre-built transaction onto the user's journal, then commit. This is the
//!    point at which the posting has happened.
//! 2. Under the transactions gate: append the journaled transactions whose
//!    ids are not in the log yet.
//! 3. Under the users gate again: drop the appended transactions from the
//!    journal.
//!
//! A failure in step 2 or 3 leaves the transaction in the journal, where
//! reads still see it and the next posting (or [`WalletLedger::flush_journal`])
//! finishes the append. Since appends skip ids already present, replaying
//! the steps never duplicates an entry.

use crate::metrics;
use arena_core::environment::{Clock, IdGenerator};
use arena_core::ids::{TournamentId, TransactionId, UserId};
use arena_core::patch::UserPatch;
use arena_core::tournament::Region;
use arena_core::wallet::{Currency, Transaction, TransactionType, UserAccount, WalletBalance};
use arena_core::{Decimal, LedgerError};
use arena_runtime::{MutationSerializer, Outcome, run_to_completion};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A posting request. `amount` is the unsigned magnitude; the operation
/// decides the sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Wallet owner
    pub user_id: UserId,
    /// Currency to move
    pub currency: Currency,
    /// Magnitude, must be positive
    pub amount: Decimal,
    /// Transaction type recorded in the log
    pub kind: TransactionType,
    /// Optional back-reference (payment token, tournament id, enrollment id)
    pub related_id: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl LedgerEntry {
    /// Create an entry without a back-reference.
    #[must_use]
    pub fn new(
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        kind: TransactionType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            currency,
            amount,
            kind,
            related_id: None,
            description: description.into(),
        }
    }

    /// Attach a back-reference.
    #[must_use]
    pub fn related_to(mut self, related_id: impl ToString) -> Self {
        self.related_id = Some(related_id.to_string());
        self
    }

    fn matches_credit(&self, txn: &Transaction) -> bool {
        txn.user_id == self.user_id
            && txn.kind == self.kind
            && txn.amount > Decimal::ZERO
            && txn.related_id.is_some()
            && txn.related_id == self.related_id
    }
}

/// Result of [`WalletLedger::credit_once`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The credit was posted by this call
    Applied(Transaction),
    /// An earlier call already posted it; nothing changed
    AlreadyApplied(Transaction),
}

impl CreditOutcome {
    /// The transaction that carries the credit.
    #[must_use]
    pub const fn transaction(&self) -> &Transaction {
        match self {
            Self::Applied(txn) | Self::AlreadyApplied(txn) => txn,
        }
    }

    /// Whether this call changed the wallet.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Balance against log comparison for one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyReconciliation {
    /// Currency compared
    pub currency: Currency,
    /// Balance on the wallet
    pub balance: Decimal,
    /// Signed sum of the user's transactions
    pub ledger_sum: Decimal,
    /// `balance - ledger_sum`; zero when consistent
    pub drift: Decimal,
}

/// Outcome of [`WalletLedger::reconcile`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// User checked
    pub user_id: UserId,
    /// Number of transactions considered (log plus journal)
    pub transactions: usize,
    /// One row per currency
    pub currencies: Vec<CurrencyReconciliation>,
}

impl ReconciliationReport {
    /// Whether every currency balances.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.currencies.iter().all(|c| c.drift.is_zero())
    }
}

/// Per-user wallets and the transaction log.
#[derive(Clone)]
pub struct WalletLedger {
    serializer: MutationSerializer,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl WalletLedger {
    /// Create a ledger over a shared serializer.
    #[must_use]
    pub fn new(
        serializer: MutationSerializer,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            serializer,
            clock,
            ids,
        }
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Register a user with an empty wallet.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank display name or an id that is already
    /// registered; store errors otherwise.
    pub async fn register_user(
        &self,
        user_id: UserId,
        display_name: String,
        region: Region,
    ) -> Result<UserAccount, LedgerError> {
        let account = UserAccount::new(user_id, display_name, region, self.clock.now())?;

        self.serializer
            .with_collection::<UserAccount, _, _>(move |users| {
                if users.iter().any(|u| u.id == account.id) {
                    return Err(LedgerError::Validation(
                        "user already registered".to_string(),
                    ));
                }
                tracing::info!(user_id = %account.id, "User registered");
                users.push(account.clone());
                Ok(Outcome::Changed(account))
            })
            .await
    }

    /// Read a user account.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user is not registered.
    pub async fn get_user(&self, user_id: &UserId) -> Result<UserAccount, LedgerError> {
        self.serializer
            .snapshot::<UserAccount>()
            .await?
            .into_iter()
            .find(|u| &u.id == user_id)
            .ok_or_else(|| LedgerError::not_found("user", user_id))
    }

    /// Apply a profile patch. Wallets are never touched by a patch.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user, `Validation` for a blank name.
    pub async fn update_user(
        &self,
        user_id: &UserId,
        patch: UserPatch,
    ) -> Result<UserAccount, LedgerError> {
        let user_id = user_id.clone();
        self.serializer
            .with_collection::<UserAccount, _, _>(move |users| {
                let user = users
                    .iter_mut()
                    .find(|u| u.id == user_id)
                    .ok_or_else(|| LedgerError::not_found("user", &user_id))?;
                user.apply_patch(patch)?;
                Ok(Outcome::Changed(user.clone()))
            })
            .await
    }

    // ------------------------------------------------------------------
    // Postings
    // ------------------------------------------------------------------

    /// Increase a balance and record the matching transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for a non-positive amount, `NotFound` for an unknown
    /// user, store errors otherwise. On error nothing was written.
    pub async fn credit(&self, entry: LedgerEntry) -> Result<Transaction, LedgerError> {
        self.post(entry, true, false)
            .await
            .map(|outcome| match outcome {
                CreditOutcome::Applied(txn) | CreditOutcome::AlreadyApplied(txn) => txn,
            })
    }

    /// Decrease a balance and record the matching transaction.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` if the balance would go negative; otherwise as
    /// [`WalletLedger::credit`]. On error nothing was written.
    pub async fn debit(&self, entry: LedgerEntry) -> Result<Transaction, LedgerError> {
        self.post(entry, false, false)
            .await
            .map(|outcome| match outcome {
                CreditOutcome::Applied(txn) | CreditOutcome::AlreadyApplied(txn) => txn,
            })
    }

    /// Credit unless a credit with the same type and `related_id` already
    /// exists for this user.
    ///
    /// The check and the posting happen under the same users gate, so two
    /// concurrent calls with the same key credit exactly once.
    ///
    /// # Errors
    ///
    /// `Validation` if the entry has no `related_id`; otherwise as
    /// [`WalletLedger::credit`].
    pub async fn credit_once(&self, entry: LedgerEntry) -> Result<CreditOutcome, LedgerError> {
        if entry.related_id.is_none() {
            return Err(LedgerError::Validation(
                "an idempotent credit needs a related id".to_string(),
            ));
        }
        self.post(entry, true, true).await
    }

    /// Administrative correction. Positive amounts credit, negative debit.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero amount; otherwise as credit or debit.
    pub async fn adjust(
        &self,
        user_id: UserId,
        currency: Currency,
        signed_amount: Decimal,
        description: String,
    ) -> Result<Transaction, LedgerError> {
        let entry = LedgerEntry::new(
            user_id,
            currency,
            signed_amount.abs(),
            TransactionType::AdminAdjustment,
            description,
        );
        if signed_amount > Decimal::ZERO {
            self.credit(entry).await
        } else if signed_amount < Decimal::ZERO {
            self.debit(entry).await
        } else {
            Err(LedgerError::Validation(
                "adjustment amount cannot be zero".to_string(),
            ))
        }
    }

    /// Pay tournament winnings.
    ///
    /// # Errors
    ///
    /// As [`WalletLedger::credit`].
    pub async fn payout_winnings(
        &self,
        user_id: UserId,
        tournament_id: &TournamentId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        let entry = LedgerEntry::new(
            user_id,
            Currency::Winnings,
            amount,
            TransactionType::WinningsPayout,
            format!("Winnings from tournament {tournament_id}"),
        )
        .related_to(tournament_id);
        self.credit(entry).await
    }

    /// The credit that [`WalletLedger::credit_once`] would treat as already
    /// posted for `entry`, if any.
    ///
    /// Looks in the user's journal before the log, so a transaction being
    /// flushed concurrently is seen in one of them.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user; store errors otherwise.
    pub async fn find_credit(
        &self,
        entry: &LedgerEntry,
    ) -> Result<Option<Transaction>, LedgerError> {
        let journaled = self
            .get_user(&entry.user_id)
            .await?
            .journal
            .into_iter()
            .find(|txn| entry.matches_credit(txn));
        match journaled {
            Some(txn) => Ok(Some(txn)),
            None => self.logged_credit(entry).await,
        }
    }

    async fn logged_credit(
        &self,
        entry: &LedgerEntry,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(self
            .serializer
            .snapshot::<Transaction>()
            .await?
            .into_iter()
            .find(|txn| entry.matches_credit(txn)))
    }

    async fn post(
        &self,
        entry: LedgerEntry,
        credit: bool,
        once: bool,
    ) -> Result<CreditOutcome, LedgerError> {
        if entry.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }

        let mut users = self.serializer.lease::<UserAccount>().await?;
        let ledger = self.clone();

        run_to_completion(async move {
            let user_id = entry.user_id.clone();

            if once {
                let journaled = users
                    .find(user_id.as_str())
                    .ok_or_else(|| LedgerError::not_found("user", &user_id))?
                    .journal
                    .iter()
                    .find(|txn| entry.matches_credit(txn))
                    .cloned();
                let existing = match journaled {
                    Some(txn) => Some(txn),
                    None => ledger.logged_credit(&entry).await?,
                };
                if let Some(txn) = existing {
                    tracing::debug!(
                        %user_id,
                        related_id = ?entry.related_id,
                        transaction_id = %txn.id,
                        "Credit already applied"
                    );
                    return Ok(CreditOutcome::AlreadyApplied(txn));
                }
            }

            let signed = if credit { entry.amount } else { -entry.amount };
            let txn = Transaction {
                id: TransactionId::new(ledger.ids.next_id("txn")),
                user_id: user_id.clone(),
                kind: entry.kind,
                amount: signed,
                currency: entry.currency,
                description: entry.description,
                date: ledger.clock.now(),
                related_id: entry.related_id,
            };

            let user = users
                .find_mut(user_id.as_str())
                .ok_or_else(|| LedgerError::not_found("user", &user_id))?;
            if let Err(error) = user.wallet.apply(txn.currency, signed) {
                tracing::debug!(%user_id, currency = %txn.currency, %error, "Debit rejected");
                return Err(error);
            }
            user.journal.push(txn.clone());
            let pending = user.journal.clone();
            users.commit().await?;

            metrics::record_entry(txn.currency, credit);
            tracing::info!(
                %user_id,
                transaction_id = %txn.id,
                kind = txn.kind.as_str(),
                currency = %txn.currency,
                amount = %txn.amount,
                "Ledger entry posted"
            );

            if let Err(error) = ledger.append_journal(&user_id, pending).await {
                tracing::warn!(
                    %user_id,
                    transaction_id = %txn.id,
                    %error,
                    "Journal flush deferred"
                );
            }

            Ok(CreditOutcome::Applied(txn))
        })
        .await
    }

    /// Append every journaled transaction of a user to the log.
    ///
    /// Returns how many transactions were newly appended.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user; store errors otherwise. A failed
    /// flush can simply be repeated.
    pub async fn flush_journal(&self, user_id: &UserId) -> Result<usize, LedgerError> {
        let pending = self.get_user(user_id).await?.journal;
        if pending.is_empty() {
            return Ok(0);
        }
        self.append_journal(user_id, pending).await
    }

    async fn append_journal(
        &self,
        user_id: &UserId,
        pending: Vec<Transaction>,
    ) -> Result<usize, LedgerError> {
        let flushed: HashSet<TransactionId> = pending.iter().map(|t| t.id.clone()).collect();

        let appended = self
            .serializer
            .with_collection::<Transaction, _, _>(move |log| {
                let present: HashSet<TransactionId> = log.iter().map(|t| t.id.clone()).collect();
                let before = log.len();
                log.extend(pending.into_iter().filter(|t| !present.contains(&t.id)));
                let appended = log.len() - before;
                if appended == 0 {
                    Ok(Outcome::Unchanged(0))
                } else {
                    Ok(Outcome::Changed(appended))
                }
            })
            .await?;

        let owner = user_id.clone();
        self.serializer
            .with_collection::<UserAccount, _, _>(move |users| {
                let Some(user) = users.iter_mut().find(|u| u.id == owner) else {
                    return Ok(Outcome::Unchanged(()));
                };
                let before = user.journal.len();
                user.journal.retain(|t| !flushed.contains(&t.id));
                if user.journal.len() == before {
                    Ok(Outcome::Unchanged(()))
                } else {
                    Ok(Outcome::Changed(()))
                }
            })
            .await?;

        tracing::debug!(%user_id, appended, "Journal flushed");
        Ok(appended)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Point-in-time balance. Not serialized.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn balance_of(&self, user_id: &UserId) -> Result<WalletBalance, LedgerError> {
        Ok(self.get_user(user_id).await?.wallet)
    }

    /// A user's transactions, newest first.
    ///
    /// Includes journaled transactions that have not reached the log yet.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        // Users first: an entry leaves the journal only after it reached the log.
        let journal = self.get_user(user_id).await?.journal;
        let log = self.serializer.snapshot::<Transaction>().await?;
        Ok(merge_history(user_id, log, journal))
    }

    /// Compare balances with the signed sum of transactions per currency.
    ///
    /// Holds the users gate while reading so no posting for any user can
    /// interleave.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn reconcile(&self, user_id: &UserId) -> Result<ReconciliationReport, LedgerError> {
        let users = self.serializer.lease::<UserAccount>().await?;
        let user = users
            .find(user_id.as_str())
            .ok_or_else(|| LedgerError::not_found("user", user_id))?;
        let wallet = user.wallet;
        let journal = user.journal.clone();
        let log = self.serializer.snapshot::<Transaction>().await?;
        drop(users);

        let history = merge_history(user_id, log, journal);
        let currencies = Currency::ALL
            .into_iter()
            .map(|currency| {
                let ledger_sum: Decimal = history
                    .iter()
                    .filter(|t| t.currency == currency)
                    .map(|t| t.amount)
                    .sum();
                let balance = wallet.get(currency);
                CurrencyReconciliation {
                    currency,
                    balance,
                    ledger_sum,
                    drift: balance - ledger_sum,
                }
            })
            .collect::<Vec<_>>();

        let report = ReconciliationReport {
            user_id: user_id.clone(),
            transactions: history.len(),
            currencies,
        };
        if !report.is_balanced() {
            tracing::warn!(%user_id, ?report, "Wallet does not reconcile with the log");
        }
        Ok(report)
    }
}

impl std::fmt::Debug for WalletLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletLedger")
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}

/// The user's log entries plus journaled ones, deduplicated, newest first.
fn merge_history(
    user_id: &UserId,
    log: Vec<Transaction>,
    journal: Vec<Transaction>,
) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    let mut history: Vec<Transaction> = log
        .into_iter()
        .filter(|t| &t.user_id == user_id)
        .chain(journal)
        .filter(|t| seen.insert(t.id.clone()))
        .collect();
    // Later appends first among equal timestamps.
    history.reverse();
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arena_core::DateTime;
    use rust_decimal_macros::dec;

    fn txn(id: &str, user: &str, amount: Decimal, at: &str) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            user_id: UserId::new(user),
            kind: TransactionType::AdminAdjustment,
            amount,
            currency: Currency::Credits,
            description: String::new(),
            date: DateTime::parse_from_rfc3339(at).unwrap().into(),
            related_id: None,
        }
    }

    #[test]
    fn history_is_filtered_deduplicated_and_newest_first() {
        let log = vec![
            txn("a", "u-1", dec!(10), "2025-01-01T00:00:00Z"),
            txn("b", "u-2", dec!(5), "2025-01-02T00:00:00Z"),
            txn("c", "u-1", dec!(-3), "2025-01-03T00:00:00Z"),
        ];
        let journal = vec![
            txn("c", "u-1", dec!(-3), "2025-01-03T00:00:00Z"),
            txn("d", "u-1", dec!(7), "2025-01-03T00:00:00Z"),
        ];

        let ids: Vec<_> = merge_history(&UserId::new("u-1"), log, journal)
            .into_iter()
            .map(|t| t.id.into_inner())
            .collect();

        assert_eq!(ids, ["d", "c", "a"]);
    }

    #[test]
    fn credit_match_requires_same_key_and_direction() {
        let entry = LedgerEntry::new(
            UserId::new("u-1"),
            Currency::Credits,
            dec!(50),
            TransactionType::AdminAdjustment,
            "",
        )
        .related_to("T1");

        let mut matching = txn("a", "u-1", dec!(50), "2025-01-01T00:00:00Z");
        matching.related_id = Some("T1".to_string());
        assert!(entry.matches_credit(&matching));

        let mut debit = matching.clone();
        debit.amount = dec!(-50);
        assert!(!entry.matches_credit(&debit));

        let mut other_user = matching.clone();
        other_user.user_id = UserId::new("u-2");
        assert!(!entry.matches_credit(&other_user));

        let mut unrelated = matching;
        unrelated.related_id = None;
        assert!(!entry.matches_credit(&unrelated));
    }
}
