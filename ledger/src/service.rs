//! The operations exposed to the UI and admin layers.
//!
//! [`ArenaService`] wires one [`MutationSerializer`] into the seat inventory,
//! wallet ledger and payment workflow, so all three share the same
//! collection gates.

use crate::payments::PaymentWorkflow;
use crate::seats::{SeatInventory, SeatResult};
use crate::wallet::{ReconciliationReport, WalletLedger};
use arena_core::environment::{Clock, IdGenerator};
use arena_core::ids::{PaymentToken, TournamentId, UserId};
use arena_core::patch::{TournamentPatch, UserPatch};
use arena_core::payment::{PaymentRequest, PaymentStatus};
use arena_core::tournament::{NewTournament, Region, Tournament};
use arena_core::wallet::{Currency, Transaction, UserAccount, WalletBalance};
use arena_core::{CollectionStore, Decimal, LedgerError};
use arena_runtime::{MutationSerializer, RetryPolicy};
use std::sync::Arc;

/// Facade over the ledger components.
///
/// Cheap to clone; clones share gates and dependencies.
#[derive(Clone, Debug)]
pub struct ArenaService {
    seats: SeatInventory,
    wallet: WalletLedger,
    payments: PaymentWorkflow,
}

impl ArenaService {
    /// Build the service over a store.
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let serializer = MutationSerializer::new(store, policy);
        let wallet = WalletLedger::new(serializer.clone(), Arc::clone(&clock), Arc::clone(&ids));
        let seats = SeatInventory::new(
            serializer.clone(),
            wallet.clone(),
            Arc::clone(&clock),
            ids,
        );
        let payments = PaymentWorkflow::new(serializer, wallet.clone(), clock);
        Self {
            seats,
            wallet,
            payments,
        }
    }

    /// Seat inventory component.
    #[must_use]
    pub const fn seats(&self) -> &SeatInventory {
        &self.seats
    }

    /// Wallet ledger component.
    #[must_use]
    pub const fn wallet(&self) -> &WalletLedger {
        &self.wallet
    }

    /// Payment workflow component.
    #[must_use]
    pub const fn payments(&self) -> &PaymentWorkflow {
        &self.payments
    }

    // ------------------------------------------------------------------
    // Seats
    // ------------------------------------------------------------------

    /// Claim a seat for the acting user.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::enroll`].
    #[tracing::instrument(skip_all, fields(%tournament_id, %user_id))]
    pub async fn enroll_in_tournament(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<SeatResult, LedgerError> {
        self.seats.enroll(tournament_id, user_id).await
    }

    /// Give up the acting user's seat.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::cancel`].
    #[tracing::instrument(skip_all, fields(%tournament_id, %user_id))]
    pub async fn cancel_enrollment(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<SeatResult, LedgerError> {
        self.seats.cancel(tournament_id, user_id).await
    }

    /// Create a tournament.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::create`].
    #[tracing::instrument(skip_all, fields(name = %input.name))]
    pub async fn create_tournament(&self, input: NewTournament) -> Result<Tournament, LedgerError> {
        self.seats.create(input).await
    }

    /// Apply an administrative patch to a tournament.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::update`].
    #[tracing::instrument(skip_all, fields(%tournament_id))]
    pub async fn update_tournament(
        &self,
        tournament_id: &TournamentId,
        patch: TournamentPatch,
    ) -> Result<Tournament, LedgerError> {
        self.seats.update(tournament_id, patch).await
    }

    /// Change a tournament's capacity.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::resize`].
    #[tracing::instrument(skip_all, fields(%tournament_id))]
    pub async fn resize_tournament(
        &self,
        tournament_id: &TournamentId,
        total_spots: u32,
    ) -> Result<Tournament, LedgerError> {
        self.seats.resize(tournament_id, total_spots).await
    }

    /// Delete a tournament.
    ///
    /// # Errors
    ///
    /// See [`SeatInventory::delete`].
    #[tracing::instrument(skip_all, fields(%tournament_id))]
    pub async fn delete_tournament(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Tournament, LedgerError> {
        self.seats.delete(tournament_id).await
    }

    /// Read one tournament.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament.
    pub async fn get_tournament(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Tournament, LedgerError> {
        self.seats.get(tournament_id).await
    }

    /// Tournaments, newest first.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn list_tournaments(
        &self,
        region: Option<Region>,
    ) -> Result<Vec<Tournament>, LedgerError> {
        self.seats.list(region).await
    }

    // ------------------------------------------------------------------
    // Users and wallets
    // ------------------------------------------------------------------

    /// Register the acting user.
    ///
    /// # Errors
    ///
    /// See [`WalletLedger::register_user`].
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn register_user(
        &self,
        user_id: UserId,
        display_name: String,
        region: Region,
    ) -> Result<UserAccount, LedgerError> {
        self.wallet.register_user(user_id, display_name, region).await
    }

    /// Read a user account.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn get_user(&self, user_id: &UserId) -> Result<UserAccount, LedgerError> {
        self.wallet.get_user(user_id).await
    }

    /// Update a user's profile.
    ///
    /// # Errors
    ///
    /// See [`WalletLedger::update_user`].
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn update_user(
        &self,
        user_id: &UserId,
        patch: UserPatch,
    ) -> Result<UserAccount, LedgerError> {
        self.wallet.update_user(user_id, patch).await
    }

    /// Point-in-time balance.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn get_wallet_balance(&self, user_id: &UserId) -> Result<WalletBalance, LedgerError> {
        self.wallet.balance_of(user_id).await
    }

    /// Transactions, newest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.wallet.list_transactions(user_id).await
    }

    /// Administrative balance correction.
    ///
    /// # Errors
    ///
    /// See [`WalletLedger::adjust`].
    #[tracing::instrument(skip_all, fields(%user_id, %currency, %amount))]
    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        description: String,
    ) -> Result<Transaction, LedgerError> {
        self.wallet
            .adjust(user_id, currency, amount, description)
            .await
    }

    /// Pay tournament winnings.
    ///
    /// # Errors
    ///
    /// See [`WalletLedger::payout_winnings`].
    #[tracing::instrument(skip_all, fields(%user_id, %tournament_id, %amount))]
    pub async fn payout_winnings(
        &self,
        user_id: UserId,
        tournament_id: &TournamentId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        self.wallet
            .payout_winnings(user_id, tournament_id, amount)
            .await
    }

    /// Check a wallet against the transaction log.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn reconcile(&self, user_id: &UserId) -> Result<ReconciliationReport, LedgerError> {
        self.wallet.reconcile(user_id).await
    }

    /// Append any journaled transactions to the log.
    ///
    /// # Errors
    ///
    /// See [`WalletLedger::flush_journal`].
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn flush_journal(&self, user_id: &UserId) -> Result<usize, LedgerError> {
        self.wallet.flush_journal(user_id).await
    }

    // ------------------------------------------------------------------
    // Payment requests
    // ------------------------------------------------------------------

    /// Submit a credit top-up request.
    ///
    /// # Errors
    ///
    /// See [`PaymentWorkflow::create`].
    #[tracing::instrument(skip_all, fields(%user_id, %amount, %token))]
    pub async fn submit_payment_request(
        &self,
        user_id: UserId,
        amount: Decimal,
        token: PaymentToken,
    ) -> Result<PaymentRequest, LedgerError> {
        self.payments.create(user_id, amount, token).await
    }

    /// Approve a payment request.
    ///
    /// # Errors
    ///
    /// See [`PaymentWorkflow::approve`].
    #[tracing::instrument(skip_all, fields(%token))]
    pub async fn approve_payment_request(
        &self,
        token: &PaymentToken,
    ) -> Result<PaymentRequest, LedgerError> {
        self.payments.approve(token).await
    }

    /// Decline a payment request.
    ///
    /// # Errors
    ///
    /// See [`PaymentWorkflow::decline`].
    #[tracing::instrument(skip_all, fields(%token))]
    pub async fn decline_payment_request(
        &self,
        token: &PaymentToken,
    ) -> Result<PaymentRequest, LedgerError> {
        self.payments.decline(token).await
    }

    /// Read one payment request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token.
    pub async fn get_payment_request(
        &self,
        token: &PaymentToken,
    ) -> Result<PaymentRequest, LedgerError> {
        self.payments.get(token).await
    }

    /// Payment requests, newest first.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn list_payment_requests(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, LedgerError> {
        self.payments.list(status).await
    }
}
