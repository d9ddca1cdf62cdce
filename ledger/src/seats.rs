//! Seat inventory: tournament administration, enrollment and cancellation.
//!
//! Every mutation runs under the tournaments gate and reloads the tournament
//! inside it. Entry fees are moved through the [`WalletLedger`] while the
//! tournaments gate is held, so a seat and its fee change together:
//!
//! - `enroll` debits the fee first. If the tournament then fails to save,
//!   the fee is refunded with a compensating `tournament_entry` credit and
//!   the store error is returned.
//! - `cancel` refunds first, keyed by the enrollment id, then releases the
//!   seat. If the release fails to save, repeating the cancellation finds the
//!   refund already posted and only retries the release.

use crate::metrics;
use crate::wallet::{LedgerEntry, WalletLedger};
use arena_core::environment::{Clock, IdGenerator};
use arena_core::ids::{EnrollmentId, TournamentId, UserId};
use arena_core::patch::TournamentPatch;
use arena_core::tournament::{Enrollment, NewTournament, Region, Tournament};
use arena_core::wallet::{Currency, TransactionType};
use arena_core::{Decimal, LedgerError};
use arena_runtime::{MutationSerializer, Outcome, run_to_completion};
use serde::Serialize;
use std::sync::Arc;

/// Seat state after an enrollment or cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatResult {
    /// Tournament the seat belongs to
    pub tournament_id: TournamentId,
    /// The seat claimed or released
    pub enrollment: Enrollment,
    /// Seats available after the operation
    pub spots_left: u32,
    /// Capacity of the tournament
    pub total_spots: u32,
}

/// Tournaments and their seats.
#[derive(Clone)]
pub struct SeatInventory {
    serializer: MutationSerializer,
    wallet: WalletLedger,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl SeatInventory {
    /// Create the inventory. `wallet` must share `serializer`'s gates.
    #[must_use]
    pub fn new(
        serializer: MutationSerializer,
        wallet: WalletLedger,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            serializer,
            wallet,
            clock,
            ids,
        }
    }

    /// Create a tournament with every seat available.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, zero capacity or negative fee.
    pub async fn create(&self, input: NewTournament) -> Result<Tournament, LedgerError> {
        let id = TournamentId::new(self.ids.next_id("trn"));
        let tournament = Tournament::new(id, input, self.clock.now())?;

        self.serializer
            .with_collection::<Tournament, _, _>(move |tournaments| {
                tournaments.push(tournament.clone());
                tracing::info!(
                    tournament_id = %tournament.id,
                    total_spots = tournament.total_spots,
                    "Tournament created"
                );
                Ok(Outcome::Changed(tournament))
            })
            .await
    }

    /// Apply an administrative patch.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament, `Validation` for invalid fields.
    pub async fn update(
        &self,
        id: &TournamentId,
        patch: TournamentPatch,
    ) -> Result<Tournament, LedgerError> {
        let id = id.clone();
        self.serializer
            .with_collection::<Tournament, _, _>(move |tournaments| {
                let tournament = find_mut(tournaments, &id)?;
                tournament.apply_patch(patch)?;
                Ok(Outcome::Changed(tournament.clone()))
            })
            .await
    }

    /// Change capacity, preserving the number of taken seats.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament, `Validation` for zero capacity.
    pub async fn resize(
        &self,
        id: &TournamentId,
        total_spots: u32,
    ) -> Result<Tournament, LedgerError> {
        let id = id.clone();
        self.serializer
            .with_collection::<Tournament, _, _>(move |tournaments| {
                let tournament = find_mut(tournaments, &id)?;
                tournament.resize(total_spots)?;
                tracing::info!(
                    tournament_id = %id,
                    total_spots,
                    spots_left = tournament.spots_left,
                    "Tournament resized"
                );
                Ok(Outcome::Changed(tournament.clone()))
            })
            .await
    }

    /// Remove a tournament. Its seat state is discarded; fees are not
    /// refunded.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament.
    pub async fn delete(&self, id: &TournamentId) -> Result<Tournament, LedgerError> {
        let id = id.clone();
        self.serializer
            .with_collection::<Tournament, _, _>(move |tournaments| {
                let index = tournaments
                    .iter()
                    .position(|t| t.id == id)
                    .ok_or_else(|| LedgerError::not_found("tournament", &id))?;
                let removed = tournaments.remove(index);
                if !removed.enrollments.is_empty() {
                    tracing::warn!(
                        tournament_id = %id,
                        enrollments = removed.enrollments.len(),
                        "Deleted tournament still had enrollments"
                    );
                }
                Ok(Outcome::Changed(removed))
            })
            .await
    }

    /// Read one tournament.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament.
    pub async fn get(&self, id: &TournamentId) -> Result<Tournament, LedgerError> {
        self.serializer
            .snapshot::<Tournament>()
            .await?
            .into_iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| LedgerError::not_found("tournament", id))
    }

    /// All tournaments, optionally filtered by region, newest first.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn list(&self, region: Option<Region>) -> Result<Vec<Tournament>, LedgerError> {
        let mut tournaments: Vec<Tournament> = self
            .serializer
            .snapshot::<Tournament>()
            .await?
            .into_iter()
            .filter(|t| region.is_none_or(|r| t.region == r))
            .collect();
        tournaments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tournaments)
    }

    /// Claim a seat for `user_id`, debiting the entry fee.
    ///
    /// # Errors
    ///
    /// `NotFound` (tournament or user), `AlreadyEnrolled`, `NoSpotsLeft` and
    /// `InsufficientFunds` reject without any change. A store failure after
    /// the fee was debited refunds it before returning.
    pub async fn enroll(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<SeatResult, LedgerError> {
        let mut tournaments = self.serializer.lease::<Tournament>().await?;
        let inventory = self.clone();
        let tournament_id = tournament_id.clone();
        let user_id = user_id.clone();

        run_to_completion(async move {
            let tournament = tournaments
                .find(tournament_id.as_str())
                .ok_or_else(|| LedgerError::not_found("tournament", &tournament_id))?;
            if tournament.enrollment_of(&user_id).is_some() {
                return Err(LedgerError::AlreadyEnrolled {
                    tournament_id,
                    user_id,
                });
            }
            if tournament.spots_left == 0 {
                return Err(LedgerError::NoSpotsLeft(tournament_id));
            }
            let fee = tournament.entry_fee;
            let fee_entry = LedgerEntry::new(
                user_id.clone(),
                Currency::Credits,
                fee,
                TransactionType::TournamentEntry,
                format!("Entry fee for {}", tournament.name),
            )
            .related_to(&tournament_id);

            if fee > Decimal::ZERO {
                inventory.wallet.debit(fee_entry.clone()).await?;
            } else {
                inventory.wallet.get_user(&user_id).await?;
            }

            let enrollment = Enrollment {
                id: EnrollmentId::new(inventory.ids.next_id("enr")),
                user_id: user_id.clone(),
                entry_fee_paid: fee,
                enrolled_at: inventory.clock.now(),
            };
            let tournament = tournaments
                .find_mut(tournament_id.as_str())
                .ok_or_else(|| LedgerError::not_found("tournament", &tournament_id))?;
            tournament.claim_seat()?;
            tournament.enrollments.push(enrollment.clone());
            let result = SeatResult {
                tournament_id: tournament_id.clone(),
                enrollment,
                spots_left: tournament.spots_left,
                total_spots: tournament.total_spots,
            };

            if let Err(error) = tournaments.commit().await {
                if fee > Decimal::ZERO {
                    inventory.refund_entry_fee(fee_entry).await;
                }
                metrics::record_enrollment("compensated");
                return Err(error);
            }

            metrics::record_enrollment("enrolled");
            tracing::info!(
                %tournament_id,
                %user_id,
                enrollment_id = %result.enrollment.id,
                spots_left = result.spots_left,
                "Seat claimed"
            );
            Ok(result)
        })
        .await
        .inspect_err(record_rejection)
    }

    async fn refund_entry_fee(&self, mut entry: LedgerEntry) {
        entry.description = format!("Refund: {}", entry.description);
        match self.wallet.credit(entry).await {
            Ok(txn) => tracing::warn!(
                user_id = %txn.user_id,
                transaction_id = %txn.id,
                "Seat not saved; entry fee refunded"
            ),
            Err(error) => tracing::error!(
                %error,
                "Seat not saved and the entry fee refund failed"
            ),
        }
    }

    /// Release `user_id`'s seat and refund the fee they paid.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tournament or a user without a seat;
    /// `AtCapacity` if the tournament has no taken seats at all.
    pub async fn cancel(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<SeatResult, LedgerError> {
        let mut tournaments = self.serializer.lease::<Tournament>().await?;
        let wallet = self.wallet.clone();
        let tournament_id = tournament_id.clone();
        let user_id = user_id.clone();

        run_to_completion(async move {
            let tournament = tournaments
                .find(tournament_id.as_str())
                .ok_or_else(|| LedgerError::not_found("tournament", &tournament_id))?;
            let Some(enrollment) = tournament.enrollment_of(&user_id).cloned() else {
                if tournament.spots_left >= tournament.total_spots {
                    return Err(LedgerError::AtCapacity(tournament_id));
                }
                return Err(LedgerError::not_found(
                    "enrollment",
                    format!("{user_id}@{tournament_id}"),
                ));
            };

            if enrollment.entry_fee_paid > Decimal::ZERO {
                let refund = LedgerEntry::new(
                    user_id.clone(),
                    Currency::Credits,
                    enrollment.entry_fee_paid,
                    TransactionType::TournamentEntry,
                    format!("Refund for {}", tournament.name),
                )
                .related_to(&enrollment.id);
                wallet.credit_once(refund).await?;
            }

            let tournament = tournaments
                .find_mut(tournament_id.as_str())
                .ok_or_else(|| LedgerError::not_found("tournament", &tournament_id))?;
            tournament.enrollments.retain(|e| e.id != enrollment.id);
            // A shrink may have left more enrollments than seats; those free none.
            let seated = u32::try_from(tournament.enrollments.len()).unwrap_or(u32::MAX);
            if seated < tournament.total_spots && tournament.spots_left < tournament.total_spots {
                tournament.release_seat()?;
            }
            let result = SeatResult {
                tournament_id: tournament_id.clone(),
                enrollment,
                spots_left: tournament.spots_left,
                total_spots: tournament.total_spots,
            };
            tournaments.commit().await?;

            metrics::record_enrollment("cancelled");
            tracing::info!(
                %tournament_id,
                %user_id,
                spots_left = result.spots_left,
                "Seat released"
            );
            Ok(result)
        })
        .await
        .inspect_err(record_rejection)
    }
}

impl std::fmt::Debug for SeatInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatInventory").finish_non_exhaustive()
    }
}

fn find_mut<'a>(
    tournaments: &'a mut [Tournament],
    id: &TournamentId,
) -> Result<&'a mut Tournament, LedgerError> {
    tournaments
        .iter_mut()
        .find(|t| &t.id == id)
        .ok_or_else(|| LedgerError::not_found("tournament", id))
}

fn record_rejection(error: &LedgerError) {
    if error.is_rejection() {
        metrics::record_enrollment("rejected");
        tracing::debug!(%error, "Seat operation rejected");
    }
}
