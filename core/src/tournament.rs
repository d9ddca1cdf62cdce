//! Tournaments and their seat inventory.
//!
//! The seat counters obey `0 <= spots_left <= total_spots` at all times. The
//! only operations that move them are [`Tournament::claim_seat`],
//! [`Tournament::release_seat`] and [`Tournament::resize`]; all three check
//! the invariant before mutating so a rejected call leaves the tournament
//! untouched.

use crate::collection::{CollectionName, Document};
use crate::error::LedgerError;
use crate::ids::{EnrollmentId, GameId, TournamentId, UserId};
use crate::patch::TournamentPatch;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Region a tournament is hosted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// United States
    #[serde(rename = "USA")]
    Usa,
    /// India
    #[serde(rename = "INDIA")]
    India,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usa => f.write_str("USA"),
            Self::India => f.write_str("INDIA"),
        }
    }
}

/// A claimed seat. Always paired 1:1 with a seat decrement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    /// Seat token handed back to the caller
    pub id: EnrollmentId,
    /// Player holding the seat
    pub user_id: UserId,
    /// Entry fee debited for this seat (refunded on cancellation)
    pub entry_fee_paid: Decimal,
    /// When the seat was claimed
    pub enrolled_at: DateTime<Utc>,
}

/// Input for creating a tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTournament {
    /// Game played
    pub game_id: GameId,
    /// Display name
    pub name: String,
    /// Hosting region
    pub region: Region,
    /// Seat capacity (at least 1)
    pub total_spots: u32,
    /// Entry fee in credits (zero for free entry)
    #[serde(default)]
    pub entry_fee: Decimal,
    /// Scheduled start
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

/// A tournament document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    /// Immutable id
    pub id: TournamentId,
    /// Game played
    pub game_id: GameId,
    /// Display name
    pub name: String,
    /// Hosting region
    pub region: Region,
    /// Seat capacity
    pub total_spots: u32,
    /// Seats still available
    pub spots_left: u32,
    /// Entry fee in credits
    pub entry_fee: Decimal,
    /// Scheduled start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    /// When the tournament was created
    pub created_at: DateTime<Utc>,
    /// Claimed seats
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
}

impl Tournament {
    /// Creates a tournament with every seat available.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the name is blank, the capacity is
    /// zero or the entry fee is negative.
    pub fn new(
        id: TournamentId,
        input: NewTournament,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let name = validate_name(&input.name)?;
        validate_capacity(input.total_spots)?;
        validate_entry_fee(input.entry_fee)?;

        Ok(Self {
            id,
            game_id: input.game_id,
            name,
            region: input.region,
            total_spots: input.total_spots,
            spots_left: input.total_spots,
            entry_fee: input.entry_fee,
            starts_at: input.starts_at,
            created_at,
            enrollments: Vec::new(),
        })
    }

    /// Seats already claimed according to the counters.
    #[must_use]
    pub const fn taken_seats(&self) -> u32 {
        self.total_spots.saturating_sub(self.spots_left)
    }

    /// Enrollment held by a user, if any.
    #[must_use]
    pub fn enrollment_of(&self, user_id: &UserId) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| &e.user_id == user_id)
    }

    /// Take one seat.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NoSpotsLeft` if `spots_left` is zero.
    pub fn claim_seat(&mut self) -> Result<(), LedgerError> {
        self.spots_left = self
            .spots_left
            .checked_sub(1)
            .ok_or_else(|| LedgerError::NoSpotsLeft(self.id.clone()))?;
        Ok(())
    }

    /// Return one seat.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AtCapacity` if every seat is already available.
    pub fn release_seat(&mut self) -> Result<(), LedgerError> {
        if self.spots_left >= self.total_spots {
            return Err(LedgerError::AtCapacity(self.id.clone()));
        }
        self.spots_left += 1;
        Ok(())
    }

    /// Change capacity while preserving the number of taken seats.
    ///
    /// Shrinking below the taken count clamps `spots_left` to zero; existing
    /// enrollments are never evicted.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if `new_total` is zero.
    pub fn resize(&mut self, new_total: u32) -> Result<(), LedgerError> {
        validate_capacity(new_total)?;
        let taken = self.taken_seats();
        self.total_spots = new_total;
        self.spots_left = new_total.saturating_sub(taken);
        Ok(())
    }

    /// Apply an administrative patch.
    ///
    /// Validation happens up front, so a rejected patch leaves the tournament
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` for a blank name, zero capacity or a
    /// negative entry fee.
    pub fn apply_patch(&mut self, patch: TournamentPatch) -> Result<(), LedgerError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        if let Some(total) = patch.total_spots {
            validate_capacity(total)?;
        }
        if let Some(fee) = patch.entry_fee {
            validate_entry_fee(fee)?;
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(game_id) = patch.game_id {
            self.game_id = game_id;
        }
        if let Some(region) = patch.region {
            self.region = region;
        }
        if let Some(total) = patch.total_spots {
            self.resize(total)?;
        }
        if let Some(fee) = patch.entry_fee {
            self.entry_fee = fee;
        }
        patch.starts_at.apply_to(&mut self.starts_at);
        Ok(())
    }
}

impl Document for Tournament {
    const COLLECTION: CollectionName = CollectionName::TOURNAMENTS;

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

fn validate_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(
            "tournament name cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_capacity(total_spots: u32) -> Result<(), LedgerError> {
    if total_spots == 0 {
        return Err(LedgerError::Validation(
            "a tournament needs at least one spot".to_string(),
        ));
    }
    Ok(())
}

fn validate_entry_fee(fee: Decimal) -> Result<(), LedgerError> {
    if fee < Decimal::ZERO {
        return Err(LedgerError::Validation(
            "entry fee cannot be negative".to_string(),
        ));
    }
    Ok(())
}
