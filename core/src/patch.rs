//! Partial-update structs.
//!
//! Each entity that can be edited has exactly one patch type. Field semantics
//! are decided once, here, instead of at every call site:
//!
//! - `Option<T>` fields are **not clearable**: absent (or `null`) keeps the
//!   current value, a value replaces it.
//! - [`Patch<T>`] fields are **clearable**: absent keeps the current value,
//!   `null` clears it, a value replaces it.

use crate::ids::GameId;
use crate::tournament::Region;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Update instruction for a clearable optional field.
///
/// On the wire an absent field is `Keep`, `null` is `Clear` and any value is
/// `Set`. Fields of this type must be annotated with `#[serde(default)]` so
/// that absence maps to `Keep`.
///
/// # Examples
///
/// ```
/// use arena_core::patch::Patch;
///
/// let mut starts_at = Some(10);
/// Patch::Clear.apply_to(&mut starts_at);
/// assert_eq!(starts_at, None);
///
/// Patch::Set(20).apply_to(&mut starts_at);
/// assert_eq!(starts_at, Some(20));
///
/// Patch::Keep.apply_to(&mut starts_at);
/// assert_eq!(starts_at, Some(20));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the field unchanged
    #[default]
    Keep,
    /// Remove the current value
    Clear,
    /// Replace the current value
    Set(T),
}

impl<T> Patch<T> {
    /// Whether this patch leaves the field unchanged.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Apply the patch to an optional field.
    pub fn apply_to(self, field: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *field = None,
            Self::Set(value) => *field = Some(value),
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Keep | Self::Clear => serializer.serialize_none(),
            Self::Set(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Clear, Self::Set))
    }
}

/// Partial update of a tournament.
///
/// `total_spots` is not written directly: a present value goes through the
/// capacity-resize rule that preserves the number of seats already taken.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentPatch {
    /// New display name (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New game (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    /// New region (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// New capacity, applied with resize semantics (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_spots: Option<u32>,
    /// New entry fee in credits (not clearable; set `0` for free entry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_fee: Option<Decimal>,
    /// Scheduled start (clearable)
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub starts_at: Patch<DateTime<Utc>>,
}

/// Partial update of a user profile. Wallet fields are not patchable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New display name (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New home region (not clearable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}
