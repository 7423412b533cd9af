//! Listing domain types

use chrono::{DateTime, Utc};
use common::{ItemId, ListingId, TradeId, UserId};
use serde::{Deserialize, Serialize};

/// Status of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Open for trade offers
    Active,
    /// An accepted trade is in its lock phase
    OnHold,
    /// A trade finalized against this listing
    Completed,
    /// Withdrawn by the owner
    Cancelled,
}

impl ListingStatus {
    /// True for Completed and Cancelled, from which no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Completed | ListingStatus::Cancelled)
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "active"),
            ListingStatus::OnHold => write!(f, "on_hold"),
            ListingStatus::Completed => write!(f, "completed"),
            ListingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An inventory item openly offered for trade.
///
/// The owner is denormalized from the item at open time so authorization
/// checks do not need a ledger round-trip. The listing's phase mirrors its
/// item's status: Active ⇔ Available, OnHold ⇔ held by the accepted trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Unique listing identifier
    pub id: ListingId,
    /// The item being offered
    pub item_id: ItemId,
    /// Owner of the listed item at open time
    pub owner_id: UserId,
    /// Current phase
    pub status: ListingStatus,
    /// Whether offers with zero items are acceptable
    pub is_free: bool,
    /// Trade currently holding this listing, if any
    pub on_hold_by: Option<TradeId>,
    /// When the listing was opened
    pub listed_at: DateTime<Utc>,
    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Open a new active listing for `item_id` owned by `owner_id`.
    pub fn new(item_id: ItemId, owner_id: UserId, is_free: bool) -> Self {
        let now = Utc::now();
        Self {
            id: ListingId::new(),
            item_id,
            owner_id,
            status: ListingStatus::Active,
            is_free,
            on_hold_by: None,
            listed_at: now,
            updated_at: now,
        }
    }
}
