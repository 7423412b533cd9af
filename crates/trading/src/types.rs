//! Trade negotiation domain types

use chrono::{DateTime, Utc};
use common::{ItemId, ListingId, TradeId, UserId};
use serde::{Deserialize, Serialize};

/// Status of a trade negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Waiting for the listing owner to respond
    Pending,
    /// Owner accepted; both parties must lock before the window lapses
    Accepted,
    /// Owner declined the offer
    Rejected,
    /// Withdrawn by either party
    Cancelled,
    /// Both parties locked; ownership transferred
    Completed,
    /// The lock window lapsed without both parties locking
    Expired,
}

impl TradeStatus {
    /// True for statuses from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Rejected
                | TradeStatus::Cancelled
                | TradeStatus::Completed
                | TradeStatus::Expired
        )
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "pending"),
            TradeStatus::Accepted => write!(f, "accepted"),
            TradeStatus::Rejected => write!(f, "rejected"),
            TradeStatus::Cancelled => write!(f, "cancelled"),
            TradeStatus::Completed => write!(f, "completed"),
            TradeStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Which side of the trade an acting user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockParty {
    /// The listing owner
    Owner,
    /// The user who created the negotiation
    Requester,
}

impl std::fmt::Display for LockParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockParty::Owner => write!(f, "owner"),
            LockParty::Requester => write!(f, "requester"),
        }
    }
}

/// Result of atomically setting a party's lock flag.
///
/// The flag write and the "am I the one who completes it" decision happen in
/// a single read-modify-write, so exactly one caller ever sees
/// `ReadyToComplete` for a given trade.
#[derive(Debug, Clone)]
pub enum LockOutcome {
    /// The trade left the Accepted phase before the flag could be set
    NotAccepted(TradeStatus),
    /// The acting party's own flag was already set
    AlreadyLocked,
    /// Flag set; still waiting on the other party
    Locked(TradeNegotiation),
    /// Flag set and both parties are now locked; the caller finalizes
    ReadyToComplete(TradeNegotiation),
}

/// A trade negotiation between a requester and a listing owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeNegotiation {
    /// Unique trade identifier
    pub id: TradeId,
    /// The listing this negotiation targets
    pub listing_id: ListingId,
    /// The user offering items (never the listing owner)
    pub requester_id: UserId,
    /// Items the requester puts up; unique, may be empty on free listings
    pub offered_items: Vec<ItemId>,
    /// Current lifecycle phase
    pub status: TradeStatus,
    /// Listing owner's lock flag
    pub owner_locked: bool,
    /// Requester's lock flag
    pub requester_locked: bool,
    /// Set the instant both lock flags become true
    pub locked_at: Option<DateTime<Utc>>,
    /// When the negotiation was created
    pub requested_at: DateTime<Utc>,
    /// When the owner responded
    pub responded_at: Option<DateTime<Utc>>,
    /// End of the dual-lock window; set at acceptance
    pub lock_window_expires_at: Option<DateTime<Utc>>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl TradeNegotiation {
    /// Create a new pending negotiation.
    pub fn new(listing_id: ListingId, requester_id: UserId, offered_items: Vec<ItemId>) -> Self {
        let now = Utc::now();
        Self {
            id: TradeId::new(),
            listing_id,
            requester_id,
            offered_items,
            status: TradeStatus::Pending,
            owner_locked: false,
            requester_locked: false,
            locked_at: None,
            requested_at: now,
            responded_at: None,
            lock_window_expires_at: None,
            updated_at: now,
        }
    }

    /// True when both parties have locked.
    pub fn both_locked(&self) -> bool {
        self.owner_locked && self.requester_locked
    }

    /// The given party's lock flag.
    pub fn is_locked_by(&self, party: LockParty) -> bool {
        match party {
            LockParty::Owner => self.owner_locked,
            LockParty::Requester => self.requester_locked,
        }
    }

    /// True when the trade is Accepted and its lock window lapsed without
    /// both parties locking.
    pub fn is_lock_window_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == TradeStatus::Accepted
            && !self.both_locked()
            && self
                .lock_window_expires_at
                .map(|at| at <= now)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_negotiation_is_pending() {
        let trade = TradeNegotiation::new(ListingId::new(), UserId::new(), vec![ItemId::new()]);
        assert_eq!(trade.status, TradeStatus::Pending);
        assert!(!trade.owner_locked);
        assert!(!trade.requester_locked);
        assert!(trade.locked_at.is_none());
        assert!(trade.lock_window_expires_at.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TradeStatus::Pending.is_terminal());
        assert!(!TradeStatus::Accepted.is_terminal());
        assert!(TradeStatus::Rejected.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
        assert!(TradeStatus::Completed.is_terminal());
        assert!(TradeStatus::Expired.is_terminal());
    }

    #[test]
    fn test_lock_window_lapse() {
        let mut trade = TradeNegotiation::new(ListingId::new(), UserId::new(), vec![]);
        let now = Utc::now();

        // Pending trades have no window
        assert!(!trade.is_lock_window_lapsed(now));

        trade.status = TradeStatus::Accepted;
        trade.lock_window_expires_at = Some(now - Duration::seconds(1));
        assert!(trade.is_lock_window_lapsed(now));

        // A fully locked trade never lapses
        trade.owner_locked = true;
        trade.requester_locked = true;
        assert!(!trade.is_lock_window_lapsed(now));
    }
}
