//! Inventory domain types

use chrono::{DateTime, Utc};
use common::{ItemId, TradeId, UserId};
use serde::{Deserialize, Serialize};

/// Status of an inventory item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Item can be listed or offered in a trade
    Available,
    /// Item is exclusively held by a trade in its lock phase
    OnHold,
    /// Item is retired and can no longer trade
    Archived,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Available => write!(f, "available"),
            ItemStatus::OnHold => write!(f, "on_hold"),
            ItemStatus::Archived => write!(f, "archived"),
        }
    }
}

/// A single collectible item in a user's inventory.
///
/// Items are issued by external events (purchase, unboxing) and are never
/// deleted; `Archived` is the only way out. Ownership and hold state are
/// mutated exclusively through the [`crate::InventoryStore`] operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Unique item identifier
    pub id: ItemId,
    /// Current owner; exactly one at any instant
    pub owner_id: UserId,
    /// Current status
    pub status: ItemStatus,
    /// Trade currently holding this item, if any (at most one)
    pub locked_by_trade: Option<TradeId>,
    /// When the current hold lapses; a lapsed hold is stale
    pub hold_until: Option<DateTime<Utc>>,
    /// Most recent finalized trade that touched this item (audit only)
    pub last_trade: Option<TradeId>,
    /// Issuance timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Create a new available item owned by `owner_id`.
    pub fn new(owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            owner_id,
            status: ItemStatus::Available,
            locked_by_trade: None,
            hold_until: None,
            last_trade: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when a hold exists but its window has already lapsed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.hold_until {
            Some(until) => self.status == ItemStatus::OnHold && until <= now,
            None => false,
        }
    }

    /// True when this item is currently held by `trade_id`.
    pub fn is_held_by(&self, trade_id: TradeId) -> bool {
        self.status == ItemStatus::OnHold && self.locked_by_trade == Some(trade_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_item_is_available() {
        let item = InventoryItem::new(UserId::new());
        assert_eq!(item.status, ItemStatus::Available);
        assert!(item.locked_by_trade.is_none());
        assert!(item.hold_until.is_none());
    }

    #[test]
    fn test_is_stale() {
        let mut item = InventoryItem::new(UserId::new());
        let now = Utc::now();

        // No hold at all
        assert!(!item.is_stale(now));

        // Live hold
        item.status = ItemStatus::OnHold;
        item.hold_until = Some(now + Duration::minutes(5));
        assert!(!item.is_stale(now));

        // Lapsed hold
        item.hold_until = Some(now - Duration::seconds(1));
        assert!(item.is_stale(now));
    }

    #[test]
    fn test_is_held_by() {
        let mut item = InventoryItem::new(UserId::new());
        let trade = TradeId::new();
        assert!(!item.is_held_by(trade));

        item.status = ItemStatus::OnHold;
        item.locked_by_trade = Some(trade);
        assert!(item.is_held_by(trade));
        assert!(!item.is_held_by(TradeId::new()));
    }
}
