//! Inventory storage trait and in-memory implementation.
//!
//! The store is the only place item status and hold fields are written.
//! `try_hold`, `release`, and `transfer` are conditional updates: the check
//! and the mutation happen under one critical section, so two concurrent
//! callers can never both succeed in claiming the same item.

use crate::error::{InventoryError, InventoryResult};
use crate::types::{InventoryItem, ItemStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, TradeId, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for inventory storage.
///
/// Implementations must make `try_hold`, `release`, and `transfer` atomic
/// with respect to each other: a compare-and-set against the item's current
/// status, not a read-then-write.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Get an item by id.
    async fn get(&self, id: ItemId) -> InventoryResult<Option<InventoryItem>>;

    /// Fetch several items at once. Missing ids are simply absent from the
    /// result; callers that care compare lengths.
    async fn get_many(&self, ids: &[ItemId]) -> InventoryResult<Vec<InventoryItem>>;

    /// Issue a new item into the ledger. External issuance seam (purchase,
    /// unboxing); the trading engine itself never creates items.
    async fn insert(&self, item: InventoryItem) -> InventoryResult<()>;

    /// List all items currently owned by `owner_id`.
    async fn list_by_owner(&self, owner_id: UserId) -> InventoryResult<Vec<InventoryItem>>;

    /// Atomically claim an item for a trade.
    ///
    /// Succeeds only if the item exists, is owned by `owner_id`, and is
    /// currently `Available`. On success the item moves to `OnHold` with
    /// `locked_by_trade` and `hold_until` stamped. Exactly one of any number
    /// of concurrent callers wins; losers get `Conflict` (already held) or
    /// `NotAvailable` (archived).
    async fn try_hold(
        &self,
        id: ItemId,
        owner_id: UserId,
        trade_id: TradeId,
        hold_until: DateTime<Utc>,
    ) -> InventoryResult<InventoryItem>;

    /// Release a hold taken by `trade_id`.
    ///
    /// Idempotent: returns `Ok(true)` when a hold was cleared, `Ok(false)`
    /// when the item was not held by this trade (already released).
    async fn release(&self, id: ItemId, trade_id: TradeId) -> InventoryResult<bool>;

    /// Transfer ownership at finalization.
    ///
    /// Requires the item to be currently held by `trade_id` and owned by
    /// `from`. On success the item belongs to `to`, the hold is cleared, the
    /// item returns to `Available`, and `last_trade` is stamped.
    async fn transfer(
        &self,
        id: ItemId,
        from: UserId,
        to: UserId,
        trade_id: TradeId,
    ) -> InventoryResult<InventoryItem>;

    /// Retire an item. Only an `Available` item can be archived.
    async fn archive(&self, id: ItemId) -> InventoryResult<()>;

    /// All items whose hold window has lapsed as of `now`. Sweep support.
    async fn list_stale_holds(&self, now: DateTime<Utc>) -> InventoryResult<Vec<InventoryItem>>;
}

/// In-memory implementation of [`InventoryStore`].
///
/// All conditional updates run under a single `parking_lot` write lock, which
/// gives the linearizability the trait demands. Useful for tests and
/// single-node deployments; a persistent adapter would use a conditional
/// UPDATE instead.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: Arc<RwLock<HashMap<ItemId, InventoryItem>>>,
}

impl InMemoryInventoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of items in the ledger.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// True when the ledger holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Clone for InMemoryInventoryStore {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get(&self, id: ItemId) -> InventoryResult<Option<InventoryItem>> {
        Ok(self.items.read().get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ItemId]) -> InventoryResult<Vec<InventoryItem>> {
        let items = self.items.read();
        Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }

    async fn insert(&self, item: InventoryItem) -> InventoryResult<()> {
        let mut items = self.items.write();
        if items.contains_key(&item.id) {
            return Err(InventoryError::AlreadyExists(item.id));
        }
        items.insert(item.id, item);
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: UserId) -> InventoryResult<Vec<InventoryItem>> {
        let items = self.items.read();
        let mut result: Vec<InventoryItem> = items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn try_hold(
        &self,
        id: ItemId,
        owner_id: UserId,
        trade_id: TradeId,
        hold_until: DateTime<Utc>,
    ) -> InventoryResult<InventoryItem> {
        let mut items = self.items.write();
        let item = items.get_mut(&id).ok_or(InventoryError::NotFound(id))?;

        if item.owner_id != owner_id {
            return Err(InventoryError::NotOwned {
                item: id,
                user: owner_id,
            });
        }

        match item.status {
            ItemStatus::Available => {}
            // A stale hold still blocks: the sweeper must release it first,
            // otherwise two trades could overlap during the handover.
            ItemStatus::OnHold => return Err(InventoryError::Conflict { item: id }),
            ItemStatus::Archived => return Err(InventoryError::NotAvailable(id)),
        }

        item.status = ItemStatus::OnHold;
        item.locked_by_trade = Some(trade_id);
        item.hold_until = Some(hold_until);
        item.updated_at = Utc::now();

        debug!(item = %id, trade = %trade_id, "Item held");
        Ok(item.clone())
    }

    async fn release(&self, id: ItemId, trade_id: TradeId) -> InventoryResult<bool> {
        let mut items = self.items.write();
        let item = items.get_mut(&id).ok_or(InventoryError::NotFound(id))?;

        if !item.is_held_by(trade_id) {
            return Ok(false);
        }

        item.status = ItemStatus::Available;
        item.locked_by_trade = None;
        item.hold_until = None;
        item.updated_at = Utc::now();

        debug!(item = %id, trade = %trade_id, "Hold released");
        Ok(true)
    }

    async fn transfer(
        &self,
        id: ItemId,
        from: UserId,
        to: UserId,
        trade_id: TradeId,
    ) -> InventoryResult<InventoryItem> {
        let mut items = self.items.write();
        let item = items.get_mut(&id).ok_or(InventoryError::NotFound(id))?;

        if !item.is_held_by(trade_id) {
            return Err(InventoryError::NotHeld {
                item: id,
                trade: trade_id,
            });
        }

        if item.owner_id != from {
            return Err(InventoryError::NotOwned {
                item: id,
                user: from,
            });
        }

        item.owner_id = to;
        item.status = ItemStatus::Available;
        item.locked_by_trade = None;
        item.hold_until = None;
        item.last_trade = Some(trade_id);
        item.updated_at = Utc::now();

        debug!(item = %id, %from, %to, trade = %trade_id, "Ownership transferred");
        Ok(item.clone())
    }

    async fn archive(&self, id: ItemId) -> InventoryResult<()> {
        let mut items = self.items.write();
        let item = items.get_mut(&id).ok_or(InventoryError::NotFound(id))?;

        if item.status != ItemStatus::Available {
            return Err(InventoryError::NotAvailable(id));
        }

        item.status = ItemStatus::Archived;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn list_stale_holds(&self, now: DateTime<Utc>) -> InventoryResult<Vec<InventoryItem>> {
        let items = self.items.read();
        Ok(items.values().filter(|i| i.is_stale(now)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed_item(store: &InMemoryInventoryStore, owner: UserId) -> InventoryItem {
        let item = InventoryItem::new(owner);
        store.insert(item.clone()).await.unwrap();
        item
    }

    fn window() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(10)
    }

    #[tokio::test]
    async fn test_hold_success() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;
        let trade = TradeId::new();

        let held = store.try_hold(item.id, owner, trade, window()).await.unwrap();

        assert_eq!(held.status, ItemStatus::OnHold);
        assert_eq!(held.locked_by_trade, Some(trade));
        assert!(held.hold_until.is_some());
    }

    #[tokio::test]
    async fn test_hold_rejects_wrong_owner() {
        let store = InMemoryInventoryStore::new();
        let item = seed_item(&store, UserId::new()).await;

        let result = store
            .try_hold(item.id, UserId::new(), TradeId::new(), window())
            .await;

        assert!(matches!(result, Err(InventoryError::NotOwned { .. })));
    }

    #[tokio::test]
    async fn test_hold_rejects_already_held() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;

        store
            .try_hold(item.id, owner, TradeId::new(), window())
            .await
            .unwrap();
        let second = store.try_hold(item.id, owner, TradeId::new(), window()).await;

        assert!(matches!(second, Err(InventoryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_hold_rejects_archived() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;
        store.archive(item.id).await.unwrap();

        let result = store.try_hold(item.id, owner, TradeId::new(), window()).await;

        assert!(matches!(result, Err(InventoryError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_concurrent_holds_exactly_one_wins() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let id = item.id;
            handles.push(tokio::spawn(async move {
                store.try_hold(id, owner, TradeId::new(), window()).await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(InventoryError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;
        let trade = TradeId::new();

        store.try_hold(item.id, owner, trade, window()).await.unwrap();

        assert!(store.release(item.id, trade).await.unwrap());
        assert!(!store.release(item.id, trade).await.unwrap());

        let after = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(after.status, ItemStatus::Available);
        assert!(after.locked_by_trade.is_none());
    }

    #[tokio::test]
    async fn test_release_ignores_other_trades_hold() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let item = seed_item(&store, owner).await;
        let trade = TradeId::new();

        store.try_hold(item.id, owner, trade, window()).await.unwrap();

        // A different trade cannot release someone else's hold.
        assert!(!store.release(item.id, TradeId::new()).await.unwrap());
        let after = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(after.locked_by_trade, Some(trade));
    }

    #[tokio::test]
    async fn test_transfer_requires_hold() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let buyer = UserId::new();
        let item = seed_item(&store, owner).await;

        let result = store.transfer(item.id, owner, buyer, TradeId::new()).await;
        assert!(matches!(result, Err(InventoryError::NotHeld { .. })));
    }

    #[tokio::test]
    async fn test_transfer_moves_ownership_and_stamps_audit() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let buyer = UserId::new();
        let item = seed_item(&store, owner).await;
        let trade = TradeId::new();

        store.try_hold(item.id, owner, trade, window()).await.unwrap();
        let moved = store.transfer(item.id, owner, buyer, trade).await.unwrap();

        assert_eq!(moved.owner_id, buyer);
        assert_eq!(moved.status, ItemStatus::Available);
        assert!(moved.locked_by_trade.is_none());
        assert!(moved.hold_until.is_none());
        assert_eq!(moved.last_trade, Some(trade));
    }

    #[tokio::test]
    async fn test_list_stale_holds() {
        let store = InMemoryInventoryStore::new();
        let owner = UserId::new();
        let fresh = seed_item(&store, owner).await;
        let stale = seed_item(&store, owner).await;

        let now = Utc::now();
        store
            .try_hold(fresh.id, owner, TradeId::new(), now + Duration::minutes(10))
            .await
            .unwrap();
        store
            .try_hold(stale.id, owner, TradeId::new(), now + Duration::seconds(1))
            .await
            .unwrap();

        let later = now + Duration::minutes(1);
        let stale_items = store.list_stale_holds(later).await.unwrap();
        assert_eq!(stale_items.len(), 1);
        assert_eq!(stale_items[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let store = InMemoryInventoryStore::new();
        let item = InventoryItem::new(UserId::new());
        store.insert(item.clone()).await.unwrap();

        let result = store.insert(item).await;
        assert!(matches!(result, Err(InventoryError::AlreadyExists(_))));
    }
}
