//! Listing storage trait and in-memory implementation.
//!
//! Status transitions are guarded by the current state and no-op-safe when
//! the listing is already where the caller wants it, so a retried request
//! does not fail spuriously.

use crate::error::{ListingError, ListingResult};
use crate::types::{Listing, ListingStatus};
use async_trait::async_trait;
use chrono::Utc;
use common::{ItemId, ListingId, TradeId, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Query filters for listing lookups.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    /// Filter by status.
    pub status: Option<ListingStatus>,
    /// Filter by owner.
    pub owner_id: Option<UserId>,
    /// Limit number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl ListingQuery {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by status.
    pub fn with_status(mut self, status: ListingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by owner.
    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set pagination.
    pub fn with_pagination(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Check whether a listing matches this query.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(status) = self.status {
            if listing.status != status {
                return false;
            }
        }

        if let Some(owner_id) = self.owner_id {
            if listing.owner_id != owner_id {
                return false;
            }
        }

        true
    }
}

/// Trait for listing storage.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Open a new active listing for an item.
    async fn open_for_trade(
        &self,
        item_id: ItemId,
        owner_id: UserId,
        is_free: bool,
    ) -> ListingResult<Listing>;

    /// Get a listing by id.
    async fn get(&self, id: ListingId) -> ListingResult<Option<Listing>>;

    /// List listings matching the query, newest first.
    async fn list(&self, query: &ListingQuery) -> ListingResult<Vec<Listing>>;

    /// Active → OnHold, stamping the holding trade. No-op when already
    /// OnHold by the same trade.
    async fn mark_on_hold(&self, id: ListingId, trade_id: TradeId) -> ListingResult<Listing>;

    /// OnHold → Active, clearing the holding trade. No-op when already
    /// Active.
    async fn mark_active(&self, id: ListingId) -> ListingResult<Listing>;

    /// OnHold → Completed. No-op when already Completed.
    async fn mark_completed(&self, id: ListingId) -> ListingResult<Listing>;

    /// Active → Cancelled. No-op when already Cancelled. A listing with an
    /// accepted trade in flight (OnHold) cannot be cancelled directly; the
    /// trade has to terminate first.
    async fn mark_cancelled(&self, id: ListingId) -> ListingResult<Listing>;
}

/// In-memory implementation of [`ListingStore`].
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    listings: Arc<RwLock<HashMap<ListingId, Listing>>>,
}

impl InMemoryListingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            listings: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Clone for InMemoryListingStore {
    fn clone(&self) -> Self {
        Self {
            listings: Arc::clone(&self.listings),
        }
    }
}

impl InMemoryListingStore {
    /// Shared guarded-transition helper. `allowed_from` is the status the
    /// listing must currently be in; reaching `to` already is a no-op.
    fn transition(
        &self,
        id: ListingId,
        allowed_from: ListingStatus,
        to: ListingStatus,
        on_hold_by: Option<TradeId>,
    ) -> ListingResult<Listing> {
        let mut listings = self.listings.write();
        let listing = listings.get_mut(&id).ok_or(ListingError::NotFound(id))?;

        if listing.status == to {
            // Retry tolerance: the caller already got what it wanted.
            return Ok(listing.clone());
        }

        if listing.status != allowed_from {
            return Err(ListingError::BadTransition {
                listing: id,
                from: listing.status,
                to,
            });
        }

        listing.status = to;
        listing.on_hold_by = on_hold_by;
        listing.updated_at = Utc::now();

        debug!(listing = %id, status = %to, "Listing transitioned");
        Ok(listing.clone())
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn open_for_trade(
        &self,
        item_id: ItemId,
        owner_id: UserId,
        is_free: bool,
    ) -> ListingResult<Listing> {
        let mut listings = self.listings.write();

        let already_live = listings
            .values()
            .any(|l| l.item_id == item_id && !l.status.is_terminal());
        if already_live {
            return Err(ListingError::AlreadyListed(item_id));
        }

        let listing = Listing::new(item_id, owner_id, is_free);
        listings.insert(listing.id, listing.clone());

        debug!(listing = %listing.id, item = %item_id, "Listing opened");
        Ok(listing)
    }

    async fn get(&self, id: ListingId) -> ListingResult<Option<Listing>> {
        Ok(self.listings.read().get(&id).cloned())
    }

    async fn list(&self, query: &ListingQuery) -> ListingResult<Vec<Listing>> {
        let listings = self.listings.read();
        let mut results: Vec<Listing> = listings
            .values()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.listed_at.cmp(&a.listed_at));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(results.into_iter().skip(offset).take(limit).collect())
    }

    async fn mark_on_hold(&self, id: ListingId, trade_id: TradeId) -> ListingResult<Listing> {
        let mut listings = self.listings.write();
        let listing = listings.get_mut(&id).ok_or(ListingError::NotFound(id))?;

        // Retry tolerance for the holding trade; any other trade loses.
        if listing.status == ListingStatus::OnHold {
            if listing.on_hold_by == Some(trade_id) {
                return Ok(listing.clone());
            }
            return Err(ListingError::BadTransition {
                listing: id,
                from: listing.status,
                to: ListingStatus::OnHold,
            });
        }

        if listing.status != ListingStatus::Active {
            return Err(ListingError::BadTransition {
                listing: id,
                from: listing.status,
                to: ListingStatus::OnHold,
            });
        }

        listing.status = ListingStatus::OnHold;
        listing.on_hold_by = Some(trade_id);
        listing.updated_at = Utc::now();

        debug!(listing = %id, trade = %trade_id, "Listing on hold");
        Ok(listing.clone())
    }

    async fn mark_active(&self, id: ListingId) -> ListingResult<Listing> {
        self.transition(id, ListingStatus::OnHold, ListingStatus::Active, None)
    }

    async fn mark_completed(&self, id: ListingId) -> ListingResult<Listing> {
        self.transition(id, ListingStatus::OnHold, ListingStatus::Completed, None)
    }

    async fn mark_cancelled(&self, id: ListingId) -> ListingResult<Listing> {
        self.transition(id, ListingStatus::Active, ListingStatus::Cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(store: &InMemoryListingStore) -> Listing {
        store
            .open_for_trade(ItemId::new(), UserId::new(), false)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;

        let fetched = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, listing.id);
        assert_eq!(fetched.status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_open_rejects_double_listing() {
        let store = InMemoryListingStore::new();
        let item = ItemId::new();
        let owner = UserId::new();

        store.open_for_trade(item, owner, false).await.unwrap();
        let second = store.open_for_trade(item, owner, false).await;

        assert!(matches!(second, Err(ListingError::AlreadyListed(_))));
    }

    #[tokio::test]
    async fn test_relisting_after_cancel_is_allowed() {
        let store = InMemoryListingStore::new();
        let item = ItemId::new();
        let owner = UserId::new();

        let listing = store.open_for_trade(item, owner, false).await.unwrap();
        store.mark_cancelled(listing.id).await.unwrap();

        assert!(store.open_for_trade(item, owner, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_hold_and_release_cycle() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;
        let trade = TradeId::new();

        let held = store.mark_on_hold(listing.id, trade).await.unwrap();
        assert_eq!(held.status, ListingStatus::OnHold);
        assert_eq!(held.on_hold_by, Some(trade));

        let active = store.mark_active(listing.id).await.unwrap();
        assert_eq!(active.status, ListingStatus::Active);
        assert!(active.on_hold_by.is_none());
    }

    #[tokio::test]
    async fn test_mark_on_hold_is_retry_safe_for_same_trade() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;
        let trade = TradeId::new();

        store.mark_on_hold(listing.id, trade).await.unwrap();
        let retry = store.mark_on_hold(listing.id, trade).await.unwrap();
        assert_eq!(retry.status, ListingStatus::OnHold);
    }

    #[tokio::test]
    async fn test_mark_on_hold_rejects_other_trade() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;

        store.mark_on_hold(listing.id, TradeId::new()).await.unwrap();
        let other = store.mark_on_hold(listing.id, TradeId::new()).await;

        assert!(matches!(other, Err(ListingError::BadTransition { .. })));
    }

    #[tokio::test]
    async fn test_cancel_requires_active() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;

        store.mark_on_hold(listing.id, TradeId::new()).await.unwrap();
        let result = store.mark_cancelled(listing.id).await;

        assert!(matches!(result, Err(ListingError::BadTransition { .. })));
    }

    #[tokio::test]
    async fn test_complete_requires_on_hold() {
        let store = InMemoryListingStore::new();
        let listing = open(&store).await;

        let result = store.mark_completed(listing.id).await;
        assert!(matches!(result, Err(ListingError::BadTransition { .. })));

        store.mark_on_hold(listing.id, TradeId::new()).await.unwrap();
        let completed = store.mark_completed(listing.id).await.unwrap();
        assert_eq!(completed.status, ListingStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_with_query() {
        let store = InMemoryListingStore::new();
        let owner = UserId::new();

        store.open_for_trade(ItemId::new(), owner, false).await.unwrap();
        store.open_for_trade(ItemId::new(), owner, true).await.unwrap();
        let other = open(&store).await;
        store.mark_cancelled(other.id).await.unwrap();

        let by_owner = store
            .list(&ListingQuery::new().with_owner(owner))
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 2);

        let active = store
            .list(&ListingQuery::new().with_status(ListingStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);

        let paged = store
            .list(&ListingQuery::new().with_pagination(1, 0))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
    }
}
