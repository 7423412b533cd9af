//! Trade history ledger.
//!
//! Append-only record of every negotiation that reached a terminal state.
//! Records are written exactly once and never mutated; the query side exists
//! for audit and provenance lookups.

use crate::error::{TradeError, TradeResult};
use crate::types::{TradeNegotiation, TradeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, ListingId, TradeId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A finalized trade, as recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// The negotiation this record snapshots
    pub trade_id: TradeId,
    /// The listing the negotiation targeted
    pub listing_id: ListingId,
    /// Who made the offer
    pub requester_id: UserId,
    /// Snapshot of the offered item ids at termination
    pub offered_items: Vec<ItemId>,
    /// Terminal status: Completed, Rejected, Cancelled, or Expired
    pub final_status: TradeStatus,
    /// When the negotiation terminated
    pub completed_at: DateTime<Utc>,
    /// When this record was written
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Snapshot a terminal negotiation.
    pub fn from_negotiation(trade: &TradeNegotiation) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trade_id: trade.id,
            listing_id: trade.listing_id,
            requester_id: trade.requester_id,
            offered_items: trade.offered_items.clone(),
            final_status: trade.status,
            completed_at: now,
            created_at: now,
        }
    }
}

/// Sort key for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySortBy {
    #[default]
    CompletedAt,
    CreatedAt,
}

/// Query filters for trade history.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Filter by terminal status.
    pub final_status: Option<TradeStatus>,
    /// Filter by requester.
    pub requester_id: Option<UserId>,
    /// Filter by listing.
    pub listing_id: Option<ListingId>,
    /// Filter by completion after this instant.
    pub completed_from: Option<DateTime<Utc>>,
    /// Filter by completion before this instant.
    pub completed_to: Option<DateTime<Utc>>,
    /// Sort key.
    pub sort_by: HistorySortBy,
    /// Newest first when true.
    pub desc: bool,
    /// Limit number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl HistoryQuery {
    /// Create a new empty query (completed_at descending).
    pub fn new() -> Self {
        Self {
            desc: true,
            ..Self::default()
        }
    }

    /// Filter by terminal status.
    pub fn with_final_status(mut self, status: TradeStatus) -> Self {
        self.final_status = Some(status);
        self
    }

    /// Filter by requester.
    pub fn with_requester(mut self, requester_id: UserId) -> Self {
        self.requester_id = Some(requester_id);
        self
    }

    /// Filter by listing.
    pub fn with_listing(mut self, listing_id: ListingId) -> Self {
        self.listing_id = Some(listing_id);
        self
    }

    /// Filter by completion time range.
    pub fn with_completed_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.completed_from = from;
        self.completed_to = to;
        self
    }

    /// Set the sort key and direction.
    pub fn with_sort(mut self, sort_by: HistorySortBy, desc: bool) -> Self {
        self.sort_by = sort_by;
        self.desc = desc;
        self
    }

    /// Set pagination.
    pub fn with_pagination(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Check whether a record matches this query.
    pub fn matches(&self, record: &TradeRecord) -> bool {
        if let Some(status) = self.final_status {
            if record.final_status != status {
                return false;
            }
        }

        if let Some(requester_id) = self.requester_id {
            if record.requester_id != requester_id {
                return false;
            }
        }

        if let Some(listing_id) = self.listing_id {
            if record.listing_id != listing_id {
                return false;
            }
        }

        if let Some(from) = self.completed_from {
            if record.completed_at < from {
                return false;
            }
        }

        if let Some(to) = self.completed_to {
            if record.completed_at > to {
                return false;
            }
        }

        true
    }
}

/// Trait for trade history storage.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record. Exactly one record per terminal negotiation; a
    /// second append for the same trade is rejected.
    async fn append(&self, record: TradeRecord) -> TradeResult<TradeRecord>;

    /// Records matching the query, sorted and paginated.
    async fn query(&self, query: &HistoryQuery) -> TradeResult<Vec<TradeRecord>>;

    /// Count records matching the query (ignoring pagination).
    async fn count(&self, query: &HistoryQuery) -> TradeResult<usize>;
}

/// In-memory implementation of [`HistoryStore`].
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<TradeRecord>>>,
}

impl InMemoryHistoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Clone for InMemoryHistoryStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: TradeRecord) -> TradeResult<TradeRecord> {
        let mut records = self.records.write();

        if records.iter().any(|r| r.trade_id == record.trade_id) {
            return Err(TradeError::Storage(format!(
                "history record for trade {} already exists",
                record.trade_id
            )));
        }

        records.push(record.clone());
        Ok(record)
    }

    async fn query(&self, query: &HistoryQuery) -> TradeResult<Vec<TradeRecord>> {
        let records = self.records.read();
        let mut result: Vec<TradeRecord> =
            records.iter().filter(|r| query.matches(r)).cloned().collect();

        result.sort_by(|a, b| {
            let ordering = match query.sort_by {
                HistorySortBy::CompletedAt => a.completed_at.cmp(&b.completed_at),
                HistorySortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            if query.desc {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(result.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: &HistoryQuery) -> TradeResult<usize> {
        let records = self.records.read();
        Ok(records.iter().filter(|r| query.matches(r)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal_trade(status: TradeStatus) -> TradeNegotiation {
        let mut trade = TradeNegotiation::new(ListingId::new(), UserId::new(), vec![ItemId::new()]);
        trade.status = status;
        trade
    }

    #[tokio::test]
    async fn test_append_and_query() {
        let store = InMemoryHistoryStore::new();
        let trade = terminal_trade(TradeStatus::Completed);

        store
            .append(TradeRecord::from_negotiation(&trade))
            .await
            .unwrap();

        let all = store.query(&HistoryQuery::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].trade_id, trade.id);
        assert_eq!(all[0].final_status, TradeStatus::Completed);
    }

    #[tokio::test]
    async fn test_append_rejects_second_record_for_same_trade() {
        let store = InMemoryHistoryStore::new();
        let trade = terminal_trade(TradeStatus::Expired);

        store
            .append(TradeRecord::from_negotiation(&trade))
            .await
            .unwrap();
        let second = store.append(TradeRecord::from_negotiation(&trade)).await;

        assert!(matches!(second, Err(TradeError::Storage(_))));
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = InMemoryHistoryStore::new();
        let completed = terminal_trade(TradeStatus::Completed);
        let expired = terminal_trade(TradeStatus::Expired);

        store
            .append(TradeRecord::from_negotiation(&completed))
            .await
            .unwrap();
        store
            .append(TradeRecord::from_negotiation(&expired))
            .await
            .unwrap();

        let only_completed = store
            .query(&HistoryQuery::new().with_final_status(TradeStatus::Completed))
            .await
            .unwrap();
        assert_eq!(only_completed.len(), 1);

        let by_requester = store
            .query(&HistoryQuery::new().with_requester(expired.requester_id))
            .await
            .unwrap();
        assert_eq!(by_requester.len(), 1);
        assert_eq!(by_requester[0].trade_id, expired.id);

        assert_eq!(store.count(&HistoryQuery::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_pagination_and_sort() {
        let store = InMemoryHistoryStore::new();
        for _ in 0..5 {
            let trade = terminal_trade(TradeStatus::Rejected);
            store
                .append(TradeRecord::from_negotiation(&trade))
                .await
                .unwrap();
        }

        let page = store
            .query(&HistoryQuery::new().with_pagination(2, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let asc = store
            .query(&HistoryQuery::new().with_sort(HistorySortBy::CompletedAt, false))
            .await
            .unwrap();
        assert!(asc.windows(2).all(|w| w[0].completed_at <= w[1].completed_at));
    }
}
