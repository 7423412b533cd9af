//! Trade negotiation storage trait and in-memory implementation.
//!
//! Every state-changing operation here is conditional: it names the phase
//! the trade must still be in, and the check plus the write happen in one
//! critical section. Callers learn they lost a race from an `Ok(None)` (or
//! [`LockOutcome`]) instead of clobbering a concurrent transition.

use crate::error::{TradeError, TradeResult};
use crate::types::{LockOutcome, LockParty, TradeNegotiation, TradeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ListingId, TradeId, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for trade negotiation storage.
///
/// Implementations must make the conditional operations atomic with respect
/// to each other (optimistic version check, row lock, or a single in-process
/// critical section). In particular `set_lock_flag` must decide "both flags
/// are now set" in the same atomic step that sets the caller's flag.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Persist a new pending negotiation.
    ///
    /// Enforces the uniqueness invariant: at most one Pending negotiation
    /// per (listing, requester) pair. Violations return `Conflict`.
    async fn create(&self, trade: TradeNegotiation) -> TradeResult<TradeNegotiation>;

    /// Get a negotiation by id.
    async fn get(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>>;

    /// All negotiations targeting a listing, newest first.
    async fn list_for_listing(&self, listing_id: ListingId) -> TradeResult<Vec<TradeNegotiation>>;

    /// All negotiations created by a requester, newest first.
    async fn list_for_requester(&self, requester_id: UserId)
        -> TradeResult<Vec<TradeNegotiation>>;

    /// The Pending negotiation for (listing, requester), if one exists.
    async fn find_pending(
        &self,
        listing_id: ListingId,
        requester_id: UserId,
    ) -> TradeResult<Option<TradeNegotiation>>;

    /// Pending → Accepted, stamping `responded_at` and the lock window.
    /// Returns `None` when the trade is no longer Pending.
    async fn accept_if_pending(
        &self,
        id: TradeId,
        lock_window_expires_at: DateTime<Utc>,
    ) -> TradeResult<Option<TradeNegotiation>>;

    /// Pending → Rejected, stamping `responded_at`. Returns `None` when the
    /// trade is no longer Pending.
    async fn reject_if_pending(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>>;

    /// Atomically set a party's lock flag on an Accepted trade.
    ///
    /// Exactly one caller ever receives [`LockOutcome::ReadyToComplete`]:
    /// the one whose write turned the second flag true. `locked_at` is
    /// stamped in the same step.
    async fn set_lock_flag(&self, id: TradeId, party: LockParty) -> TradeResult<LockOutcome>;

    /// Accepted-with-both-flags → Completed. Returns `None` when the
    /// precondition no longer holds.
    async fn complete_if_locked(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>>;

    /// Pending or Accepted (not fully locked) → Cancelled. Returns the
    /// updated trade and the status it had before, or `None` when the trade
    /// is not cancellable any more.
    async fn cancel_if_open(
        &self,
        id: TradeId,
    ) -> TradeResult<Option<(TradeNegotiation, TradeStatus)>>;

    /// Accepted, window lapsed, not both locked → Expired. The same guard
    /// the foreground uses, so an expiry can never overwrite a completion.
    async fn expire_if_lapsed(
        &self,
        id: TradeId,
        now: DateTime<Utc>,
    ) -> TradeResult<Option<TradeNegotiation>>;

    /// Accepted trades whose lock window lapsed without both flags set.
    /// Candidates only; the sweep re-checks via `expire_if_lapsed`.
    async fn list_expired_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> TradeResult<Vec<TradeNegotiation>>;
}

/// In-memory implementation of [`TradeStore`].
///
/// A single `parking_lot` write lock per mutation provides the atomicity the
/// trait demands.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    trades: Arc<RwLock<HashMap<TradeId, TradeNegotiation>>>,
}

impl InMemoryTradeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            trades: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Clone for InMemoryTradeStore {
    fn clone(&self) -> Self {
        Self {
            trades: Arc::clone(&self.trades),
        }
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn create(&self, trade: TradeNegotiation) -> TradeResult<TradeNegotiation> {
        let mut trades = self.trades.write();

        let duplicate = trades.values().any(|t| {
            t.listing_id == trade.listing_id
                && t.requester_id == trade.requester_id
                && t.status == TradeStatus::Pending
        });
        if duplicate {
            return Err(TradeError::conflict(
                "a pending negotiation already exists for this listing and requester",
            ));
        }

        trades.insert(trade.id, trade.clone());
        debug!(trade = %trade.id, listing = %trade.listing_id, "Negotiation created");
        Ok(trade)
    }

    async fn get(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>> {
        Ok(self.trades.read().get(&id).cloned())
    }

    async fn list_for_listing(&self, listing_id: ListingId) -> TradeResult<Vec<TradeNegotiation>> {
        let trades = self.trades.read();
        let mut result: Vec<TradeNegotiation> = trades
            .values()
            .filter(|t| t.listing_id == listing_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(result)
    }

    async fn list_for_requester(
        &self,
        requester_id: UserId,
    ) -> TradeResult<Vec<TradeNegotiation>> {
        let trades = self.trades.read();
        let mut result: Vec<TradeNegotiation> = trades
            .values()
            .filter(|t| t.requester_id == requester_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(result)
    }

    async fn find_pending(
        &self,
        listing_id: ListingId,
        requester_id: UserId,
    ) -> TradeResult<Option<TradeNegotiation>> {
        let trades = self.trades.read();
        Ok(trades
            .values()
            .find(|t| {
                t.listing_id == listing_id
                    && t.requester_id == requester_id
                    && t.status == TradeStatus::Pending
            })
            .cloned())
    }

    async fn accept_if_pending(
        &self,
        id: TradeId,
        lock_window_expires_at: DateTime<Utc>,
    ) -> TradeResult<Option<TradeNegotiation>> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        if trade.status != TradeStatus::Pending {
            return Ok(None);
        }

        let now = Utc::now();
        trade.status = TradeStatus::Accepted;
        trade.responded_at = Some(now);
        trade.lock_window_expires_at = Some(lock_window_expires_at);
        trade.updated_at = now;

        debug!(trade = %id, "Negotiation accepted");
        Ok(Some(trade.clone()))
    }

    async fn reject_if_pending(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        if trade.status != TradeStatus::Pending {
            return Ok(None);
        }

        let now = Utc::now();
        trade.status = TradeStatus::Rejected;
        trade.responded_at = Some(now);
        trade.updated_at = now;

        debug!(trade = %id, "Negotiation rejected");
        Ok(Some(trade.clone()))
    }

    async fn set_lock_flag(&self, id: TradeId, party: LockParty) -> TradeResult<LockOutcome> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        if trade.status != TradeStatus::Accepted {
            return Ok(LockOutcome::NotAccepted(trade.status));
        }

        if trade.is_locked_by(party) {
            return Ok(LockOutcome::AlreadyLocked);
        }

        match party {
            LockParty::Owner => trade.owner_locked = true,
            LockParty::Requester => trade.requester_locked = true,
        }
        trade.updated_at = Utc::now();

        if trade.both_locked() {
            trade.locked_at = Some(trade.updated_at);
            debug!(trade = %id, %party, "Both parties locked");
            Ok(LockOutcome::ReadyToComplete(trade.clone()))
        } else {
            debug!(trade = %id, %party, "Party locked, waiting on counterpart");
            Ok(LockOutcome::Locked(trade.clone()))
        }
    }

    async fn complete_if_locked(&self, id: TradeId) -> TradeResult<Option<TradeNegotiation>> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        if trade.status != TradeStatus::Accepted || !trade.both_locked() {
            return Ok(None);
        }

        trade.status = TradeStatus::Completed;
        trade.updated_at = Utc::now();

        debug!(trade = %id, "Negotiation completed");
        Ok(Some(trade.clone()))
    }

    async fn cancel_if_open(
        &self,
        id: TradeId,
    ) -> TradeResult<Option<(TradeNegotiation, TradeStatus)>> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        let previous = trade.status;
        let cancellable = match previous {
            TradeStatus::Pending => true,
            // Once both parties locked, completion is in flight and wins.
            TradeStatus::Accepted => !trade.both_locked(),
            _ => false,
        };
        if !cancellable {
            return Ok(None);
        }

        trade.status = TradeStatus::Cancelled;
        trade.updated_at = Utc::now();

        debug!(trade = %id, from = %previous, "Negotiation cancelled");
        Ok(Some((trade.clone(), previous)))
    }

    async fn expire_if_lapsed(
        &self,
        id: TradeId,
        now: DateTime<Utc>,
    ) -> TradeResult<Option<TradeNegotiation>> {
        let mut trades = self.trades.write();
        let trade = trades
            .get_mut(&id)
            .ok_or_else(|| TradeError::not_found(format!("trade {id}")))?;

        if !trade.is_lock_window_lapsed(now) {
            return Ok(None);
        }

        trade.status = TradeStatus::Expired;
        trade.updated_at = Utc::now();

        debug!(trade = %id, "Negotiation expired");
        Ok(Some(trade.clone()))
    }

    async fn list_expired_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> TradeResult<Vec<TradeNegotiation>> {
        let trades = self.trades.read();
        Ok(trades
            .values()
            .filter(|t| t.is_lock_window_lapsed(now))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::ItemId;

    fn pending_trade() -> TradeNegotiation {
        TradeNegotiation::new(ListingId::new(), UserId::new(), vec![ItemId::new()])
    }

    fn window() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(10)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();

        store.create(trade.clone()).await.unwrap();
        let fetched = store.get(trade.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, trade.id);
        assert_eq!(fetched.status, TradeStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_pending_pair() {
        let store = InMemoryTradeStore::new();
        let first = pending_trade();
        let mut second = pending_trade();
        second.listing_id = first.listing_id;
        second.requester_id = first.requester_id;

        store.create(first).await.unwrap();
        let result = store.create(second).await;
        assert!(matches!(result, Err(TradeError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_pair_allowed_after_terminal() {
        let store = InMemoryTradeStore::new();
        let first = pending_trade();
        let mut second = pending_trade();
        second.listing_id = first.listing_id;
        second.requester_id = first.requester_id;

        store.create(first.clone()).await.unwrap();
        store.reject_if_pending(first.id).await.unwrap().unwrap();

        assert!(store.create(second).await.is_ok());
    }

    #[tokio::test]
    async fn test_accept_only_from_pending() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();

        let accepted = store.accept_if_pending(trade.id, window()).await.unwrap();
        assert!(accepted.is_some());
        let accepted = accepted.unwrap();
        assert_eq!(accepted.status, TradeStatus::Accepted);
        assert!(accepted.responded_at.is_some());
        assert!(accepted.lock_window_expires_at.is_some());

        // Second accept loses the precondition
        let again = store.accept_if_pending(trade.id, window()).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_lock_flags_and_completion_decision() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();
        store.accept_if_pending(trade.id, window()).await.unwrap();

        let first = store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();
        assert!(matches!(first, LockOutcome::Locked(_)));

        let repeat = store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();
        assert!(matches!(repeat, LockOutcome::AlreadyLocked));

        let second = store
            .set_lock_flag(trade.id, LockParty::Requester)
            .await
            .unwrap();
        match second {
            LockOutcome::ReadyToComplete(t) => {
                assert!(t.both_locked());
                assert!(t.locked_at.is_some());
            }
            other => panic!("expected ReadyToComplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lock_flag_on_pending_trade() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();

        let outcome = store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();
        assert!(matches!(outcome, LockOutcome::NotAccepted(TradeStatus::Pending)));
    }

    #[tokio::test]
    async fn test_concurrent_locks_exactly_one_completer() {
        let store = Arc::new(InMemoryTradeStore::new());
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();
        store.accept_if_pending(trade.id, window()).await.unwrap();

        let owner_store = Arc::clone(&store);
        let requester_store = Arc::clone(&store);
        let id = trade.id;

        let owner = tokio::spawn(async move { owner_store.set_lock_flag(id, LockParty::Owner).await });
        let requester =
            tokio::spawn(
                async move { requester_store.set_lock_flag(id, LockParty::Requester).await },
            );

        let outcomes = [owner.await.unwrap().unwrap(), requester.await.unwrap().unwrap()];
        let completers = outcomes
            .iter()
            .filter(|o| matches!(o, LockOutcome::ReadyToComplete(_)))
            .count();
        let waiters = outcomes
            .iter()
            .filter(|o| matches!(o, LockOutcome::Locked(_)))
            .count();

        assert_eq!(completers, 1);
        assert_eq!(waiters, 1);
    }

    #[tokio::test]
    async fn test_expire_respects_completion() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();
        // Window already lapsed at acceptance time
        let past = Utc::now() - Duration::seconds(1);
        store.accept_if_pending(trade.id, past).await.unwrap();

        store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();
        store
            .set_lock_flag(trade.id, LockParty::Requester)
            .await
            .unwrap();

        // Both locked: the lapsed window no longer matters
        let expired = store.expire_if_lapsed(trade.id, Utc::now()).await.unwrap();
        assert!(expired.is_none());

        let completed = store.complete_if_locked(trade.id).await.unwrap();
        assert!(completed.is_some());
        assert_eq!(completed.unwrap().status, TradeStatus::Completed);
    }

    #[tokio::test]
    async fn test_expire_lapsed_half_locked() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();
        let past = Utc::now() - Duration::seconds(1);
        store.accept_if_pending(trade.id, past).await.unwrap();
        store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();

        let candidates = store.list_expired_candidates(Utc::now()).await.unwrap();
        assert_eq!(candidates.len(), 1);

        let expired = store.expire_if_lapsed(trade.id, Utc::now()).await.unwrap();
        assert_eq!(expired.unwrap().status, TradeStatus::Expired);

        // Terminal: a late lock attempt reports the phase
        let late = store.set_lock_flag(trade.id, LockParty::Requester).await.unwrap();
        assert!(matches!(late, LockOutcome::NotAccepted(TradeStatus::Expired)));
    }

    #[tokio::test]
    async fn test_cancel_pending_and_accepted() {
        let store = InMemoryTradeStore::new();

        let pending = pending_trade();
        store.create(pending.clone()).await.unwrap();
        let (cancelled, previous) = store.cancel_if_open(pending.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, TradeStatus::Cancelled);
        assert_eq!(previous, TradeStatus::Pending);

        let accepted = pending_trade();
        store.create(accepted.clone()).await.unwrap();
        store.accept_if_pending(accepted.id, window()).await.unwrap();
        let (_, previous) = store.cancel_if_open(accepted.id).await.unwrap().unwrap();
        assert_eq!(previous, TradeStatus::Accepted);
    }

    #[tokio::test]
    async fn test_cancel_refused_when_both_locked() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();
        store.accept_if_pending(trade.id, window()).await.unwrap();
        store.set_lock_flag(trade.id, LockParty::Owner).await.unwrap();
        store
            .set_lock_flag(trade.id, LockParty::Requester)
            .await
            .unwrap();

        let result = store.cancel_if_open(trade.id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_pending() {
        let store = InMemoryTradeStore::new();
        let trade = pending_trade();
        store.create(trade.clone()).await.unwrap();

        let found = store
            .find_pending(trade.listing_id, trade.requester_id)
            .await
            .unwrap();
        assert!(found.is_some());

        store.reject_if_pending(trade.id).await.unwrap();
        let gone = store
            .find_pending(trade.listing_id, trade.requester_id)
            .await
            .unwrap();
        assert!(gone.is_none());
    }
}
