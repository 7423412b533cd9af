//! Trading engine - core business logic for the trade lifecycle
//!
//! The engine orchestrates the inventory ledger, listing registry, trade
//! store, and history ledger. It owns no state of its own; every mutation
//! goes through a store's conditional-update operation, so any number of
//! engine instances (or request handlers) can run concurrently against the
//! same stores.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{ItemId, ListingId, TradeId, UserId};
use config::TradingConfig;
use inventory::{InventoryError, InventoryStore, ItemStatus};
use listing::{Listing, ListingQuery, ListingStatus, ListingStore};
use tracing::{info, warn};

use crate::clients::notify::{NotificationGateway, TradeEvent};
use crate::clients::users::UserDirectory;
use crate::error::{TradeError, TradeResult};
use crate::history::{HistoryQuery, HistoryStore, TradeRecord};
use crate::metrics;
use crate::store::TradeStore;
use crate::types::{LockOutcome, LockParty, TradeNegotiation, TradeStatus};

/// Trading engine - handles the full negotiation lifecycle.
pub struct TradingEngine {
    trades: Arc<dyn TradeStore>,
    history: Arc<dyn HistoryStore>,
    inventory: Arc<dyn InventoryStore>,
    listings: Arc<dyn ListingStore>,
    notifier: Arc<dyn NotificationGateway>,
    users: Arc<dyn UserDirectory>,
    config: TradingConfig,
}

impl TradingEngine {
    /// Create a new TradingEngine.
    pub fn new(
        trades: Arc<dyn TradeStore>,
        history: Arc<dyn HistoryStore>,
        inventory: Arc<dyn InventoryStore>,
        listings: Arc<dyn ListingStore>,
        notifier: Arc<dyn NotificationGateway>,
        users: Arc<dyn UserDirectory>,
        config: TradingConfig,
    ) -> Self {
        Self {
            trades,
            history,
            inventory,
            listings,
            notifier,
            users,
            config,
        }
    }

    fn lock_window(&self) -> Duration {
        Duration::seconds(self.config.lock_window_secs as i64)
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    /// Open an inventory item for trade.
    pub async fn open_listing(
        &self,
        item_id: ItemId,
        acting_user: UserId,
        is_free: bool,
    ) -> TradeResult<Listing> {
        let item = self
            .inventory
            .get(item_id)
            .await?
            .ok_or_else(|| TradeError::not_found(format!("item {item_id}")))?;

        if item.owner_id != acting_user {
            return Err(TradeError::forbidden("only the item's owner can list it"));
        }

        if item.status != ItemStatus::Available {
            return Err(TradeError::bad_state(format!(
                "item {item_id} is {} and cannot be listed",
                item.status
            )));
        }

        let listing = self
            .listings
            .open_for_trade(item_id, acting_user, is_free)
            .await
            .map_err(|err| match err {
                listing::ListingError::AlreadyListed(_) => {
                    TradeError::conflict(format!("item {item_id} is already listed"))
                }
                other => other.into(),
            })?;

        info!(listing = %listing.id, item = %item_id, owner = %acting_user, "Listing opened");
        Ok(listing)
    }

    /// Withdraw an active listing.
    pub async fn cancel_listing(
        &self,
        listing_id: ListingId,
        acting_user: UserId,
    ) -> TradeResult<Listing> {
        let listing = self.get_listing(listing_id).await?;

        if listing.owner_id != acting_user {
            return Err(TradeError::forbidden("only the owner can cancel a listing"));
        }

        let cancelled = self
            .listings
            .mark_cancelled(listing_id)
            .await
            .map_err(|err| match err {
                listing::ListingError::BadTransition { from, .. } => TradeError::bad_state(
                    format!("listing {listing_id} is {from} and cannot be cancelled"),
                ),
                other => other.into(),
            })?;

        info!(listing = %listing_id, "Listing cancelled");
        Ok(cancelled)
    }

    /// Get a listing by id.
    pub async fn get_listing(&self, listing_id: ListingId) -> TradeResult<Listing> {
        self.listings
            .get(listing_id)
            .await?
            .ok_or_else(|| TradeError::not_found(format!("listing {listing_id}")))
    }

    /// List listings matching the query.
    pub async fn list_listings(&self, query: &ListingQuery) -> TradeResult<Vec<Listing>> {
        Ok(self.listings.list(query).await?)
    }

    // ------------------------------------------------------------------
    // Negotiation lifecycle
    // ------------------------------------------------------------------

    /// Create a new trade negotiation against a listing.
    ///
    /// No holds are taken here: items stay free while competing offers pile
    /// up, and only acceptance claims them.
    pub async fn create_negotiation(
        &self,
        listing_id: ListingId,
        requester_id: UserId,
        offered_items: Vec<ItemId>,
    ) -> TradeResult<TradeNegotiation> {
        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or_else(|| TradeError::not_found(format!("listing {listing_id}")))?;

        if listing.status != ListingStatus::Active {
            return Err(TradeError::bad_state(format!(
                "listing {listing_id} is {}",
                listing.status
            )));
        }

        let listed_item = self
            .inventory
            .get(listing.item_id)
            .await?
            .ok_or_else(|| TradeError::Storage(format!("listing {listing_id} references missing item")))?;

        if listed_item.owner_id == requester_id {
            return Err(TradeError::bad_request("cannot trade with yourself"));
        }

        if listed_item.status == ItemStatus::OnHold {
            let now = Utc::now();
            if listed_item.is_stale(now) {
                // The sweeper should have released this already.
                return Err(TradeError::bad_state(
                    "listed item carries a stale hold pending cleanup",
                ));
            }
            return Err(TradeError::bad_request("listed item is on hold"));
        }

        let mut seen = std::collections::HashSet::new();
        for item_id in &offered_items {
            if !seen.insert(*item_id) {
                return Err(TradeError::bad_request(format!(
                    "item {item_id} is offered more than once"
                )));
            }
        }

        if offered_items.is_empty() && !listing.is_free {
            return Err(TradeError::bad_request(
                "this listing requires at least one offered item",
            ));
        }

        if offered_items.len() > self.config.max_offered_items {
            return Err(TradeError::bad_request(format!(
                "at most {} items can be offered",
                self.config.max_offered_items
            )));
        }

        let items = self.inventory.get_many(&offered_items).await?;
        if items.len() != offered_items.len() {
            return Err(TradeError::bad_request("some offered items do not exist"));
        }
        for item in &items {
            if item.owner_id != requester_id {
                return Err(TradeError::bad_request(format!(
                    "item {} is not owned by the requester",
                    item.id
                )));
            }
            if item.status != ItemStatus::Available {
                return Err(TradeError::bad_request(format!(
                    "item {} is not available",
                    item.id
                )));
            }
        }

        // The store enforces the one-Pending-per-(listing, requester)
        // invariant atomically; this just orders the error ahead of insert
        // for the common case.
        if self
            .trades
            .find_pending(listing_id, requester_id)
            .await?
            .is_some()
        {
            return Err(TradeError::conflict(
                "a pending negotiation already exists for this listing",
            ));
        }

        let trade = self
            .trades
            .create(TradeNegotiation::new(listing_id, requester_id, offered_items))
            .await?;

        info!(
            trade = %trade.id,
            listing = %listing_id,
            requester = %requester_id,
            offered = trade.offered_items.len(),
            "Negotiation created"
        );
        metrics::record_negotiation_created();

        self.notify_best_effort(
            listing.owner_id,
            TradeEvent::NegotiationCreated { trade_id: trade.id },
        )
        .await;

        Ok(trade)
    }

    /// Owner response: accept or reject a pending negotiation.
    ///
    /// Accepting claims the listed item and every offered item, all or
    /// nothing. A partial failure rolls the holds taken in this attempt back
    /// and leaves the trade Pending so the owner can retry.
    pub async fn respond(
        &self,
        trade_id: TradeId,
        accept: bool,
        acting_user: UserId,
    ) -> TradeResult<TradeNegotiation> {
        let trade = self.get_negotiation(trade_id).await?;

        if trade.status != TradeStatus::Pending {
            return Err(TradeError::bad_state(format!(
                "trade {trade_id} is {} and cannot be responded to",
                trade.status
            )));
        }

        let listing = self
            .listings
            .get(trade.listing_id)
            .await?
            .ok_or_else(|| TradeError::Storage(format!("trade {trade_id} references missing listing")))?;

        if listing.owner_id != acting_user {
            return Err(TradeError::forbidden(
                "only the listing owner can respond to a negotiation",
            ));
        }

        if accept {
            self.accept(trade, listing).await
        } else {
            self.reject(trade).await
        }
    }

    async fn reject(&self, trade: TradeNegotiation) -> TradeResult<TradeNegotiation> {
        let rejected = self
            .trades
            .reject_if_pending(trade.id)
            .await?
            .ok_or_else(|| TradeError::conflict("trade was responded to concurrently"))?;

        // Nothing was held for a pending trade, so no ledger changes.
        self.history
            .append(TradeRecord::from_negotiation(&rejected))
            .await?;

        info!(trade = %rejected.id, "Negotiation rejected");
        metrics::record_negotiation_rejected();

        self.notify_best_effort(
            rejected.requester_id,
            TradeEvent::NegotiationRejected { trade_id: rejected.id },
        )
        .await;

        Ok(rejected)
    }

    async fn accept(
        &self,
        trade: TradeNegotiation,
        listing: Listing,
    ) -> TradeResult<TradeNegotiation> {
        if listing.status != ListingStatus::Active {
            return Err(TradeError::bad_state(format!(
                "listing {} is {} and cannot accept a trade",
                listing.id, listing.status
            )));
        }

        let expires_at = Utc::now() + self.lock_window();
        let mut held: Vec<(ItemId, UserId)> = Vec::new();

        // Owner side first, then every offered item. All or nothing.
        let mut to_hold: Vec<(ItemId, UserId)> =
            vec![(listing.item_id, listing.owner_id)];
        to_hold.extend(trade.offered_items.iter().map(|id| (*id, trade.requester_id)));

        for (item_id, owner_id) in to_hold {
            match self
                .inventory
                .try_hold(item_id, owner_id, trade.id, expires_at)
                .await
            {
                Ok(_) => held.push((item_id, owner_id)),
                Err(err) => {
                    self.rollback_holds(&held, trade.id).await;
                    metrics::record_hold_conflict();
                    return Err(match err {
                        InventoryError::Conflict { item } => TradeError::conflict(format!(
                            "item {item} was claimed by another trade"
                        )),
                        InventoryError::NotOwned { item, .. } => TradeError::conflict(format!(
                            "item {item} changed ownership since the offer"
                        )),
                        InventoryError::NotAvailable(item) => {
                            TradeError::conflict(format!("item {item} is no longer available"))
                        }
                        InventoryError::NotFound(item) => {
                            TradeError::conflict(format!("item {item} no longer exists"))
                        }
                        other => other.into(),
                    });
                }
            }
        }

        let accepted = match self.trades.accept_if_pending(trade.id, expires_at).await? {
            Some(accepted) => accepted,
            None => {
                // The trade left Pending while we were taking holds.
                self.rollback_holds(&held, trade.id).await;
                return Err(TradeError::conflict("trade was responded to concurrently"));
            }
        };

        self.listings.mark_on_hold(listing.id, trade.id).await?;

        info!(
            trade = %accepted.id,
            listing = %listing.id,
            expires_at = %expires_at,
            "Negotiation accepted; lock window open"
        );
        metrics::record_negotiation_accepted();

        self.notify_best_effort(
            accepted.requester_id,
            TradeEvent::NegotiationAccepted { trade_id: accepted.id },
        )
        .await;

        Ok(accepted)
    }

    /// Dual-commit step: the acting party confirms the accepted trade.
    ///
    /// The second confirmation finalizes: items swap owners, the listing
    /// closes, and a history record is written.
    pub async fn lock(&self, trade_id: TradeId, acting_user: UserId) -> TradeResult<TradeNegotiation> {
        let trade = self.get_negotiation(trade_id).await?;

        if trade.status != TradeStatus::Accepted {
            return Err(TradeError::bad_state(format!(
                "trade {trade_id} is {} and cannot be locked",
                trade.status
            )));
        }

        let listing = self
            .listings
            .get(trade.listing_id)
            .await?
            .ok_or_else(|| TradeError::Storage(format!("trade {trade_id} references missing listing")))?;

        let party = Self::party_of(&trade, &listing, acting_user).ok_or_else(|| {
            TradeError::forbidden("only the listing owner or the requester can lock this trade")
        })?;

        match self.trades.set_lock_flag(trade_id, party).await? {
            LockOutcome::NotAccepted(status) => Err(TradeError::bad_state(format!(
                "trade {trade_id} is {status} and cannot be locked"
            ))),
            // Reported, not swallowed, so the client stops retrying.
            LockOutcome::AlreadyLocked => Err(TradeError::conflict(format!(
                "{party} already locked trade {trade_id}"
            ))),
            LockOutcome::Locked(updated) => {
                info!(trade = %trade_id, %party, "Party locked; waiting on counterpart");

                let counterpart = match party {
                    LockParty::Owner => updated.requester_id,
                    LockParty::Requester => listing.owner_id,
                };
                self.notify_best_effort(
                    counterpart,
                    TradeEvent::CounterpartLocked { trade_id },
                )
                .await;

                Ok(updated)
            }
            LockOutcome::ReadyToComplete(updated) => self.finalize(updated, listing).await,
        }
    }

    /// Transfer every held item and close the trade. Only ever reached by
    /// the single caller whose lock made both flags true.
    async fn finalize(
        &self,
        trade: TradeNegotiation,
        listing: Listing,
    ) -> TradeResult<TradeNegotiation> {
        // Owner's listed item goes to the requester...
        self.inventory
            .transfer(listing.item_id, listing.owner_id, trade.requester_id, trade.id)
            .await?;

        // ...and every offered item goes to the owner.
        for item_id in &trade.offered_items {
            self.inventory
                .transfer(*item_id, trade.requester_id, listing.owner_id, trade.id)
                .await?;
        }

        self.listings.mark_completed(listing.id).await?;

        let completed = self
            .trades
            .complete_if_locked(trade.id)
            .await?
            .ok_or_else(|| {
                TradeError::Storage(format!(
                    "trade {} changed state during finalization",
                    trade.id
                ))
            })?;

        self.history
            .append(TradeRecord::from_negotiation(&completed))
            .await?;

        info!(
            trade = %completed.id,
            listing = %listing.id,
            items = completed.offered_items.len() + 1,
            "Trade completed; ownership transferred"
        );
        metrics::record_trade_completed();

        self.notify_best_effort(
            listing.owner_id,
            TradeEvent::TradeCompleted { trade_id: completed.id },
        )
        .await;
        self.notify_best_effort(
            completed.requester_id,
            TradeEvent::TradeCompleted { trade_id: completed.id },
        )
        .await;

        Ok(completed)
    }

    /// Withdraw a negotiation. Either party may cancel while the trade is
    /// Pending or Accepted; an accepted trade's holds are released.
    pub async fn cancel(
        &self,
        trade_id: TradeId,
        acting_user: UserId,
    ) -> TradeResult<TradeNegotiation> {
        let trade = self.get_negotiation(trade_id).await?;

        if trade.status.is_terminal() {
            return Err(TradeError::bad_state(format!(
                "trade {trade_id} is {} and cannot be cancelled",
                trade.status
            )));
        }

        let listing = self
            .listings
            .get(trade.listing_id)
            .await?
            .ok_or_else(|| TradeError::Storage(format!("trade {trade_id} references missing listing")))?;

        let party = Self::party_of(&trade, &listing, acting_user).ok_or_else(|| {
            TradeError::forbidden("only the listing owner or the requester can cancel this trade")
        })?;

        let (cancelled, previous) = self
            .trades
            .cancel_if_open(trade_id)
            .await?
            .ok_or_else(|| TradeError::conflict("trade changed state concurrently"))?;

        if previous == TradeStatus::Accepted {
            self.release_trade_holds(&cancelled, &listing).await;
            if let Err(err) = self.listings.mark_active(listing.id).await {
                warn!(listing = %listing.id, %err, "Failed to reactivate listing after cancel");
            }
        }

        self.history
            .append(TradeRecord::from_negotiation(&cancelled))
            .await?;

        info!(trade = %trade_id, %party, from = %previous, "Negotiation cancelled");
        metrics::record_trade_cancelled();

        let counterpart = match party {
            LockParty::Owner => cancelled.requester_id,
            LockParty::Requester => listing.owner_id,
        };
        self.notify_best_effort(counterpart, TradeEvent::TradeCancelled { trade_id })
            .await;

        Ok(cancelled)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Get a negotiation by id.
    pub async fn get_negotiation(&self, trade_id: TradeId) -> TradeResult<TradeNegotiation> {
        self.trades
            .get(trade_id)
            .await?
            .ok_or_else(|| TradeError::not_found(format!("trade {trade_id}")))
    }

    /// All negotiations targeting a listing, newest first.
    pub async fn list_for_listing(
        &self,
        listing_id: ListingId,
    ) -> TradeResult<Vec<TradeNegotiation>> {
        self.trades.list_for_listing(listing_id).await
    }

    /// All negotiations created by a requester, newest first.
    pub async fn list_for_requester(
        &self,
        requester_id: UserId,
    ) -> TradeResult<Vec<TradeNegotiation>> {
        self.trades.list_for_requester(requester_id).await
    }

    /// Query the trade history ledger.
    pub async fn trade_history(&self, query: &HistoryQuery) -> TradeResult<Vec<TradeRecord>> {
        self.history.query(query).await
    }

    /// Count history records matching the query.
    pub async fn trade_history_count(&self, query: &HistoryQuery) -> TradeResult<usize> {
        self.history.count(query).await
    }

    // ------------------------------------------------------------------
    // Sweep support
    // ------------------------------------------------------------------

    /// Expire every Accepted trade whose lock window lapsed without both
    /// parties locking, as of `now`. Returns the number of trades expired.
    ///
    /// Safe to run concurrently with foreground `lock` calls: the
    /// conditional transition skips any trade that completed in the
    /// meantime. One bad trade does not abort the sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> TradeResult<usize> {
        let candidates = self.trades.list_expired_candidates(now).await?;
        let mut expired = 0;

        for trade in candidates {
            match self.expire_one(&trade, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(trade = %trade.id, %err, "Failed to expire trade; continuing sweep");
                }
            }
        }

        Ok(expired)
    }

    async fn expire_one(&self, trade: &TradeNegotiation, now: DateTime<Utc>) -> TradeResult<bool> {
        // Same atomic guard the foreground uses: a trade that completed (or
        // got cancelled) since the scan is skipped, never overwritten.
        let expired = match self.trades.expire_if_lapsed(trade.id, now).await? {
            Some(expired) => expired,
            None => return Ok(false),
        };

        let listing = self
            .listings
            .get(expired.listing_id)
            .await?
            .ok_or_else(|| TradeError::Storage(format!("trade {} references missing listing", expired.id)))?;

        self.release_trade_holds(&expired, &listing).await;

        if let Err(err) = self.listings.mark_active(listing.id).await {
            warn!(listing = %listing.id, %err, "Failed to reactivate listing after expiry");
        }

        self.history
            .append(TradeRecord::from_negotiation(&expired))
            .await?;

        info!(trade = %expired.id, listing = %listing.id, "Trade expired; holds released");
        metrics::record_trade_expired();

        self.notify_best_effort(listing.owner_id, TradeEvent::TradeExpired { trade_id: expired.id })
            .await;
        self.notify_best_effort(
            expired.requester_id,
            TradeEvent::TradeExpired { trade_id: expired.id },
        )
        .await;

        Ok(true)
    }

    /// Release holds whose window lapsed but whose trade is already
    /// terminal or gone — orphans left by an interrupted release. Live
    /// Accepted trades are left alone; `sweep_expired` owns those.
    pub async fn release_stale_holds(&self, now: DateTime<Utc>) -> TradeResult<usize> {
        let stale = self.inventory.list_stale_holds(now).await?;
        let mut released = 0;

        for item in stale {
            let Some(trade_id) = item.locked_by_trade else {
                continue;
            };

            if let Some(trade) = self.trades.get(trade_id).await? {
                if !trade.status.is_terminal() {
                    continue;
                }
            }

            match self.inventory.release(item.id, trade_id).await {
                Ok(true) => {
                    released += 1;
                    metrics::record_stale_hold_released();
                    self.notify_best_effort(
                        item.owner_id,
                        TradeEvent::ItemReleased { item_id: item.id },
                    )
                    .await;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(item = %item.id, %err, "Failed to release stale hold; continuing");
                }
            }
        }

        Ok(released)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn party_of(
        trade: &TradeNegotiation,
        listing: &Listing,
        acting_user: UserId,
    ) -> Option<LockParty> {
        if acting_user == listing.owner_id {
            Some(LockParty::Owner)
        } else if acting_user == trade.requester_id {
            Some(LockParty::Requester)
        } else {
            None
        }
    }

    /// Undo holds taken earlier in a failed accept attempt.
    async fn rollback_holds(&self, held: &[(ItemId, UserId)], trade_id: TradeId) {
        for (item_id, _) in held {
            if let Err(err) = self.inventory.release(*item_id, trade_id).await {
                warn!(item = %item_id, trade = %trade_id, %err, "Failed to roll back hold");
            }
        }
    }

    /// Release every hold an accepted trade took: the listed item plus all
    /// offered items. Release is idempotent, so double releases are safe.
    async fn release_trade_holds(&self, trade: &TradeNegotiation, listing: &Listing) {
        let mut item_ids = vec![listing.item_id];
        item_ids.extend_from_slice(&trade.offered_items);

        for item_id in item_ids {
            if let Err(err) = self.inventory.release(item_id, trade.id).await {
                warn!(item = %item_id, trade = %trade.id, %err, "Failed to release hold");
            }
        }
    }

    /// Notifications never affect trade state: failures are logged and
    /// swallowed.
    async fn notify_best_effort(&self, user_id: UserId, event: TradeEvent) {
        if let Some(profile) = self.users.get_user(user_id).await {
            tracing::debug!(user = %profile.display_name, ?event, "Notifying user");
        }

        if let Err(err) = self.notifier.notify(user_id, event).await {
            warn!(user = %user_id, error = %err, "Notification failed; trade state unaffected");
        }
    }
}
