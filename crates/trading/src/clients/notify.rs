//! Notification gateway - trait and implementations
//!
//! Notifications are emitted after a state transition commits and are
//! fire-and-forget: a failing gateway is logged by the engine and never
//! rolls a trade back.

use async_trait::async_trait;
use common::{ItemId, TradeId, UserId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events pushed to users as trade state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeEvent {
    /// Someone offered on your listing
    NegotiationCreated { trade_id: TradeId },
    /// Your offer was accepted; the lock window is open
    NegotiationAccepted { trade_id: TradeId },
    /// Your offer was declined
    NegotiationRejected { trade_id: TradeId },
    /// The counterpart confirmed; waiting on you
    CounterpartLocked { trade_id: TradeId },
    /// Both parties confirmed; items changed hands
    TradeCompleted { trade_id: TradeId },
    /// The lock window lapsed; holds were released
    TradeExpired { trade_id: TradeId },
    /// The negotiation was withdrawn
    TradeCancelled { trade_id: TradeId },
    /// A lapsed hold on your item was cleaned up
    ItemReleased { item_id: ItemId },
}

/// Client trait for the realtime notification gateway.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Push an event to a user. Errors are surfaced to the caller only so
    /// it can log them; they must not influence trade state.
    async fn notify(&self, user_id: UserId, event: TradeEvent) -> Result<(), String>;
}

/// Gateway that drops every event. Default for deployments without a
/// realtime channel.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NoopNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationGateway for NoopNotifier {
    async fn notify(&self, _user_id: UserId, _event: TradeEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Gateway that records every event in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<(UserId, TradeEvent)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `notify` call fail, to exercise the engine's
    /// swallow-and-log path.
    pub fn failing() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<(UserId, TradeEvent)> {
        self.events.lock().clone()
    }

    /// Events sent to one user.
    pub fn events_for(&self, user_id: UserId) -> Vec<TradeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl Clone for RecordingNotifier {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            fail: self.fail,
        }
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn notify(&self, user_id: UserId, event: TradeEvent) -> Result<(), String> {
        if self.fail {
            return Err("gateway unavailable".to_string());
        }
        self.events.lock().push((user_id, event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier_collects_events() {
        let notifier = RecordingNotifier::new();
        let user = UserId::new();
        let trade = TradeId::new();

        notifier
            .notify(user, TradeEvent::NegotiationCreated { trade_id: trade })
            .await
            .unwrap();
        notifier
            .notify(UserId::new(), TradeEvent::TradeCompleted { trade_id: trade })
            .await
            .unwrap();

        assert_eq!(notifier.events().len(), 2);
        assert_eq!(notifier.events_for(user).len(), 1);
    }

    #[tokio::test]
    async fn test_failing_notifier_errors() {
        let notifier = RecordingNotifier::failing();
        let result = notifier
            .notify(UserId::new(), TradeEvent::ItemReleased { item_id: ItemId::new() })
            .await;
        assert!(result.is_err());
    }
}
