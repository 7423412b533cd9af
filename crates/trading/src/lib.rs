//! Trade negotiation and escrow-lock engine for SwapVault
//!
//! This crate implements the peer-to-peer trading lifecycle: a requester
//! offers items against a listing, the listing owner responds, and an
//! accepted trade enters a bounded dual-lock window in which both parties
//! must independently confirm before ownership transfers.
//!
//! # Guarantees
//!
//! - An inventory item is never promised to two trades at once: every claim
//!   goes through the inventory ledger's atomic `try_hold`.
//! - A trade finalizes exactly once, and only when both parties locked
//!   while the trade was still Accepted.
//! - Rejection, cancellation, and expiry all release every hold the trade
//!   took, so a partial failure never strands an item.
//!
//! # Feature Flags
//!
//! - `api` - Enable the HTTP API (axum)

pub mod clients;
pub mod engine;
pub mod error;
pub mod history;
mod metrics;
pub mod store;
pub mod sweeper;
pub mod types;

#[cfg(feature = "api")]
pub mod api;

// Re-export commonly used types
pub use engine::TradingEngine;
pub use error::{TradeError, TradeResult};
pub use history::{HistoryQuery, HistorySortBy, HistoryStore, InMemoryHistoryStore, TradeRecord};
pub use store::{InMemoryTradeStore, TradeStore};
pub use sweeper::ExpirySweeper;
pub use types::{LockOutcome, LockParty, TradeNegotiation, TradeStatus};

// Client exports
pub use clients::notify::{NoopNotifier, NotificationGateway, RecordingNotifier, TradeEvent};
pub use clients::users::{InMemoryUserDirectory, UserDirectory, UserProfile};
