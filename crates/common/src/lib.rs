//! Shared types for SwapVault
//!
//! This crate provides the identifier newtypes used across the trading
//! engine crates. Entity references between crates go through one of these
//! ids rather than a navigation property, so each crate can be compiled and
//! tested on its own.

pub mod types;

pub use types::{ItemId, ListingId, TradeId, UserId};
