//! HTTP API for the trading engine (feature `api`).

pub mod handlers;
pub mod models;
pub mod routes;

use crate::engine::TradingEngine;
use std::sync::Arc;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct TradingApiState {
    pub engine: Arc<TradingEngine>,
}

pub use routes::create_router;
