//! API routes for the trading service

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::*;
use crate::api::TradingApiState;

/// Create the trading router
pub fn create_router(state: TradingApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/listings", post(open_listing).get(list_listings))
        .route(
            "/api/v1/listings/:listing_id",
            get(get_listing).delete(cancel_listing),
        )
        .route(
            "/api/v1/listings/:listing_id/negotiations",
            post(create_negotiation).get(list_negotiations_for_listing),
        )
        .route("/api/v1/negotiations", get(list_my_negotiations))
        .route("/api/v1/negotiations/:trade_id", get(get_negotiation))
        .route(
            "/api/v1/negotiations/:trade_id/respond",
            post(respond_negotiation),
        )
        .route("/api/v1/negotiations/:trade_id/lock", post(lock_negotiation))
        .route(
            "/api/v1/negotiations/:trade_id/cancel",
            post(cancel_negotiation),
        )
        .route("/api/v1/history", get(trade_history))
        .with_state(state)
}
