//! API handlers for the trading HTTP endpoints
//!
//! The acting user arrives in the `X-User-Id` header; authentication itself
//! lives in front of this service. Engine errors map one-to-one onto
//! transport statuses so clients can branch on the class.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use common::{ItemId, ListingId, TradeId, UserId};
use listing::ListingQuery;
use uuid::Uuid;

use crate::api::models::*;
use crate::api::TradingApiState;
use crate::error::TradeError;
use crate::history::HistoryQuery;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine error onto a transport status.
fn error_response(err: TradeError) -> ApiError {
    let (status, code) = match &err {
        TradeError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        TradeError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        TradeError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        TradeError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        TradeError::BadState(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_STATE"),
        TradeError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string())))
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("BAD_REQUEST", message)),
    )
}

/// Pull the acting user out of the `X-User-Id` header.
fn acting_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get("x-user-id")
        .ok_or_else(|| bad_request("missing X-User-Id header"))?;
    let text = value
        .to_str()
        .map_err(|_| bad_request("invalid X-User-Id header"))?;
    let uuid = Uuid::parse_str(text).map_err(|_| bad_request("invalid X-User-Id header"))?;
    Ok(UserId::from_uuid(uuid))
}

fn parse_id<T>(raw: &str, wrap: fn(Uuid) -> T, what: &str) -> Result<T, ApiError> {
    Uuid::parse_str(raw)
        .map(wrap)
        .map_err(|_| bad_request(&format!("invalid {what} id")))
}

/// Health check handler
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "trading".to_string(),
    })
}

/// Open a listing
pub async fn open_listing(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Json(req): Json<OpenListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let item_id = ItemId::from_uuid(req.item_id);

    state
        .engine
        .open_listing(item_id, user, req.is_free)
        .await
        .map(|listing| Json(listing.into()))
        .map_err(error_response)
}

/// List listings
pub async fn list_listings(
    State(state): State<TradingApiState>,
    Query(params): Query<ListListingsParams>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let mut query = ListingQuery::new();

    if let Some(ref status) = params.status {
        query.status =
            Some(parse_listing_status(status).ok_or_else(|| bad_request("unknown status"))?);
    }
    query.owner_id = params.owner_id.map(UserId::from_uuid);
    query.limit = Some(params.limit.unwrap_or(50).min(500));
    query.offset = params.offset;

    state
        .engine
        .list_listings(&query)
        .await
        .map(|listings| Json(listings.into_iter().map(Into::into).collect()))
        .map_err(error_response)
}

/// Get a listing
pub async fn get_listing(
    State(state): State<TradingApiState>,
    Path(listing_id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing_id = parse_id(&listing_id, ListingId::from_uuid, "listing")?;

    state
        .engine
        .get_listing(listing_id)
        .await
        .map(|listing| Json(listing.into()))
        .map_err(error_response)
}

/// Cancel a listing
pub async fn cancel_listing(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let listing_id = parse_id(&listing_id, ListingId::from_uuid, "listing")?;

    state
        .engine
        .cancel_listing(listing_id, user)
        .await
        .map(|listing| Json(listing.into()))
        .map_err(error_response)
}

/// Create a negotiation against a listing
pub async fn create_negotiation(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
    Json(req): Json<CreateNegotiationRequest>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let listing_id = parse_id(&listing_id, ListingId::from_uuid, "listing")?;
    let offered = req.offered_items.into_iter().map(ItemId::from_uuid).collect();

    state
        .engine
        .create_negotiation(listing_id, user, offered)
        .await
        .map(|trade| Json(trade.into()))
        .map_err(error_response)
}

/// List negotiations targeting a listing
pub async fn list_negotiations_for_listing(
    State(state): State<TradingApiState>,
    Path(listing_id): Path<String>,
) -> Result<Json<Vec<NegotiationResponse>>, ApiError> {
    let listing_id = parse_id(&listing_id, ListingId::from_uuid, "listing")?;

    state
        .engine
        .list_for_listing(listing_id)
        .await
        .map(|trades| Json(trades.into_iter().map(Into::into).collect()))
        .map_err(error_response)
}

/// List the acting user's own negotiations
pub async fn list_my_negotiations(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<NegotiationResponse>>, ApiError> {
    let user = acting_user(&headers)?;

    state
        .engine
        .list_for_requester(user)
        .await
        .map(|trades| Json(trades.into_iter().map(Into::into).collect()))
        .map_err(error_response)
}

/// Get a negotiation
pub async fn get_negotiation(
    State(state): State<TradingApiState>,
    Path(trade_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let trade_id = parse_id(&trade_id, TradeId::from_uuid, "trade")?;

    state
        .engine
        .get_negotiation(trade_id)
        .await
        .map(|trade| Json(trade.into()))
        .map_err(error_response)
}

/// Accept or reject a negotiation
pub async fn respond_negotiation(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Path(trade_id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let trade_id = parse_id(&trade_id, TradeId::from_uuid, "trade")?;

    state
        .engine
        .respond(trade_id, req.accept, user)
        .await
        .map(|trade| Json(trade.into()))
        .map_err(error_response)
}

/// Lock (confirm) a negotiation
pub async fn lock_negotiation(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Path(trade_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let trade_id = parse_id(&trade_id, TradeId::from_uuid, "trade")?;

    state
        .engine
        .lock(trade_id, user)
        .await
        .map(|trade| Json(trade.into()))
        .map_err(error_response)
}

/// Cancel a negotiation
pub async fn cancel_negotiation(
    State(state): State<TradingApiState>,
    headers: HeaderMap,
    Path(trade_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let user = acting_user(&headers)?;
    let trade_id = parse_id(&trade_id, TradeId::from_uuid, "trade")?;

    state
        .engine
        .cancel(trade_id, user)
        .await
        .map(|trade| Json(trade.into()))
        .map_err(error_response)
}

/// Query the trade history ledger
pub async fn trade_history(
    State(state): State<TradingApiState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let mut query = HistoryQuery::new();

    if let Some(ref status) = params.status {
        query.final_status =
            Some(parse_trade_status(status).ok_or_else(|| bad_request("unknown status"))?);
    }
    query.requester_id = params.requester_id.map(UserId::from_uuid);
    query.listing_id = params.listing_id.map(ListingId::from_uuid);
    query.completed_from = params.completed_from;
    query.completed_to = params.completed_to;
    if let Some(ref sort_by) = params.sort_by {
        query.sort_by = parse_sort_by(sort_by).ok_or_else(|| bad_request("unknown sort key"))?;
    }
    if let Some(desc) = params.desc {
        query.desc = desc;
    }
    query.limit = Some(params.limit.unwrap_or(50).min(500));
    query.offset = params.offset;

    let total = state
        .engine
        .trade_history_count(&query)
        .await
        .map_err(error_response)?;
    let records = state
        .engine
        .trade_history(&query)
        .await
        .map_err(error_response)?;

    Ok(Json(HistoryResponse {
        records: records.into_iter().map(Into::into).collect(),
        total,
    }))
}
