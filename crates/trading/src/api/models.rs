//! API models for the trading HTTP endpoints

use chrono::{DateTime, Utc};
use common::{ItemId, ListingId, TradeId, UserId};
use listing::{Listing, ListingStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{HistorySortBy, TradeRecord};
use crate::types::{TradeNegotiation, TradeStatus};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Request to open a listing
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenListingRequest {
    pub item_id: Uuid,
    #[serde(default)]
    pub is_free: bool,
}

/// Single listing in API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingResponse {
    pub listing_id: ListingId,
    pub item_id: ItemId,
    pub owner_id: UserId,
    pub status: ListingStatus,
    pub is_free: bool,
    pub listed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        Self {
            listing_id: listing.id,
            item_id: listing.item_id,
            owner_id: listing.owner_id,
            status: listing.status,
            is_free: listing.is_free,
            listed_at: listing.listed_at,
            updated_at: listing.updated_at,
        }
    }
}

/// Query parameters for listing lookups
#[derive(Debug, Deserialize)]
pub struct ListListingsParams {
    pub status: Option<String>,
    pub owner_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Request to create a negotiation against a listing
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNegotiationRequest {
    #[serde(default)]
    pub offered_items: Vec<Uuid>,
}

/// Owner response to a pending negotiation
#[derive(Debug, Serialize, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

/// Single negotiation in API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct NegotiationResponse {
    pub trade_id: TradeId,
    pub listing_id: ListingId,
    pub requester_id: UserId,
    pub offered_items: Vec<ItemId>,
    pub status: TradeStatus,
    pub owner_locked: bool,
    pub requester_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub lock_window_expires_at: Option<DateTime<Utc>>,
}

impl From<TradeNegotiation> for NegotiationResponse {
    fn from(trade: TradeNegotiation) -> Self {
        Self {
            trade_id: trade.id,
            listing_id: trade.listing_id,
            requester_id: trade.requester_id,
            offered_items: trade.offered_items,
            status: trade.status,
            owner_locked: trade.owner_locked,
            requester_locked: trade.requester_locked,
            locked_at: trade.locked_at,
            requested_at: trade.requested_at,
            responded_at: trade.responded_at,
            lock_window_expires_at: trade.lock_window_expires_at,
        }
    }
}

/// Query parameters for the trade history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub status: Option<String>,
    pub requester_id: Option<Uuid>,
    pub listing_id: Option<Uuid>,
    pub completed_from: Option<DateTime<Utc>>,
    pub completed_to: Option<DateTime<Utc>>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub desc: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Single history record in API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRecordResponse {
    pub trade_id: TradeId,
    pub listing_id: ListingId,
    pub requester_id: UserId,
    pub offered_items: Vec<ItemId>,
    pub final_status: TradeStatus,
    pub completed_at: DateTime<Utc>,
}

impl From<TradeRecord> for HistoryRecordResponse {
    fn from(record: TradeRecord) -> Self {
        Self {
            trade_id: record.trade_id,
            listing_id: record.listing_id,
            requester_id: record.requester_id,
            offered_items: record.offered_items,
            final_status: record.final_status,
            completed_at: record.completed_at,
        }
    }
}

/// Trade history page
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryRecordResponse>,
    pub total: usize,
}

/// Error payload
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Parse a trade status filter from a query string value.
pub fn parse_trade_status(s: &str) -> Option<TradeStatus> {
    match s.trim().to_lowercase().as_str() {
        "pending" => Some(TradeStatus::Pending),
        "accepted" => Some(TradeStatus::Accepted),
        "rejected" => Some(TradeStatus::Rejected),
        "cancelled" => Some(TradeStatus::Cancelled),
        "completed" => Some(TradeStatus::Completed),
        "expired" => Some(TradeStatus::Expired),
        _ => None,
    }
}

/// Parse a listing status filter from a query string value.
pub fn parse_listing_status(s: &str) -> Option<ListingStatus> {
    match s.trim().to_lowercase().as_str() {
        "active" => Some(ListingStatus::Active),
        "on_hold" => Some(ListingStatus::OnHold),
        "completed" => Some(ListingStatus::Completed),
        "cancelled" => Some(ListingStatus::Cancelled),
        _ => None,
    }
}

/// Parse a history sort key from a query string value.
pub fn parse_sort_by(s: &str) -> Option<HistorySortBy> {
    match s.trim().to_lowercase().as_str() {
        "completed_at" | "completedat" => Some(HistorySortBy::CompletedAt),
        "created_at" | "createdat" => Some(HistorySortBy::CreatedAt),
        _ => None,
    }
}
