//! Trading error taxonomy
//!
//! Five caller-distinguishable failure classes plus a storage passthrough.
//! The API layer maps each variant to a transport status; clients use the
//! class to decide whether to retry (Conflict) or stop (Forbidden).

use thiserror::Error;

/// Errors returned by the trading engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Entity exists but is in the wrong lifecycle phase
    #[error("Bad state: {0}")]
    BadState(String),

    /// Acting user is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A concurrent mutation won the race; refresh and retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Semantic validation failure in the request itself
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Underlying store failed or an internal invariant broke
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TradeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_state(msg: impl Into<String>) -> Self {
        Self::BadState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

// Ledger/registry failures that escape the engine's explicit handling are
// invariant violations, not caller mistakes.
impl From<inventory::InventoryError> for TradeError {
    fn from(err: inventory::InventoryError) -> Self {
        TradeError::Storage(err.to_string())
    }
}

impl From<listing::ListingError> for TradeError {
    fn from(err: listing::ListingError) -> Self {
        TradeError::Storage(err.to_string())
    }
}

/// Result type for trading operations
pub type TradeResult<T> = std::result::Result<T, TradeError>;
