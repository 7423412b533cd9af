//! Inventory error types

use common::{ItemId, TradeId, UserId};
use thiserror::Error;

/// Errors that can occur in the inventory ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Item does not exist
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// Item already exists (issuance with a duplicate id)
    #[error("Item already exists: {0}")]
    AlreadyExists(ItemId),

    /// Caller-asserted owner does not match current ownership
    #[error("Item {item} is not owned by user {user}")]
    NotOwned { item: ItemId, user: UserId },

    /// Item is not in a state that allows the operation
    #[error("Item not available: {0}")]
    NotAvailable(ItemId),

    /// Another trade currently holds the item
    #[error("Item {item} is already held by another trade")]
    Conflict { item: ItemId },

    /// Operation requires the item to be held by the given trade
    #[error("Item {item} is not held by trade {trade}")]
    NotHeld { item: ItemId, trade: TradeId },
}

/// Result type for inventory operations
pub type InventoryResult<T> = std::result::Result<T, InventoryError>;
