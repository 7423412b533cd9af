//! Listing error types

use crate::types::ListingStatus;
use common::{ItemId, ListingId};
use thiserror::Error;

/// Errors that can occur in the listing registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// Listing does not exist
    #[error("Listing not found: {0}")]
    NotFound(ListingId),

    /// The item already has a live listing
    #[error("Item {0} is already listed")]
    AlreadyListed(ItemId),

    /// Transition not allowed from the listing's current status
    #[error("Listing {listing} cannot move from {from} to {to}")]
    BadTransition {
        listing: ListingId,
        from: ListingStatus,
        to: ListingStatus,
    },
}

/// Result type for listing operations
pub type ListingResult<T> = std::result::Result<T, ListingError>;
