//! Inventory ledger for SwapVault
//!
//! This crate owns the authoritative status of every tradable item and the
//! exclusive hold a trade takes on an item during its lock phase. All
//! availability decisions in the system funnel through [`InventoryStore::try_hold`],
//! which is the single point of mutual exclusion for an item: of any number
//! of concurrent callers racing for the same item, exactly one wins.

pub mod error;
pub mod store;
pub mod types;

pub use error::{InventoryError, InventoryResult};
pub use store::{InMemoryInventoryStore, InventoryStore};
pub use types::{InventoryItem, ItemStatus};
