//! External collaborator interfaces.
//!
//! The engine talks to the rest of the platform through narrow traits:
//! notifications are fire-and-forget, the user directory is read-only
//! display enrichment. Neither can affect trade state.

pub mod notify;
pub mod users;
