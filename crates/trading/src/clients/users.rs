//! User directory - trait and implementations
//!
//! Read-only lookup into the platform's account system. The engine uses it
//! for display enrichment only; authorization decisions compare raw ids.

use async_trait::async_trait;
use common::UserId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimal user projection the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
}

/// Client trait for the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user. `None` for unknown ids.
    async fn get_user(&self, user_id: UserId) -> Option<UserProfile>;
}

/// In-memory user directory for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a user and return its id.
    pub fn add_user(&self, display_name: impl Into<String>) -> UserId {
        let profile = UserProfile {
            id: UserId::new(),
            display_name: display_name.into(),
        };
        let id = profile.id;
        self.users.write().insert(id, profile);
        id
    }
}

impl Clone for InMemoryUserDirectory {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, user_id: UserId) -> Option<UserProfile> {
        self.users.read().get(&user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_get_user() {
        let directory = InMemoryUserDirectory::new();
        let id = directory.add_user("alice");

        let profile = directory.get_user(id).await.unwrap();
        assert_eq!(profile.display_name, "alice");

        assert!(directory.get_user(UserId::new()).await.is_none());
    }
}
