//! Bearer-token identity store
//!
//! Maps session tokens issued by the sign-in surface to members. Used by
//! the server in development and by tests.

use async_trait::async_trait;
use magnolia_checkout::{Identity, IdentityProvider};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory token → identity map
#[derive(Default)]
pub struct MemoryIdentityStore {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a member
    pub async fn insert(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.write().await.insert(token.into(), identity);
    }

    /// Revoke a token (sign-out)
    pub async fn revoke(&self, token: &str) -> Option<Identity> {
        self.tokens.write().await.remove(token)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityStore {
    async fn current_user(&self, token: Option<&str>) -> magnolia_checkout::Result<Option<Identity>> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        Ok(self.tokens.read().await.get(token).cloned())
    }
}
