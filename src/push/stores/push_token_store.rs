//! Push Token Store interface and in-memory implementation
//!
//! This module defines the interface for registering, listing and pruning
//! device push tokens.

use crate::{PushError, PushToken, TokenRegistration};
use async_trait::async_trait;
use std::collections::HashSet;

/// Push Token Store interface
#[async_trait]
pub trait PushTokenStore: Send + Sync {
    /// Registers a device token for a user
    ///
    /// The token string is the key: registering a known token moves it to
    /// `user_id` and overwrites its platform.
    async fn register(
        &self,
        user_id: Option<&str>,
        token: &str,
        platform: Option<&str>,
    ) -> Result<TokenRegistration, PushError>;

    /// Lists every registered token
    async fn list(&self) -> Result<Vec<PushToken>, PushError>;

    /// Deletes every row whose token appears in `tokens`, returning the number removed
    async fn delete_tokens(&self, tokens: &[String]) -> Result<u64, PushError>;
}

/// In-memory implementation of PushTokenStore
pub struct InMemoryPushTokenStore {
    tokens: std::sync::Arc<tokio::sync::RwLock<Vec<PushToken>>>,
}

impl InMemoryPushTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: std::sync::Arc::new(tokio::sync::RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryPushTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTokenStore for InMemoryPushTokenStore {
    async fn register(
        &self,
        user_id: Option<&str>,
        token: &str,
        platform: Option<&str>,
    ) -> Result<TokenRegistration, PushError> {
        let mut tokens = self.tokens.write().await;

        if let Some(existing) = tokens.iter_mut().find(|t| t.token == token) {
            existing.user_id = user_id.map(str::to_string);
            existing.platform = platform.map(str::to_string);
            return Ok(TokenRegistration::Updated);
        }

        tokens.push(PushToken::new(
            user_id.map(str::to_string),
            token.to_string(),
            platform.map(str::to_string),
        ));
        Ok(TokenRegistration::Created)
    }

    async fn list(&self) -> Result<Vec<PushToken>, PushError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.clone())
    }

    async fn delete_tokens(&self, tokens: &[String]) -> Result<u64, PushError> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let doomed: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let mut stored = self.tokens.write().await;
        let before = stored.len();
        stored.retain(|t| !doomed.contains(t.token.as_str()));
        Ok((before - stored.len()) as u64)
    }
}
