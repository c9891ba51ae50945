//! Notification dispatcher
//!
//! Fans one notification out to every registered token, prunes the tokens
//! the providers reject and records the send in the notification history.
//! The history row is written after all send attempts, exactly once per
//! dispatch, whatever the per-token results were.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::push::providers::PushProvider;
use crate::push::stores::{NotificationStore, PushTokenStore};
use crate::{
    DeliveryOutcome, DispatchSummary, NotificationRecord, OutgoingNotification, PushError, PushMessage,
    TokenScheme,
};

pub struct NotificationDispatcher {
    token_store: Arc<dyn PushTokenStore>,
    notification_store: Arc<dyn NotificationStore>,
    providers: HashMap<TokenScheme, Arc<dyn PushProvider>>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with no providers; every token fails until one is added
    pub fn new(
        token_store: Arc<dyn PushTokenStore>,
        notification_store: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            token_store,
            notification_store,
            providers: HashMap::new(),
        }
    }

    /// Registers the provider for its token scheme, replacing any previous one
    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.providers.insert(provider.scheme(), provider);
        self
    }

    pub fn has_provider(&self, scheme: TokenScheme) -> bool {
        self.providers.contains_key(&scheme)
    }

    /// Sends `notification` to every registered device
    pub async fn dispatch(&self, notification: OutgoingNotification) -> Result<DispatchSummary, PushError> {
        let tokens = match self.token_store.list().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("Failed to list push tokens, recording notification without sending: {}", e);
                Vec::new()
            }
        };
        let total = tokens.len();

        let mut partitions: HashMap<TokenScheme, Vec<String>> = HashMap::new();
        for token in tokens {
            partitions.entry(token.scheme()).or_default().push(token.token);
        }

        let message = notification.message();
        let deliveries = partitions
            .into_iter()
            .map(|(scheme, tokens)| self.deliver_partition(scheme, tokens, &message));
        let outcomes: Vec<DeliveryOutcome> = join_all(deliveries).await.into_iter().flatten().collect();

        let sent = outcomes.iter().filter(|o| o.is_delivered()).count();
        let failed = outcomes.len() - sent;

        let invalid_tokens: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_invalid_token())
            .map(|o| o.token.clone())
            .collect();

        let pruned = if invalid_tokens.is_empty() {
            0
        } else {
            match self.token_store.delete_tokens(&invalid_tokens).await {
                Ok(removed) => {
                    info!(removed, "Pruned invalid push tokens");
                    removed
                }
                Err(e) => {
                    warn!("Failed to prune {} invalid push tokens: {}", invalid_tokens.len(), e);
                    0
                }
            }
        };

        let record = NotificationRecord::from_outgoing(&notification);
        let notification_id = record.id.clone();
        self.notification_store.insert(record).await?;

        info!(
            notification_id = %notification_id,
            sent,
            failed,
            total,
            "Push notification dispatched"
        );

        Ok(DispatchSummary {
            notification_id,
            sent,
            failed,
            total,
            pruned,
        })
    }

    async fn deliver_partition(
        &self,
        scheme: TokenScheme,
        tokens: Vec<String>,
        message: &PushMessage,
    ) -> Vec<DeliveryOutcome> {
        match self.providers.get(&scheme) {
            Some(provider) => {
                debug!(provider = provider.name(), "Delivering to {} tokens", tokens.len());
                let outcomes = provider.deliver(&tokens, message).await;
                let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
                if delivered < outcomes.len() {
                    warn!(
                        provider = provider.name(),
                        "{} of {} push deliveries failed",
                        outcomes.len() - delivered,
                        outcomes.len()
                    );
                }
                outcomes
            }
            None => {
                warn!("No push provider configured for {:?}; {} tokens not sent", scheme, tokens.len());
                tokens
                    .into_iter()
                    .map(|t| DeliveryOutcome::failed(t, "provider not configured"))
                    .collect()
            }
        }
    }
}
