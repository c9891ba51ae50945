//! Expo push API client
//!
//! Messages are posted as a JSON array; the response carries one ticket per
//! message, in request order.

use crate::push::providers::PushProvider;
use crate::{DeliveryOutcome, PushMessage, TokenScheme};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Maximum number of messages Expo accepts per request
pub const EXPO_CHUNK_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct ExpoTicket {
    status: Option<String>,
    message: Option<String>,
    details: Option<ExpoTicketDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct ExpoTicketDetails {
    error: Option<String>,
}

impl ExpoTicket {
    fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }

    fn reports_invalid_token(&self) -> bool {
        let message = self.message.as_deref().unwrap_or_default().to_lowercase();
        let device_not_registered = self
            .details
            .as_ref()
            .and_then(|d| d.error.as_deref())
            == Some("DeviceNotRegistered");

        message.contains("invalid") || message.contains("unregistered") || device_not_registered
    }
}

/// `data` is an array for batch sends but Expo collapses it to a single
/// object when only one message was sent.
fn parse_tickets(response: &Value) -> Vec<ExpoTicket> {
    match response.get("data") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
            .collect(),
        Some(item @ Value::Object(_)) => {
            vec![serde_json::from_value(item.clone()).unwrap_or_default()]
        }
        _ => Vec::new(),
    }
}

/// HTTP client for the Expo push service
pub struct ExpoPushClient {
    client: reqwest::Client,
    endpoint: String,
    chunk_size: usize,
}

impl ExpoPushClient {
    /// Creates a client for the public Expo endpoint
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, EXPO_PUSH_URL.to_string())
    }

    /// Creates a client that posts to a custom endpoint
    pub fn with_endpoint(client: reqwest::Client, endpoint: String) -> Self {
        Self {
            client,
            endpoint,
            chunk_size: EXPO_CHUNK_SIZE,
        }
    }

    /// Overrides the request chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn send_chunk(&self, tokens: &[String], message: &PushMessage) -> Vec<DeliveryOutcome> {
        let payload: Vec<ExpoMessage<'_>> = tokens
            .iter()
            .map(|token| ExpoMessage {
                to: token,
                title: &message.title,
                body: &message.body,
                sound: "default",
            })
            .collect();

        let response = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error sending Expo push chunk of {} tokens: {}", tokens.len(), e);
                return tokens
                    .iter()
                    .map(|t| DeliveryOutcome::failed(t.as_str(), e.to_string()))
                    .collect();
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!("Expo push chunk of {} tokens rejected. Status: {}", tokens.len(), status);
            return tokens
                .iter()
                .map(|t| DeliveryOutcome::failed(t.as_str(), format!("HTTP {}", status)))
                .collect();
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Unreadable Expo push response: {}", e);
                return tokens
                    .iter()
                    .map(|t| DeliveryOutcome::failed(t.as_str(), "unreadable response"))
                    .collect();
            }
        };

        let tickets = parse_tickets(&body);
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| match tickets.get(i) {
                Some(ticket) if ticket.is_ok() => DeliveryOutcome::delivered(token.as_str()),
                Some(ticket) => {
                    let reason = ticket
                        .message
                        .clone()
                        .unwrap_or_else(|| "push ticket error".to_string());
                    if ticket.reports_invalid_token() {
                        DeliveryOutcome::invalid(token.as_str(), reason)
                    } else {
                        DeliveryOutcome::failed(token.as_str(), reason)
                    }
                }
                None => DeliveryOutcome::failed(token.as_str(), "no push ticket returned"),
            })
            .collect()
    }
}

#[async_trait]
impl PushProvider for ExpoPushClient {
    fn scheme(&self) -> TokenScheme {
        TokenScheme::Expo
    }

    fn name(&self) -> &'static str {
        "expo"
    }

    async fn deliver(&self, tokens: &[String], message: &PushMessage) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(tokens.len());
        for chunk in tokens.chunks(self.chunk_size) {
            debug!("Sending Expo push chunk of {} tokens", chunk.len());
            outcomes.extend(self.send_chunk(chunk, message).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn message() -> PushMessage {
        PushMessage {
            title: "Operação STOP".to_string(),
            body: "Controlo na Via Rápida".to_string(),
        }
    }

    #[tokio::test]
    async fn test_expo_ticket_mapping() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/--/api/v2/push/send")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""to":"ExponentPushToken\[a\]""#.to_string()),
                Matcher::Regex(r#""sound":"default""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        {"status": "ok", "id": "ticket-1"},
                        {"status": "error", "message": "\"ExponentPushToken[b]\" is not a registered push notification recipient", "details": {"error": "DeviceNotRegistered"}},
                        {"status": "error", "message": "Message rate exceeded"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ExpoPushClient::with_endpoint(
            reqwest::Client::new(),
            format!("{}/--/api/v2/push/send", server.url()),
        );
        let tokens = vec![
            "ExponentPushToken[a]".to_string(),
            "ExponentPushToken[b]".to_string(),
            "ExponentPushToken[c]".to_string(),
            "ExponentPushToken[d]".to_string(),
        ];

        let outcomes = client.deliver(&tokens, &message()).await;
        mock.assert_async().await;

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_delivered());
        assert!(outcomes[1].is_invalid_token());
        assert!(!outcomes[2].is_delivered() && !outcomes[2].is_invalid_token());
        // no ticket for the fourth token
        assert!(!outcomes[3].is_delivered() && !outcomes[3].is_invalid_token());
    }

    #[tokio::test]
    async fn test_expo_single_ticket_object() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(json!({"data": {"status": "error", "message": "Invalid push token"}}).to_string())
            .create_async()
            .await;

        let client = ExpoPushClient::with_endpoint(reqwest::Client::new(), server.url());
        let outcomes = client.deliver(&["ExpoPushToken[x]".to_string()], &message()).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_invalid_token());
    }

    #[tokio::test]
    async fn test_expo_http_failure_fails_whole_chunk() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = ExpoPushClient::with_endpoint(reqwest::Client::new(), server.url()).with_chunk_size(2);
        let tokens: Vec<String> = (0..3).map(|i| format!("ExponentPushToken[{}]", i)).collect();

        let outcomes = client.deliver(&tokens, &message()).await;
        mock.assert_async().await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.is_delivered() && !o.is_invalid_token()));
    }
}
