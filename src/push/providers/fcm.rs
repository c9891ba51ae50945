//! Firebase Cloud Messaging client (legacy HTTP API)
//!
//! FCM tokens are sent one request at a time, in order.

use crate::push::providers::PushProvider;
use crate::{DeliveryOutcome, PushMessage, TokenScheme};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

pub const FCM_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// Error codes FCM uses for tokens that will never be deliverable
const INVALID_TOKEN_ERRORS: [&str; 2] = ["InvalidRegistration", "NotRegistered"];

#[derive(Debug, Default, Deserialize)]
struct FcmResponse {
    success: Option<i64>,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResult {
    error: Option<String>,
}

/// HTTP client for Firebase Cloud Messaging
pub struct FcmPushClient {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmPushClient {
    pub fn new(client: reqwest::Client, server_key: String) -> Self {
        Self::with_endpoint(client, FCM_URL.to_string(), server_key)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: String, server_key: String) -> Self {
        Self {
            client,
            endpoint,
            server_key,
        }
    }

    async fn send_one(&self, token: &str, message: &PushMessage) -> DeliveryOutcome {
        let payload = json!({
            "to": token,
            "notification": {
                "title": message.title,
                "body": message.body,
                "sound": "default",
            },
            "data": {
                "title": message.title,
                "body": message.body,
            },
        });

        let response = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Error sending FCM push: {}", e);
                return DeliveryOutcome::failed(token, e.to_string());
            }
        };

        if !response.status().is_success() {
            warn!("FCM push rejected. Status: {}", response.status());
            return DeliveryOutcome::failed(token, format!("HTTP {}", response.status()));
        }

        let body: FcmResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Unreadable FCM response: {}", e);
                return DeliveryOutcome::failed(token, "unreadable response");
            }
        };

        if body.success == Some(1) {
            return DeliveryOutcome::delivered(token);
        }

        match body.results.first().and_then(|r| r.error.clone()) {
            Some(code) if INVALID_TOKEN_ERRORS.contains(&code.as_str()) => DeliveryOutcome::invalid(token, code),
            Some(code) => DeliveryOutcome::failed(token, code),
            None => DeliveryOutcome::failed(token, "FCM reported no success"),
        }
    }
}

#[async_trait]
impl PushProvider for FcmPushClient {
    fn scheme(&self) -> TokenScheme {
        TokenScheme::Fcm
    }

    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn deliver(&self, tokens: &[String], message: &PushMessage) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(tokens.len());
        for token in tokens {
            outcomes.push(self.send_one(token, message).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_fcm_outcomes() {
        let mut server = Server::new_async().await;

        let ok = server
            .mock("POST", "/fcm/send")
            .match_header("authorization", "key=server-key")
            .match_body(Matcher::PartialJson(json!({
                "to": "good-token",
                "notification": {"title": "Alerta", "sound": "default"},
                "data": {"body": "Estrada cortada"}
            })))
            .with_status(200)
            .with_body(json!({"success": 1, "failure": 0, "results": [{"message_id": "m1"}]}).to_string())
            .create_async()
            .await;

        let stale = server
            .mock("POST", "/fcm/send")
            .match_body(Matcher::PartialJson(json!({"to": "stale-token"})))
            .with_status(200)
            .with_body(json!({"success": 0, "failure": 1, "results": [{"error": "NotRegistered"}]}).to_string())
            .create_async()
            .await;

        let busy = server
            .mock("POST", "/fcm/send")
            .match_body(Matcher::PartialJson(json!({"to": "busy-token"})))
            .with_status(200)
            .with_body(json!({"success": 0, "failure": 1, "results": [{"error": "Unavailable"}]}).to_string())
            .create_async()
            .await;

        let client = FcmPushClient::with_endpoint(
            reqwest::Client::new(),
            format!("{}/fcm/send", server.url()),
            "server-key".to_string(),
        );
        let message = PushMessage {
            title: "Alerta".to_string(),
            body: "Estrada cortada".to_string(),
        };
        let tokens = vec!["good-token".to_string(), "stale-token".to_string(), "busy-token".to_string()];

        let outcomes = client.deliver(&tokens, &message).await;
        ok.assert_async().await;
        stale.assert_async().await;
        busy.assert_async().await;

        assert!(outcomes[0].is_delivered());
        assert!(outcomes[1].is_invalid_token());
        assert!(!outcomes[2].is_delivered() && !outcomes[2].is_invalid_token());
    }

    #[tokio::test]
    async fn test_fcm_http_error_is_not_invalid_token() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("POST", "/").with_status(401).create_async().await;

        let client = FcmPushClient::with_endpoint(reqwest::Client::new(), server.url(), "wrong".to_string());
        let message = PushMessage {
            title: "t".to_string(),
            body: "b".to_string(),
        };

        let outcomes = client.deliver(&["some-token".to_string()], &message).await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_delivered());
        assert!(!outcomes[0].is_invalid_token());
    }
}
