//! HTTP handlers
//!
//! Thin adapters between axum extractors and the dispatcher/stores. Every
//! handler returns `Result<_, PushError>` so failures render as
//! `{"error": "..."}` with the matching status.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::push::auth::{authorize_trigger, TriggerCredentials};
use crate::push::events::EventPayload;
use crate::push::server::AppState;
use crate::{AuthUser, DispatchSummary, NotificationRecord, OutgoingNotification, PushError};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";
pub const INVOKE_SECRET_HEADER: &str = "x-invoke-secret";

#[derive(Debug, Default, Deserialize)]
pub struct RegisterTokenRequest {
    pub token: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendNotificationRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: DispatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<DispatchSummary> for DispatchResponse {
    fn from(summary: DispatchSummary) -> Self {
        let message = (summary.total == 0).then(|| "No push tokens registered".to_string());
        Self {
            success: true,
            summary,
            message,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, PushError> {
    let bearer = bearer_token(headers).ok_or(PushError::Unauthorized)?;
    state
        .authenticator
        .authenticate(&bearer)
        .await?
        .ok_or(PushError::Unauthorized)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, PushError> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(PushError::forbidden("Admin access required"));
    }
    Ok(user)
}

/// Blank values count as missing but are passed on untouched
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parsed after authentication so rejections keep the `{"error"}` shape
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PushError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| PushError::invalid_request(&format!("Invalid JSON body: {}", e)))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /push-tokens
pub async fn register_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, PushError> {
    let user = require_user(&state, &headers).await?;
    let request: RegisterTokenRequest = parse_body(&body)?;
    let token = non_empty(request.token).ok_or_else(|| PushError::invalid_request("Push token is required"))?;
    let platform = non_empty(request.platform);

    let outcome = state
        .token_store
        .register(Some(&user.id), &token, platform.as_deref())
        .await?;
    debug!(user_id = %user.id, ?outcome, "Push token registered");

    Ok(Json(json!({ "message": outcome.message() })))
}

/// POST /notifications/send
pub async fn send_notification_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DispatchResponse>, PushError> {
    let admin = require_admin(&state, &headers).await?;
    let request: SendNotificationRequest = parse_body(&body)?;

    let (Some(title), Some(body)) = (non_empty(request.title), non_empty(request.body)) else {
        return Err(PushError::invalid_request("Title and body are required"));
    };

    info!(sent_by = %admin.id, "Admin broadcast requested");
    let summary = state
        .dispatcher
        .dispatch(OutgoingNotification::new(title, body).with_sent_by(Some(admin.id)))
        .await?;

    Ok(Json(summary.into()))
}

/// GET /notifications
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<NotificationRecord>>, PushError> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.notification_store.list().await?))
}

/// POST /notify-on-event
pub async fn notify_on_event_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DispatchResponse>, PushError> {
    // unreadable bodies are treated as an empty payload
    let payload: EventPayload = if body.is_empty() {
        EventPayload::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            debug!("Ignoring unreadable event payload: {}", e);
            EventPayload::default()
        })
    };

    let bearer = bearer_token(&headers);
    let credentials = TriggerCredentials {
        webhook_secret: header_str(&headers, WEBHOOK_SECRET_HEADER),
        invoke_secret: header_str(&headers, INVOKE_SECRET_HEADER),
        bearer: bearer.as_deref(),
        has_authorization: headers.contains_key(AUTHORIZATION),
    };

    let authorization = authorize_trigger(
        &state.trigger_secrets,
        &credentials,
        &payload,
        state.authenticator.as_ref(),
    )
    .await?;
    debug!(?authorization, "Event trigger authorized");

    let notification = payload.compose(authorization.caller_id())?;
    let summary = state.dispatcher.dispatch(notification).await?;

    Ok(Json(summary.into()))
}
