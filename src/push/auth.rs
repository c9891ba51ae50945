//! Caller authentication
//!
//! Bearer credentials are verified against an identity provider; this
//! service never issues them. Event triggers may instead present a shared
//! webhook or invoke secret.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::push::events::EventPayload;
use crate::{AuthUser, PushError, Role};

/// Resolves bearer credentials to a caller
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `None` when the credential is not recognised
    async fn authenticate(&self, bearer: &str) -> Result<Option<AuthUser>, PushError>;
}

/// Fixed token-to-user table
#[derive(Default)]
pub struct InMemoryAuthenticator {
    users: HashMap<String, AuthUser>,
}

impl InMemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, bearer: &str, user: AuthUser) -> Self {
        self.users.insert(bearer.to_string(), user);
        self
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<Option<AuthUser>, PushError> {
        Ok(self.users.get(bearer).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    role: Option<String>,
}

/// Verifies Supabase-issued JWTs and reads the caller's role from `profiles`
pub struct SupabaseAuthenticator {
    client: reqwest::Client,
    url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseAuthenticator {
    pub fn new(client: reqwest::Client, url: &str, anon_key: String, service_role_key: String) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key,
        }
    }

    async fn fetch_user(&self, jwt: &str) -> Result<Option<SupabaseUser>, PushError> {
        let resp = self
            .client
            .get(format!("{}/auth/v1/user", self.url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", jwt))
            .send()
            .await
            .map_err(|e| PushError::internal(&format!("Supabase auth request failed: {}", e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            debug!("Supabase rejected bearer token. Status: {}", status);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PushError::internal(&format!("Supabase auth lookup failed: {}", status)));
        }

        let user = resp
            .json()
            .await
            .map_err(|e| PushError::internal(&format!("Unreadable Supabase user: {}", e)))?;
        Ok(Some(user))
    }

    async fn fetch_role(&self, user_id: &str) -> Result<Role, PushError> {
        let resp = self
            .client
            .get(format!("{}/rest/v1/profiles", self.url))
            .query(&[("id", format!("eq.{}", user_id)), ("select", "role".to_string())])
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .send()
            .await
            .map_err(|e| PushError::internal(&format!("Supabase profile request failed: {}", e)))?;

        if !resp.status().is_success() {
            warn!("Profile lookup for {} failed: {}", user_id, resp.status());
            return Ok(Role::User);
        }

        let rows: Vec<ProfileRow> = resp
            .json()
            .await
            .map_err(|e| PushError::internal(&format!("Unreadable profile row: {}", e)))?;
        Ok(Role::parse(rows.first().and_then(|r| r.role.as_deref())))
    }
}

#[async_trait]
impl Authenticator for SupabaseAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<Option<AuthUser>, PushError> {
        let Some(user) = self.fetch_user(bearer).await? else {
            return Ok(None);
        };
        let role = self.fetch_role(&user.id).await?;
        Ok(Some(AuthUser::new(user.id, role)))
    }
}

/// Shared secrets accepted on the event trigger
#[derive(Debug, Clone, Default)]
pub struct TriggerSecrets {
    pub webhook_secret: Option<String>,
    pub invoke_secret: Option<String>,
}

/// How an event trigger was authorized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerAuthorization {
    /// Database webhook presenting the webhook secret
    Webhook,
    /// Manual invocation presenting the invoke secret
    TestInvoke,
    /// Signed-in app user
    App(AuthUser),
    /// No webhook secret configured, so the trigger is open
    Open,
}

impl TriggerAuthorization {
    pub fn caller_id(&self) -> Option<String> {
        match self {
            TriggerAuthorization::App(user) => Some(user.id.clone()),
            _ => None,
        }
    }
}

/// Credentials presented on an event trigger request
#[derive(Debug, Clone, Default)]
pub struct TriggerCredentials<'a> {
    pub webhook_secret: Option<&'a str>,
    pub invoke_secret: Option<&'a str>,
    pub bearer: Option<&'a str>,
    /// An `Authorization` header was sent, whether or not it held a bearer
    pub has_authorization: bool,
}

/// Authorizes an event trigger, trying webhook, invoke secret and app bearer in turn
pub async fn authorize_trigger(
    secrets: &TriggerSecrets,
    credentials: &TriggerCredentials<'_>,
    payload: &EventPayload,
    authenticator: &dyn Authenticator,
) -> Result<TriggerAuthorization, PushError> {
    let configured_webhook = secrets.webhook_secret.as_deref().filter(|s| !s.is_empty());
    if let (Some(expected), Some(presented)) = (configured_webhook, credentials.webhook_secret) {
        if expected == presented {
            return Ok(TriggerAuthorization::Webhook);
        }
    }

    let configured_invoke = secrets.invoke_secret.as_deref().filter(|s| !s.is_empty());
    if let (Some(expected), Some(presented)) = (configured_invoke, credentials.invoke_secret) {
        if expected == presented && payload.is_app_event() {
            return Ok(TriggerAuthorization::TestInvoke);
        }
    }

    if (credentials.has_authorization || credentials.bearer.is_some()) && payload.is_app_event() {
        let Some(bearer) = credentials.bearer.filter(|b| !b.is_empty()) else {
            return Err(PushError::Unauthorized);
        };
        return match authenticator.authenticate(bearer).await? {
            Some(user) => Ok(TriggerAuthorization::App(user)),
            None => Err(PushError::Unauthorized),
        };
    }

    if configured_webhook.is_some() {
        return Err(PushError::Unauthorized);
    }

    warn!("No webhook secret configured; accepting unauthenticated event trigger");
    Ok(TriggerAuthorization::Open)
}
