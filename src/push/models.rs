//! Domain types for push dispatch
//!
//! Tokens, outgoing notifications, per-token delivery outcomes and the
//! history rows written after each send attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token prefixes issued by the Expo notification service
pub const EXPO_TOKEN_PREFIXES: [&str; 2] = ["ExponentPushToken[", "ExpoPushToken["];

/// Delivery channel a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScheme {
    Expo,
    Fcm,
}

impl TokenScheme {
    /// Classifies a raw device token. Anything that is not Expo-formatted is
    /// treated as a raw FCM registration token.
    pub fn of(token: &str) -> Self {
        if EXPO_TOKEN_PREFIXES.iter().any(|p| token.starts_with(p)) {
            TokenScheme::Expo
        } else {
            TokenScheme::Fcm
        }
    }
}

/// A registered device token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToken {
    pub id: String,
    pub user_id: Option<String>,
    pub token: String,
    pub platform: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PushToken {
    pub fn new(user_id: Option<String>, token: String, platform: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            token,
            platform,
            created_at: Utc::now(),
        }
    }

    pub fn scheme(&self) -> TokenScheme {
        TokenScheme::of(&self.token)
    }
}

/// Result of registering a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRegistration {
    Created,
    Updated,
}

impl TokenRegistration {
    pub fn message(&self) -> &'static str {
        match self {
            TokenRegistration::Created => "Push token registered",
            TokenRegistration::Updated => "Push token updated",
        }
    }
}

/// Provider-facing payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

/// A notification waiting to be fanned out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingNotification {
    pub title: String,
    pub body: String,
    pub sent_by: Option<String>,
}

impl OutgoingNotification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            sent_by: None,
        }
    }

    pub fn with_sent_by(mut self, sent_by: Option<String>) -> Self {
        self.sent_by = sent_by;
        self
    }

    pub fn message(&self) -> PushMessage {
        PushMessage {
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

/// One notification-history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub sent_by: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_outgoing(notification: &OutgoingNotification) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            sent_by: notification.sent_by.clone(),
            sent_at: Utc::now(),
        }
    }
}

/// Per-token delivery status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed {
        reason: String,
        /// The provider reported the token as unknown or malformed
        invalid_token: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub token: String,
    pub status: DeliveryStatus,
}

impl DeliveryOutcome {
    pub fn delivered(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::Delivered,
        }
    }

    pub fn failed(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::Failed {
                reason: reason.into(),
                invalid_token: false,
            },
        }
    }

    pub fn invalid(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::Failed {
                reason: reason.into(),
                invalid_token: true,
            },
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered)
    }

    pub fn is_invalid_token(&self) -> bool {
        matches!(self.status, DeliveryStatus::Failed { invalid_token: true, .. })
    }
}

/// Aggregate result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub notification_id: String,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub pruned: u64,
}

/// Caller role as recorded in the profile table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Unknown or missing roles fall back to `User`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
