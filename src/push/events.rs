//! Event-triggered notifications
//!
//! Turns a database-webhook or app-trigger payload into the title and body
//! pushed to devices. Webhook payloads carry the inserted row under `record`;
//! direct invocations put the same fields at the top level.

use serde::Deserialize;

use crate::{OutgoingNotification, PushError};

pub const EVENT_NEW_POST: &str = "new_post";
pub const EVENT_NEW_COMMENT: &str = "new_comment";

const DEFAULT_TITLE: &str = "Alerta Madeira";
const DEFAULT_BODY: &str = "Nova atividade na aplicação.";
const NEW_POST_TITLE: &str = "Nova publicação";
const NEW_POST_FALLBACK: &str = "New post";
const NEW_COMMENT_TITLE: &str = "Novo comentário";
const NEW_COMMENT_BODY: &str = "Alguém comentou numa publicação.";

/// Characters of the post description quoted in the notification body
const SNIPPET_CHARS: usize = 60;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Incoming notify-on-event payload
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    pub event: Option<String>,
    pub table: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub record: Option<EventRecord>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub sent_by: Option<String>,
    pub user_id: Option<String>,
    pub description: Option<String>,
}

impl EventPayload {
    /// Whether the payload names one of the events apps may trigger directly
    pub fn is_app_event(&self) -> bool {
        matches!(self.event.as_deref(), Some(EVENT_NEW_POST) | Some(EVENT_NEW_COMMENT))
    }

    fn record(&self) -> EventRecord {
        self.record.clone().unwrap_or_else(|| EventRecord {
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        })
    }

    fn kind(&self) -> &str {
        self.kind
            .as_deref()
            .or(self.event.as_deref())
            .unwrap_or_default()
    }

    /// Builds the notification for this payload
    ///
    /// `caller` is the authenticated user when the trigger came from the app;
    /// otherwise the sender is taken from the record or the payload.
    pub fn compose(&self, caller: Option<String>) -> Result<OutgoingNotification, PushError> {
        let record = self.record();
        let table = self.table.as_deref().unwrap_or_default();
        let kind = self.kind();

        let mut title = non_empty(self.title.clone());
        let mut body = non_empty(self.body.clone());
        let sent_by = caller
            .or_else(|| record.user_id.clone())
            .or_else(|| self.sent_by.clone());

        if table == "posts" && (kind == "INSERT" || kind == EVENT_NEW_POST) {
            let post_title = record.title.clone().unwrap_or_else(|| NEW_POST_FALLBACK.to_string());
            let snippet: String = record
                .description
                .as_deref()
                .unwrap_or_default()
                .chars()
                .take(SNIPPET_CHARS)
                .collect();

            title = title.or_else(|| Some(NEW_POST_TITLE.to_string()));
            // an empty post title with no description leaves the body to the default
            body = body.or_else(|| {
                if snippet.is_empty() {
                    non_empty(Some(post_title))
                } else {
                    Some(format!("{}: {}...", post_title, snippet))
                }
            });
        } else if table == "comments" && (kind == "INSERT" || kind == EVENT_NEW_COMMENT) {
            title = title.or_else(|| Some(NEW_COMMENT_TITLE.to_string()));
            body = body.or_else(|| Some(NEW_COMMENT_BODY.to_string()));
        }

        if title.is_none() && body.is_none() {
            return Err(PushError::invalid_request(
                "Missing title/body or unrecognized webhook payload",
            ));
        }

        Ok(OutgoingNotification {
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            sent_by,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
