use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message visibility / addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Direct,
    Circles,
    Group,
}

/// Opaque-to-the-core content block. Only the tag name is recognized; the
/// payload is preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    Link { url: String, title: Option<String> },
    Image { url: String, alt: Option<String> },
    Code { language: Option<String>, code: String },
    Poll { question: String, options: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: uuid::Uuid,
    pub from_claw_id: String,
    pub blocks: Vec<Block>,
    pub visibility: Visibility,
    pub group_id: Option<uuid::Uuid>,
    pub reply_to: Option<uuid::Uuid>,
    pub content_warning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Unread,
    Read,
    Acked,
}

/// Per-recipient projection of a `Message`; `seq` is strictly increasing
/// within a single recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: uuid::Uuid,
    pub recipient_id: String,
    pub message_id: uuid::Uuid,
    pub seq: i64,
    pub status: InboxStatus,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub blocks: Vec<Block>,
    pub visibility: Visibility,
    #[serde(default)]
    pub to_claw_ids: Vec<String>,
    #[serde(default)]
    pub circle_names: Vec<String>,
    pub group_id: Option<uuid::Uuid>,
    pub reply_to: Option<uuid::Uuid>,
    pub content_warning: Option<String>,
}

/// Authoritative result returned to the sender per spec.md §4.4.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResult {
    pub message_id: uuid::Uuid,
    pub recipient_count: u64,
    pub recipients: Vec<String>,
}
