use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive-failure count at which a webhook is deactivated.
pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 10;

/// Retry delays after the initial attempt (seconds). 3 retries, 4 attempts.
pub const RETRY_SCHEDULE_SECS: [u64; 3] = [10, 60, 300];

pub const DELIVERY_TIMEOUT_SECS: u64 = 10;
pub const RESPONSE_BODY_TRUNCATE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookType {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: uuid::Uuid,
    pub claw_id: String,
    pub webhook_type: WebhookType,
    pub name: String,
    pub url: Option<String>,
    pub secret: String,
    pub events: Vec<String>,
    pub active: bool,
    pub failure_count: u32,
    pub last_status_code: Option<u16>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.active && self.events.iter().any(|e| e == event || e == "*")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: uuid::Uuid,
    pub webhook_id: uuid::Uuid,
    pub event: String,
    pub attempt: u32,
    pub outcome: DeliveryOutcome,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The JSON body sent to every outgoing webhook target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub timestamp: i64,
    pub data: serde_json::Value,
}
