use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directional datagram. A keepalive carries no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: uuid::Uuid,
    pub from_claw_id: String,
    pub to_claw_id: String,
    pub interests: Option<Vec<String>>,
    pub availability: Option<String>,
    pub recent_topics: Option<Vec<String>>,
    pub is_keepalive: bool,
    pub created_at: DateTime<Utc>,
}

/// The three semantic fields compared to decide keepalive vs. payload-bearing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatState {
    pub interests: Option<Vec<String>>,
    pub availability: Option<String>,
    pub recent_topics: Option<Vec<String>>,
}

impl HeartbeatState {
    pub fn unchanged_from(&self, previous: &HeartbeatState) -> bool {
        self == previous
    }
}
