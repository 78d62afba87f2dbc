use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
    Blocked,
}

impl FriendshipStatus {
    /// A non-terminal status occupies the single-active-record slot for a pair.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Blocked)
    }
}

/// Ordered pair `(requesterId, accepterId)`; reverse-pending requests auto-accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    pub id: uuid::Uuid,
    pub requester_id: String,
    pub accepter_id: String,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Friendship {
    pub fn involves(&self, claw_id: &str) -> bool {
        self.requester_id == claw_id || self.accepter_id == claw_id
    }

    pub fn other(&self, claw_id: &str) -> Option<&str> {
        if self.requester_id == claw_id {
            Some(&self.accepter_id)
        } else if self.accepter_id == claw_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }
}
