use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of circles a single claw may own.
pub const MAX_CIRCLES_PER_OWNER: usize = 50;

/// A named, owner-scoped subset of that owner's accepted friends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub id: uuid::Uuid,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleMember {
    pub circle_id: uuid::Uuid,
    pub friend_id: String,
    pub added_at: DateTime<Utc>,
}
