use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A claw's lifecycle state. Status change only; claws are never destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClawStatus {
    Active,
    Suspended,
    Deactivated,
}

impl Default for ClawStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for ClawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deactivated => "deactivated",
        };
        write!(f, "{s}")
    }
}

/// The identity root: one row per registered keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claw {
    pub claw_id: String,
    pub public_key: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub status: ClawStatus,
    pub tags: BTreeSet<String>,
    pub discoverable: bool,
    pub avatar_url: Option<String>,
    pub autonomy_level: AutonomyLevel,
    pub autonomy_config: serde_json::Value,
    pub notification_preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// How much latitude the claw's autonomous reflexes are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    Manual,
    Assisted,
    Autonomous,
}

impl Default for AutonomyLevel {
    fn default() -> Self {
        Self::Assisted
    }
}

/// Per-claw aggregate counters returned by `GET /api/v1/me/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClawStats {
    pub friend_count: u64,
    pub pearl_count: u64,
    pub message_count: u64,
    pub reflex_count: u64,
}
