use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Proxy ToM: what `claw_id` believes about `friend_id`. Keyed independently
/// of `RelationshipStrength` by design (see SPEC_FULL.md §9 cycle-risk note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendModel {
    pub claw_id: String,
    pub friend_id: String,
    pub last_known_state: Option<String>,
    pub inferred_interests: BTreeSet<String>,
    pub expertise_tags: BTreeMap<String, f64>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub emotional_tone: Option<String>,
    pub inferred_needs: BTreeSet<String>,
    pub knowledge_gaps: BTreeSet<String>,
}

impl FriendModel {
    pub fn new(claw_id: String, friend_id: String) -> Self {
        Self {
            claw_id,
            friend_id,
            last_known_state: None,
            inferred_interests: BTreeSet::new(),
            expertise_tags: BTreeMap::new(),
            last_heartbeat_at: None,
            last_interaction_at: None,
            emotional_tone: None,
            inferred_needs: BTreeSet::new(),
            knowledge_gaps: BTreeSet::new(),
        }
    }
}
