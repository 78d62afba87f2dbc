use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default ceiling on total interaction boost applied to one pair in one UTC
/// day, overridable via the `CLAWBUDS_DAILY_BOOST_CAP` environment variable.
pub const DEFAULT_DAILY_BOOST_CAP: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DunbarLayer {
    Casual,
    Active,
    Sympathy,
    Core,
}

impl DunbarLayer {
    /// Walk order used during daily reclassification: tightest layer first.
    pub const RECLASSIFY_ORDER: [DunbarLayer; 4] = [
        DunbarLayer::Core,
        DunbarLayer::Sympathy,
        DunbarLayer::Active,
        DunbarLayer::Casual,
    ];

    pub fn threshold(self) -> f64 {
        match self {
            DunbarLayer::Core => 0.8,
            DunbarLayer::Sympathy => 0.6,
            DunbarLayer::Active => 0.3,
            DunbarLayer::Casual => 0.0,
        }
    }

    pub fn capacity(self) -> Option<usize> {
        match self {
            DunbarLayer::Core => Some(5),
            DunbarLayer::Sympathy => Some(15),
            DunbarLayer::Active => Some(50),
            DunbarLayer::Casual => None,
        }
    }
}

impl Default for DunbarLayer {
    fn default() -> Self {
        Self::Casual
    }
}

/// Per ordered pair `(clawId, friendId)`. Initial strength 0.5, layer casual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipStrength {
    pub claw_id: String,
    pub friend_id: String,
    pub strength: f64,
    pub dunbar_layer: DunbarLayer,
    pub manual_override: bool,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl RelationshipStrength {
    pub fn new(claw_id: String, friend_id: String) -> Self {
        Self {
            claw_id,
            friend_id,
            strength: 0.5,
            dunbar_layer: DunbarLayer::Casual,
            manual_override: false,
            last_interaction_at: None,
        }
    }
}

/// Interaction event kinds the relationship engine boosts strength on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Message,
    Reaction,
    Heartbeat,
    PearlShare,
    PollVote,
}

impl InteractionKind {
    pub fn default_weight(self) -> f64 {
        match self {
            InteractionKind::Message => 0.05,
            InteractionKind::Reaction => 0.02,
            InteractionKind::Heartbeat => 0.005,
            InteractionKind::PearlShare => 0.08,
            InteractionKind::PollVote => 0.03,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclassify_order_is_tightest_first() {
        assert_eq!(DunbarLayer::RECLASSIFY_ORDER[0], DunbarLayer::Core);
        assert_eq!(DunbarLayer::RECLASSIFY_ORDER[3], DunbarLayer::Casual);
    }

    #[test]
    fn capacities_match_spec() {
        assert_eq!(DunbarLayer::Core.capacity(), Some(5));
        assert_eq!(DunbarLayer::Sympathy.capacity(), Some(15));
        assert_eq!(DunbarLayer::Active.capacity(), Some(50));
        assert_eq!(DunbarLayer::Casual.capacity(), None);
    }

    #[test]
    fn new_relationship_defaults() {
        let r = RelationshipStrength::new("a".into(), "b".into());
        assert_eq!(r.strength, 0.5);
        assert_eq!(r.dunbar_layer, DunbarLayer::Casual);
        assert!(!r.manual_override);
    }
}
