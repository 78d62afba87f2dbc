use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefingType {
    Daily,
    Weekly,
}

/// Append-only per-claw document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub id: uuid::Uuid,
    pub claw_id: String,
    pub briefing_type: BriefingType,
    pub content: String,
    pub raw_data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// A micro-molt is a targeted carapace amendment suggestion derived from
/// observed reflex/relationship patterns.
#[derive(Debug, Clone, Serialize)]
pub struct MicroMoltSuggestion {
    pub claw_id: String,
    pub summary: String,
    pub proposed_diff: serde_json::Value,
    pub confidence: f64,
}
