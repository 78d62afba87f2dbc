use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on suggestions returned by any single pattern analysis.
pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLayer {
    L0,
    L1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflexSource {
    Builtin,
    User,
    MicroMolt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflex {
    pub id: uuid::Uuid,
    pub claw_id: String,
    pub name: String,
    pub value_layer: String,
    pub behavior: String,
    pub trigger_layer: TriggerLayer,
    pub trigger_config: serde_json::Value,
    pub enabled: bool,
    pub confidence: f64,
    pub source: ReflexSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Executed,
    Recommended,
    Blocked,
    QueuedForL1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflexExecution {
    pub id: uuid::Uuid,
    pub reflex_id: uuid::Uuid,
    pub event_id: uuid::Uuid,
    pub claw_id: String,
    pub outcome: ExecutionOutcome,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReflexStats {
    pub total: u64,
    pub executed: u64,
    pub blocked: u64,
    pub queued_for_l1: u64,
}

impl ReflexStats {
    pub fn blocked_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.blocked as f64 / self.total as f64
        }
    }
}

/// One actionable suggestion emitted by a pattern analysis (§4.9).
#[derive(Debug, Clone, Serialize)]
pub struct ReflexSuggestion {
    pub reflex_id: Option<uuid::Uuid>,
    pub friend_id: Option<String>,
    pub kind: SuggestionKind,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Disable,
    Timing,
    Escalate,
    Allow,
}
