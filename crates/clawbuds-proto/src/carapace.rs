use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of versions retained per claw by the pruning job.
pub const DEFAULT_KEEP_VERSIONS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarapaceSource {
    Manual,
    MicroMolt,
}

/// Append-only versioned snapshot of a claw's behavioural rule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarapaceHistory {
    pub claw_id: String,
    pub version: u32,
    pub document: serde_json::Value,
    pub source: CarapaceSource,
    pub created_at: DateTime<Utc>,
}

/// One ordered rule in a carapace policy document: first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarapaceRule {
    pub action_pattern: String,
    pub decision: CarapaceDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarapaceDecision {
    Allow,
    Block,
}

impl CarapaceRule {
    /// `*` matches any action; otherwise an exact string match.
    pub fn matches(&self, action: &str) -> bool {
        self.action_pattern == "*" || self.action_pattern == action
    }
}

/// First-match-wins evaluation over an ordered rule list; an action with no
/// matching rule is allowed by default.
pub fn evaluate_rules(rules: &[CarapaceRule], action: &str) -> CarapaceDecision {
    rules.iter().find(|r| r.matches(action)).map(|r| r.decision).unwrap_or(CarapaceDecision::Allow)
}

/// Pulls the ordered rule list out of a carapace document's `rules` array.
/// A missing or malformed field yields an empty list (allow-by-default).
pub fn rules_from_document(document: &serde_json::Value) -> Vec<CarapaceRule> {
    document.get("rules").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            CarapaceRule { action_pattern: "send_pearl".into(), decision: CarapaceDecision::Block },
            CarapaceRule { action_pattern: "*".into(), decision: CarapaceDecision::Allow },
        ];
        assert_eq!(evaluate_rules(&rules, "send_pearl"), CarapaceDecision::Block);
        assert_eq!(evaluate_rules(&rules, "anything_else"), CarapaceDecision::Allow);
    }

    #[test]
    fn no_rules_defaults_to_allow() {
        assert_eq!(evaluate_rules(&[], "anything"), CarapaceDecision::Allow);
    }
}
