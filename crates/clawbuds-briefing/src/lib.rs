//! Daily/weekly briefing generation and micro-molt carapace-amendment
//! suggestions, built from the same storage the other domain services
//! write to.

#![forbid(unsafe_code)]

use chrono::{Duration, Utc};
use clawbuds_proto::{
    Briefing, BriefingType, CarapaceHistory, CarapaceSource, DunbarLayer, MicroMoltSuggestion, RelationshipStrength,
    ReflexSuggestion, SuggestionKind,
};
use clawbuds_storage::{Storage, StorageResult};
use std::collections::BTreeMap;
use uuid::Uuid;

const DEFAULT_AT_RISK_INACTIVE_DAYS: i64 = 7;
const DEFAULT_AT_RISK_MARGIN: f64 = 0.05;
const DEFAULT_MICRO_MOLT_MAX_SUGGESTIONS: usize = 3;

fn at_risk_inactive_days() -> i64 {
    std::env::var("CLAWBUDS_AT_RISK_INACTIVE_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_AT_RISK_INACTIVE_DAYS)
}

fn at_risk_margin() -> f64 {
    std::env::var("CLAWBUDS_AT_RISK_MARGIN").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_AT_RISK_MARGIN)
}

fn micro_molt_max_suggestions() -> usize {
    std::env::var("CLAWBUDS_MICRO_MOLT_MAX_SUGGESTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MICRO_MOLT_MAX_SUGGESTIONS)
}

/// Relationships sitting just above their layer's demotion threshold with no
/// recent interaction — likely to fall a layer on the next decay pass.
pub async fn at_risk_relationships(storage: &Storage, claw_id: &str) -> StorageResult<Vec<RelationshipStrength>> {
    let margin = at_risk_margin();
    let cutoff = Utc::now() - Duration::days(at_risk_inactive_days());
    let relationships = storage.list_relationships_for_owner(claw_id).await?;
    Ok(relationships
        .into_iter()
        .filter(|r| {
            r.dunbar_layer != DunbarLayer::Casual
                && r.last_interaction_at.is_none_or(|t| t < cutoff)
                && r.strength < r.dunbar_layer.threshold() + margin
        })
        .collect())
}

fn layer_counts(relationships: &[RelationshipStrength]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for layer in [DunbarLayer::Core, DunbarLayer::Sympathy, DunbarLayer::Active, DunbarLayer::Casual] {
        let label = match layer {
            DunbarLayer::Core => "core",
            DunbarLayer::Sympathy => "sympathy",
            DunbarLayer::Active => "active",
            DunbarLayer::Casual => "casual",
        };
        counts.insert(label, relationships.iter().filter(|r| r.dunbar_layer == layer).count());
    }
    counts
}

fn build_daily_content(
    counts: &BTreeMap<&'static str, usize>,
    at_risk: &[RelationshipStrength],
    new_pearls: usize,
    suggestions: &[ReflexSuggestion],
) -> String {
    let mut parts = vec![format!(
        "{} core, {} sympathy, {} active, {} casual relationships.",
        counts["core"], counts["sympathy"], counts["active"], counts["casual"]
    )];
    if at_risk.is_empty() {
        parts.push("No relationships at risk of demotion.".to_string());
    } else {
        parts.push(format!("{} relationship(s) at risk of demotion without interaction.", at_risk.len()));
    }
    if new_pearls > 0 {
        parts.push(format!("{new_pearls} new pearl(s) captured since yesterday."));
    }
    if suggestions.is_empty() {
        parts.push("No reflex pattern suggestions today.".to_string());
    } else {
        parts.push(format!("{} reflex pattern suggestion(s) pending review.", suggestions.len()));
    }
    parts.join(" ")
}

/// Generates and persists a daily briefing for `claw_id`.
pub async fn generate_daily_briefing(storage: &Storage, claw_id: &str) -> StorageResult<Briefing> {
    let relationships = storage.list_relationships_for_owner(claw_id).await?;
    let counts = layer_counts(&relationships);
    let at_risk = at_risk_relationships(storage, claw_id).await?;

    let since = Utc::now() - Duration::days(1);
    let pearls = storage.list_pearls_by_owner(claw_id).await?;
    let new_pearls = pearls.iter().filter(|p| p.created_at >= since).count();

    let suggestions = clawbuds_reflex::suggestions_for_owner(storage, claw_id).await?;
    let content = build_daily_content(&counts, &at_risk, new_pearls, &suggestions);

    let raw_data = serde_json::json!({
        "layerCounts": counts,
        "atRiskFriendIds": at_risk.iter().map(|r| &r.friend_id).collect::<Vec<_>>(),
        "newPearls": new_pearls,
        "suggestionCount": suggestions.len(),
    });

    let briefing = Briefing {
        id: Uuid::new_v4(),
        claw_id: claw_id.to_string(),
        briefing_type: BriefingType::Daily,
        content,
        raw_data,
        generated_at: Utc::now(),
        acknowledged_at: None,
    };
    storage.create_briefing(&briefing).await?;
    Ok(briefing)
}

/// Generates and persists a weekly rollup briefing for `claw_id`.
pub async fn generate_weekly_briefing(storage: &Storage, claw_id: &str) -> StorageResult<Briefing> {
    let relationships = storage.list_relationships_for_owner(claw_id).await?;
    let counts = layer_counts(&relationships);

    let since = Utc::now() - Duration::days(7);
    let pearls = storage.list_pearls_by_owner(claw_id).await?;
    let new_pearls = pearls.iter().filter(|p| p.created_at >= since).count();

    let executions = storage.list_executions_in_window(claw_id, since).await?;
    let executed = executions.iter().filter(|e| e.outcome == clawbuds_proto::ExecutionOutcome::Executed).count();
    let blocked = executions.iter().filter(|e| e.outcome == clawbuds_proto::ExecutionOutcome::Blocked).count();

    let content = format!(
        "This week: {} core, {} sympathy, {} active, {} casual relationships. \
         {new_pearls} new pearl(s) captured. Reflex engine executed {executed} action(s), blocked {blocked}.",
        counts["core"], counts["sympathy"], counts["active"], counts["casual"],
    );
    let raw_data = serde_json::json!({
        "layerCounts": counts,
        "newPearls": new_pearls,
        "reflexExecuted": executed,
        "reflexBlocked": blocked,
        "totalExecutions": executions.len(),
    });

    let briefing = Briefing {
        id: Uuid::new_v4(),
        claw_id: claw_id.to_string(),
        briefing_type: BriefingType::Weekly,
        content,
        raw_data,
        generated_at: Utc::now(),
        acknowledged_at: None,
    };
    storage.create_briefing(&briefing).await?;
    Ok(briefing)
}

pub async fn acknowledge_briefing(storage: &Storage, id: Uuid) -> StorageResult<()> {
    storage.acknowledge_briefing(id).await
}

fn rule_for_suggestion(reflex_behavior: &str, kind: SuggestionKind) -> Option<serde_json::Value> {
    match kind {
        SuggestionKind::Disable => {
            Some(serde_json::json!({"action_pattern": reflex_behavior, "decision": "block"}))
        }
        SuggestionKind::Allow => Some(serde_json::json!({"action_pattern": reflex_behavior, "decision": "allow"})),
        SuggestionKind::Escalate | SuggestionKind::Timing => None,
    }
}

/// Translates the top reflex-pattern suggestions into micro-molt carapace
/// amendment proposals. Suggestions with no direct carapace-rule
/// counterpart (timing, escalation) are still surfaced with an empty
/// `proposed_diff` so the claw sees the recommendation even though it has
/// nothing to auto-apply.
pub async fn micro_molt_suggestions(storage: &Storage, claw_id: &str) -> StorageResult<Vec<MicroMoltSuggestion>> {
    let suggestions = clawbuds_reflex::suggestions_for_owner(storage, claw_id).await?;
    let mut out = Vec::new();
    for suggestion in suggestions.into_iter().take(micro_molt_max_suggestions()) {
        let behavior = match suggestion.reflex_id {
            Some(id) => storage.get_reflex(id).await?.map(|r| r.behavior),
            None => None,
        };
        let proposed_diff = match &behavior {
            Some(behavior) => rule_for_suggestion(behavior, suggestion.kind).unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::Null,
        };
        out.push(MicroMoltSuggestion {
            claw_id: claw_id.to_string(),
            summary: suggestion.reason,
            proposed_diff,
            confidence: suggestion.confidence,
        });
    }
    Ok(out)
}

/// Appends a micro-molt suggestion's rule to the claw's current carapace
/// document and proposes the resulting document as a new version.
pub async fn apply_micro_molt(storage: &Storage, suggestion: &MicroMoltSuggestion) -> StorageResult<Option<CarapaceHistory>> {
    if suggestion.proposed_diff.is_null() {
        return Ok(None);
    }
    let current = storage.current_carapace(&suggestion.claw_id).await?;
    let mut rules = match &current {
        Some(history) => clawbuds_proto::rules_from_document(&history.document),
        None => Vec::new(),
    };
    let rule: clawbuds_proto::CarapaceRule = serde_json::from_value(suggestion.proposed_diff.clone())
        .map_err(clawbuds_storage::StorageError::Serde)?;
    rules.push(rule);
    let document = serde_json::json!({"rules": rules});
    let history = storage.propose_carapace_amendment(&suggestion.claw_id, &document, CarapaceSource::MicroMolt).await?;
    Ok(Some(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::{Pearl, PearlOriginType, PearlType, Reflex, ReflexSource, Shareability, TriggerLayer};

    async fn memory_storage() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn at_risk_excludes_casual_and_recent_interactions() {
        let storage = memory_storage().await;
        let mut stale = RelationshipStrength::new("alice".into(), "bob".into());
        stale.dunbar_layer = DunbarLayer::Active;
        stale.strength = 0.31;
        stale.last_interaction_at = Some(Utc::now() - Duration::days(10));
        storage.save_relationship(&stale).await.unwrap();

        let mut fresh = RelationshipStrength::new("alice".into(), "carol".into());
        fresh.dunbar_layer = DunbarLayer::Active;
        fresh.strength = 0.31;
        fresh.last_interaction_at = Some(Utc::now());
        storage.save_relationship(&fresh).await.unwrap();

        let mut casual = RelationshipStrength::new("alice".into(), "dan".into());
        casual.strength = 0.01;
        storage.save_relationship(&casual).await.unwrap();

        let at_risk = at_risk_relationships(&storage, "alice").await.unwrap();
        assert_eq!(at_risk.len(), 1);
        assert_eq!(at_risk[0].friend_id, "bob");
    }

    #[tokio::test]
    async fn daily_briefing_is_persisted() {
        let storage = memory_storage().await;
        let briefing = generate_daily_briefing(&storage, "alice").await.unwrap();
        let listed = storage.list_briefings("alice", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, briefing.id);
        assert_eq!(briefing.briefing_type, BriefingType::Daily);
    }

    #[tokio::test]
    async fn weekly_briefing_counts_new_pearls() {
        let storage = memory_storage().await;
        let pearl = Pearl {
            id: Uuid::new_v4(),
            owner_id: "alice".into(),
            pearl_type: PearlType::Insight,
            trigger_text: "t".into(),
            body: None,
            context: None,
            domain_tags: vec![],
            luster: 0.5,
            shareability: Shareability::Private,
            origin_type: PearlOriginType::Manual,
            created_at: Utc::now(),
        };
        storage.create_pearl(&pearl).await.unwrap();
        let briefing = generate_weekly_briefing(&storage, "alice").await.unwrap();
        assert!(briefing.raw_data["newPearls"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn micro_molt_disable_suggestion_becomes_block_rule() {
        let storage = memory_storage().await;
        let reflex = Reflex {
            id: Uuid::new_v4(),
            claw_id: "alice".into(),
            name: "noisy".into(),
            value_layer: "l0".into(),
            behavior: "autoreply".into(),
            trigger_layer: TriggerLayer::L0,
            trigger_config: serde_json::json!({"eventKind": "message.new"}),
            enabled: true,
            confidence: 0.9,
            source: ReflexSource::Builtin,
        };
        storage.create_reflex(&reflex).await.unwrap();
        for _ in 0..6 {
            let execution = clawbuds_proto::ReflexExecution {
                id: Uuid::new_v4(),
                reflex_id: reflex.id,
                event_id: Uuid::new_v4(),
                claw_id: "alice".into(),
                outcome: clawbuds_proto::ExecutionOutcome::Blocked,
                detail: None,
                created_at: Utc::now(),
            };
            storage.record_execution(&execution).await.unwrap();
        }

        let suggestions = micro_molt_suggestions(&storage, "alice").await.unwrap();
        assert!(!suggestions.is_empty());
        let disable = suggestions.iter().find(|s| s.proposed_diff["decision"] == "block").unwrap();

        let applied = apply_micro_molt(&storage, disable).await.unwrap().unwrap();
        assert_eq!(applied.version, 1);
        let rules = clawbuds_proto::rules_from_document(&applied.document);
        assert!(rules.iter().any(|r| r.action_pattern == "autoreply"));
    }
}
