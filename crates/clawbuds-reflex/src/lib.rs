//! Reflex trigger matching, execution logging, and the five usage-pattern
//! analyses that feed carapace-amendment suggestions.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use clawbuds_eventbus::Subscriber;
use clawbuds_proto::{
    evaluate_rules, rules_from_document, CarapaceDecision, Event, ExecutionOutcome, Reflex, ReflexExecution,
    ReflexSuggestion, SuggestionKind, MAX_SUGGESTIONS,
};
use clawbuds_storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Confidence threshold above which a matched reflex executes immediately
/// rather than surfacing as a confirm-first recommendation.
pub const AUTO_EXECUTE_CONFIDENCE: f64 = 0.8;
/// Rate-limit window and per-window cap applied before the carapace gate.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;
pub const RATE_LIMIT_MAX_PER_WINDOW: u64 = 5;

/// A reflex's `trigger_config` is a tag-based selector: `eventKind` (the
/// event's wire name, e.g. `"message.new"`) and/or `tags` (intersected
/// against `event.data.tags`). At least one selector key must be present —
/// an empty trigger config matches nothing, rather than everything.
fn matches_trigger(trigger_config: &serde_json::Value, event: &Event) -> bool {
    let mut matched_any_key = false;

    if let Some(kind) = trigger_config.get("eventKind").and_then(|v| v.as_str()) {
        matched_any_key = true;
        if kind != event.kind.as_wire_name() {
            return false;
        }
    }

    if let Some(wanted) = trigger_config.get("tags").and_then(|v| v.as_array()) {
        matched_any_key = true;
        let event_tags: Vec<&str> = event.data.get("tags").and_then(|v| v.as_array()).map_or(vec![], |arr| {
            arr.iter().filter_map(|t| t.as_str()).collect()
        });
        let wanted: Vec<&str> = wanted.iter().filter_map(|t| t.as_str()).collect();
        if !wanted.iter().any(|t| event_tags.contains(t)) {
            return false;
        }
    }

    matched_any_key
}

/// Runs every enabled reflex owned by `event.claw_id` against `event`,
/// recording one [`ReflexExecution`] per match (deduplicated at-most-once
/// by `(event_id, reflex_id)` in storage). Returns the executions actually
/// recorded — a reflex whose execution was already recorded for this event
/// is skipped, not re-returned.
pub async fn dispatch_event(storage: &Storage, event: &Event) -> StorageResult<Vec<ReflexExecution>> {
    let reflexes = storage.list_enabled_reflexes(&event.claw_id).await?;
    let mut recorded = Vec::new();

    for reflex in reflexes.iter().filter(|r| matches_trigger(&r.trigger_config, event)) {
        let outcome = decide_outcome(storage, reflex).await?;
        let execution = ReflexExecution {
            id: Uuid::new_v4(),
            reflex_id: reflex.id,
            event_id: event.id,
            claw_id: event.claw_id.clone(),
            outcome,
            detail: None,
            created_at: Utc::now(),
        };
        if storage.record_execution(&execution).await? {
            recorded.push(execution);
        }
    }
    Ok(recorded)
}

async fn decide_outcome(storage: &Storage, reflex: &Reflex) -> StorageResult<ExecutionOutcome> {
    let rules = match storage.current_carapace(&reflex.claw_id).await? {
        Some(history) => rules_from_document(&history.document),
        None => Vec::new(),
    };
    if evaluate_rules(&rules, &reflex.behavior) == CarapaceDecision::Block {
        return Ok(ExecutionOutcome::Blocked);
    }

    let window_start = Utc::now() - Duration::seconds(RATE_LIMIT_WINDOW_SECS);
    let recent = storage.reflex_stats(reflex.id, window_start).await?;
    if recent.total >= RATE_LIMIT_MAX_PER_WINDOW {
        return Ok(ExecutionOutcome::Blocked);
    }

    if reflex.trigger_layer == clawbuds_proto::TriggerLayer::L1 {
        return Ok(ExecutionOutcome::QueuedForL1);
    }

    Ok(if reflex.confidence >= AUTO_EXECUTE_CONFIDENCE {
        ExecutionOutcome::Executed
    } else {
        ExecutionOutcome::Recommended
    })
}

/// Reflexes with heavy recent blocking are candidates to disable outright.
async fn rejection_pattern(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    let since = Utc::now() - Duration::days(7);
    let reflexes = storage.list_enabled_reflexes(claw_id).await?;
    let mut suggestions = Vec::new();
    for reflex in &reflexes {
        let stats = storage.reflex_stats(reflex.id, since).await?;
        if stats.total >= 5 && stats.blocked_rate() > 0.8 {
            suggestions.push(ReflexSuggestion {
                reflex_id: Some(reflex.id),
                friend_id: None,
                kind: SuggestionKind::Disable,
                confidence: stats.blocked_rate().min(0.9),
                reason: format!("{} blocked {:.0}% of {} attempts in the last 7 days", reflex.name, stats.blocked_rate() * 100.0, stats.total),
            });
        }
    }
    Ok(suggestions)
}

fn modal_hour(timestamps: impl Iterator<Item = DateTime<Utc>>) -> Option<u32> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for ts in timestamps {
        *counts.entry(ts.hour()).or_default() += 1;
    }
    counts.into_iter().max_by_key(|&(_, count)| count).map(|(hour, _)| hour)
}

/// A consistent acknowledgement hour far from the 20:00 default suggests
/// re-timing the daily briefing delivery.
async fn reading_pattern(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    const DEFAULT_ACK_HOUR: u32 = 20;
    let briefings = storage.list_briefings(claw_id, 14).await?;
    let daily: Vec<_> = briefings.into_iter().filter(|b| b.briefing_type == clawbuds_proto::BriefingType::Daily).collect();
    let acked: Vec<DateTime<Utc>> = daily.iter().filter_map(|b| b.acknowledged_at).collect();

    if acked.len() < 5 {
        return Ok(Vec::new());
    }
    let Some(hour) = modal_hour(acked.iter().copied()) else { return Ok(Vec::new()) };
    let diff = (hour as i32 - DEFAULT_ACK_HOUR as i32).abs();
    if diff <= 1 {
        return Ok(Vec::new());
    }
    Ok(vec![ReflexSuggestion {
        reflex_id: None,
        friend_id: None,
        kind: SuggestionKind::Timing,
        confidence: (acked.len() as f64 / 14.0).min(0.9),
        reason: format!("briefings are usually acknowledged around {hour:02}:00 UTC, not the default 20:00"),
    }])
}

/// Unreplied-to "grooming"-tagged direct messages (`content_warning =
/// "grooming"`) toward one friend are an escalation signal; a healthy
/// reply rate is an allow signal.
async fn grooming_pattern(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    let since = Utc::now() - Duration::days(30);
    let relationships = storage.list_relationships_for_owner(claw_id).await?;
    let mut suggestions = Vec::new();

    for r in &relationships {
        let sent = storage.list_direct_messages(claw_id, &r.friend_id, since).await?;
        let grooming: Vec<Uuid> =
            sent.iter().filter(|m| m.content_warning.as_deref() == Some("grooming")).map(|m| m.id).collect();
        if grooming.len() < 5 {
            continue;
        }
        let replies = storage.count_replies_to(&r.friend_id, &grooming).await?;
        let reply_rate = replies as f64 / grooming.len() as f64;
        if reply_rate == 0.0 {
            suggestions.push(ReflexSuggestion {
                reflex_id: None,
                friend_id: Some(r.friend_id.clone()),
                kind: SuggestionKind::Escalate,
                confidence: (grooming.len() as f64 / 10.0).min(0.9),
                reason: format!("{} grooming messages to {} went unanswered", grooming.len(), r.friend_id),
            });
        } else if reply_rate >= 0.6 {
            suggestions.push(ReflexSuggestion {
                reflex_id: None,
                friend_id: Some(r.friend_id.clone()),
                kind: SuggestionKind::Allow,
                confidence: reply_rate,
                reason: format!("{} replies reliably to grooming messages ({:.0}% reply rate)", r.friend_id, reply_rate * 100.0),
            });
        }
    }
    Ok(suggestions)
}

/// Highly-endorsed pearls (proxied by `luster`) are candidates for
/// auto-routing; poorly-endorsed ones should escalate to manual review.
async fn pearl_routing_pattern(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    let pearls = storage.list_pearls_by_owner(claw_id).await?;
    let mut suggestions = Vec::new();
    for pearl in &pearls {
        let sample = storage.list_endorsements(pearl.id).await?.len();
        if sample < 3 {
            continue;
        }
        if pearl.luster > 0.6 {
            suggestions.push(ReflexSuggestion {
                reflex_id: None,
                friend_id: None,
                kind: SuggestionKind::Allow,
                confidence: pearl.luster,
                reason: format!("pearl {} is consistently well-endorsed ({sample} endorsements)", pearl.id),
            });
        } else if pearl.luster < 0.2 {
            suggestions.push(ReflexSuggestion {
                reflex_id: None,
                friend_id: None,
                kind: SuggestionKind::Escalate,
                confidence: (1.0 - pearl.luster).min(0.9),
                reason: format!("pearl {} is poorly endorsed ({sample} endorsements)", pearl.id),
            });
        }
    }
    Ok(suggestions)
}

/// A full core layer or an oversized casual layer are both candidates for
/// an "allow more automatic triage" suggestion.
async fn dunbar_coverage_pattern(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    let relationships = storage.list_relationships_for_owner(claw_id).await?;
    let core = relationships.iter().filter(|r| r.dunbar_layer == clawbuds_proto::DunbarLayer::Core).count();
    let casual = relationships.iter().filter(|r| r.dunbar_layer == clawbuds_proto::DunbarLayer::Casual).count();

    let mut suggestions = Vec::new();
    if core >= 5 {
        suggestions.push(ReflexSuggestion {
            reflex_id: None,
            friend_id: None,
            kind: SuggestionKind::Allow,
            confidence: (core as f64 / 5.0).min(1.0),
            reason: format!("core layer is full ({core} relationships)"),
        });
    }
    if casual > 100 {
        suggestions.push(ReflexSuggestion {
            reflex_id: None,
            friend_id: None,
            kind: SuggestionKind::Allow,
            confidence: (casual as f64 / 100.0).min(1.0),
            reason: format!("casual layer is oversized ({casual} relationships)"),
        });
    }
    Ok(suggestions)
}

/// Runs all five pattern analyses and returns at most [`MAX_SUGGESTIONS`],
/// sorted by confidence descending.
pub async fn suggestions_for_owner(storage: &Storage, claw_id: &str) -> StorageResult<Vec<ReflexSuggestion>> {
    let mut all = Vec::new();
    all.extend(rejection_pattern(storage, claw_id).await?);
    all.extend(reading_pattern(storage, claw_id).await?);
    all.extend(grooming_pattern(storage, claw_id).await?);
    all.extend(pearl_routing_pattern(storage, claw_id).await?);
    all.extend(dunbar_coverage_pattern(storage, claw_id).await?);

    all.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    all.truncate(MAX_SUGGESTIONS);
    Ok(all)
}

/// Feeds every event through [`dispatch_event`]; matching is cheap (an
/// in-memory trigger_config scan) so this subscribes to the whole bus
/// rather than filtering by `EventKind` up front.
pub struct ReflexSubscriber {
    storage: Arc<Storage>,
}

impl ReflexSubscriber {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Subscriber for ReflexSubscriber {
    fn name(&self) -> &str {
        "reflex"
    }

    async fn handle(&self, event: &Event) {
        if let Err(err) = dispatch_event(&self.storage, event).await {
            warn!(kind = ?event.kind, error = %err, "reflex dispatch failed for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::{EventKind, ReflexSource, TriggerLayer};

    async fn memory_storage() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    fn reflex(claw_id: &str, trigger_config: serde_json::Value, confidence: f64) -> Reflex {
        Reflex {
            id: Uuid::new_v4(),
            claw_id: claw_id.to_string(),
            name: "test-reflex".into(),
            value_layer: "l0".into(),
            behavior: "autoreply".into(),
            trigger_layer: TriggerLayer::L0,
            trigger_config,
            enabled: true,
            confidence,
            source: ReflexSource::Builtin,
        }
    }

    #[test]
    fn trigger_matches_on_event_kind() {
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));
        assert!(matches_trigger(&serde_json::json!({"eventKind": "message.new"}), &event));
        assert!(!matches_trigger(&serde_json::json!({"eventKind": "message.edited"}), &event));
    }

    #[test]
    fn empty_trigger_config_matches_nothing() {
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));
        assert!(!matches_trigger(&serde_json::json!({}), &event));
    }

    #[tokio::test]
    async fn dispatch_executes_high_confidence_match() {
        let storage = memory_storage().await;
        storage.create_reflex(&reflex("alice", serde_json::json!({"eventKind": "message.new"}), 0.95)).await.unwrap();
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));

        let executions = dispatch_event(&storage, &event).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].outcome, ExecutionOutcome::Executed);
    }

    #[tokio::test]
    async fn dispatch_recommends_low_confidence_match() {
        let storage = memory_storage().await;
        storage.create_reflex(&reflex("alice", serde_json::json!({"eventKind": "message.new"}), 0.3)).await.unwrap();
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));

        let executions = dispatch_event(&storage, &event).await.unwrap();
        assert_eq!(executions[0].outcome, ExecutionOutcome::Recommended);
    }

    #[tokio::test]
    async fn carapace_block_rule_overrides_confidence() {
        let storage = memory_storage().await;
        storage.create_reflex(&reflex("alice", serde_json::json!({"eventKind": "message.new"}), 0.95)).await.unwrap();
        storage
            .propose_carapace_amendment(
                "alice",
                &serde_json::json!({"rules": [{"action_pattern": "autoreply", "decision": "block"}]}),
                clawbuds_proto::CarapaceSource::Manual,
            )
            .await
            .unwrap();
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));

        let executions = dispatch_event(&storage, &event).await.unwrap();
        assert_eq!(executions[0].outcome, ExecutionOutcome::Blocked);
    }

    #[tokio::test]
    async fn same_event_does_not_record_twice() {
        let storage = memory_storage().await;
        let r = reflex("alice", serde_json::json!({"eventKind": "message.new"}), 0.95);
        storage.create_reflex(&r).await.unwrap();
        let event = Event::new(EventKind::MessageNew, "alice", serde_json::json!({}));

        let first = dispatch_event(&storage, &event).await.unwrap();
        let second = dispatch_event(&storage, &event).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }

    #[tokio::test]
    async fn suggestions_are_capped_and_sorted() {
        let storage = memory_storage().await;
        for i in 0..8u32 {
            let mut r = reflex("alice", serde_json::json!({"eventKind": "message.new"}), 0.1);
            r.name = format!("r{i}");
            storage.create_reflex(&r).await.unwrap();
            let since = Utc::now() - Duration::days(1);
            for _ in 0..6 {
                let execution = ReflexExecution {
                    id: Uuid::new_v4(),
                    reflex_id: r.id,
                    event_id: Uuid::new_v4(),
                    claw_id: "alice".into(),
                    outcome: ExecutionOutcome::Blocked,
                    detail: None,
                    created_at: since,
                };
                storage.record_execution(&execution).await.unwrap();
            }
        }
        let suggestions = suggestions_for_owner(&storage, "alice").await.unwrap();
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        for pair in suggestions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
