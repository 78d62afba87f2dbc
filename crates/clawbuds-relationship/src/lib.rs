//! The daily relationship-strength pass: decay, Dunbar reclassification, and
//! the interaction-boost handler that feeds off the event bus.

#![forbid(unsafe_code)]

use chrono::Utc;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{DunbarLayer, EventKind, InteractionKind, DEFAULT_DAILY_BOOST_CAP};
use clawbuds_storage::{Storage, StorageResult};
use std::sync::Arc;
use tracing::{error, info, warn};

fn daily_boost_cap() -> f64 {
    std::env::var("CLAWBUDS_DAILY_BOOST_CAP")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(DEFAULT_DAILY_BOOST_CAP)
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// The piecewise decay multiplier applied to a strength `s` before today's
/// interaction boost is added.
pub fn decay(s: f64) -> f64 {
    if s < 0.3 {
        0.95 + s * 0.1
    } else if s < 0.6 {
        0.98 + (s - 0.3) * 0.05
    } else if s < 0.8 {
        0.995 + (s - 0.6) * 0.02
    } else {
        0.999
    }
}

/// Applies one interaction's strength boost, respecting the per-`(claw,
/// friend, UTC day)` cap, and touches `last_interaction_at`. Call this from
/// the event-bus subscriber that watches for `message`/`reaction`/
/// `heartbeat`/`pearl_share`/`poll_vote` events.
pub async fn apply_interaction_boost(
    storage: &Storage,
    claw_id: &str,
    friend_id: &str,
    kind: InteractionKind,
) -> StorageResult<()> {
    let today = today_utc();
    let cap = daily_boost_cap();
    let used = storage.daily_boost_used(claw_id, friend_id, &today).await?;
    if used >= cap {
        return Ok(());
    }

    let weight = kind.default_weight();
    let allowed = (cap - used).max(0.0).min(weight);
    if allowed <= 0.0 {
        return Ok(());
    }

    let mut r = storage.get_or_create_relationship(claw_id, friend_id).await?;
    r.strength = (r.strength + allowed).min(1.0);
    r.last_interaction_at = Some(Utc::now());
    storage.save_relationship(&r).await?;
    storage.add_daily_boost_used(claw_id, friend_id, &today, allowed).await?;
    Ok(())
}

/// Runs decay + Dunbar reclassification for every owner with at least one
/// stored relationship. A failure processing one owner is logged and does
/// not stop the pass for the rest — mirrors the isolated per-entity sweep
/// used elsewhere in this workspace.
pub async fn run_daily_pass(storage: &Storage, events: &EventBus) {
    let owners = match storage.list_owners_with_relationships().await {
        Ok(owners) => owners,
        Err(err) => {
            error!(error = %err, "failed to list relationship owners for the daily pass");
            return;
        }
    };

    for claw_id in owners {
        if let Err(err) = decay_and_reclassify_owner(storage, events, &claw_id).await {
            warn!(claw_id, error = %err, "daily relationship pass failed for this owner");
        }
    }

    let today = today_utc();
    if let Err(err) = storage.prune_daily_boosts_before(&today).await {
        warn!(error = %err, "failed to prune stale daily boost rows");
    }
}

/// Sorts by strength descending and walks [`DunbarLayer::RECLASSIFY_ORDER`],
/// assigning each relationship to the first layer whose threshold and
/// remaining capacity both admit it. Records with `manual_override = true`
/// keep their stored layer. Returns the set of `(claw_id, friend_id)` pairs
/// whose layer changed, for emitting `relationship.layer_changed`.
fn reclassify(relationships: &mut [clawbuds_proto::RelationshipStrength]) -> Vec<(String, String, DunbarLayer)> {
    relationships.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));

    let mut remaining: std::collections::HashMap<DunbarLayer, Option<usize>> =
        DunbarLayer::RECLASSIFY_ORDER.iter().map(|&layer| (layer, layer.capacity())).collect();
    let mut changed = Vec::new();

    for r in relationships.iter_mut() {
        if r.manual_override {
            continue;
        }
        let previous = r.dunbar_layer;
        for &layer in DunbarLayer::RECLASSIFY_ORDER.iter() {
            let admits_threshold = r.strength >= layer.threshold();
            let slot = remaining.get_mut(&layer).expect("every layer has a remaining-capacity entry");
            let admits_capacity = match slot {
                Some(remaining_count) => *remaining_count > 0,
                None => true,
            };
            if admits_threshold && admits_capacity {
                r.dunbar_layer = layer;
                if let Some(remaining_count) = slot {
                    *remaining_count -= 1;
                }
                break;
            }
        }
        if r.dunbar_layer != previous {
            changed.push((r.claw_id.clone(), r.friend_id.clone(), r.dunbar_layer));
        }
    }
    changed
}

/// Runs decay for one owner, reclassifies, persists, and emits
/// `relationship.layer_changed` for every record whose layer moved. Split out
/// from [`run_daily_pass_for_owner`] for direct use/testing.
pub async fn decay_and_reclassify_owner(storage: &Storage, events: &EventBus, claw_id: &str) -> StorageResult<()> {
    let mut relationships = storage.list_relationships_for_owner(claw_id).await?;

    for r in relationships.iter_mut().filter(|r| !r.manual_override) {
        r.strength = (r.strength * decay(r.strength)).max(0.0).min(1.0);
    }

    let changed = reclassify(&mut relationships);

    for r in &relationships {
        storage.save_relationship(r).await?;
    }

    for (claw_id, friend_id, new_layer) in changed {
        info!(claw_id, friend_id, layer = ?new_layer, "relationship layer changed");
        events.publish_kind(
            EventKind::RelationshipLayerChanged,
            claw_id.clone(),
            serde_json::json!({ "friendId": friend_id, "layer": new_layer }),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::RelationshipStrength;

    #[test]
    fn decay_matches_each_band() {
        assert!((decay(0.0) - 0.95).abs() < 1e-9);
        assert!((decay(0.3) - 0.98).abs() < 1e-9);
        assert!((decay(0.6) - 0.995).abs() < 1e-9);
        assert!((decay(0.8) - 0.999).abs() < 1e-9);
        assert!((decay(1.0) - 0.999).abs() < 1e-9);
    }

    fn rel(friend: &str, strength: f64) -> RelationshipStrength {
        let mut r = RelationshipStrength::new("alice".into(), friend.into());
        r.strength = strength;
        r
    }

    #[test]
    fn reclassify_respects_thresholds_and_capacity() {
        let mut rels = vec![rel("a", 0.9), rel("b", 0.85), rel("c", 0.5), rel("d", 0.1)];
        reclassify(&mut rels);
        assert_eq!(rels[0].dunbar_layer, DunbarLayer::Core);
        assert_eq!(rels[1].dunbar_layer, DunbarLayer::Core);
        assert_eq!(rels[2].dunbar_layer, DunbarLayer::Active);
        assert_eq!(rels[3].dunbar_layer, DunbarLayer::Casual);
    }

    #[test]
    fn manual_override_is_never_reassigned() {
        let mut r = rel("a", 0.1);
        r.manual_override = true;
        r.dunbar_layer = DunbarLayer::Core;
        let mut rels = vec![r];
        let changed = reclassify(&mut rels);
        assert!(changed.is_empty());
        assert_eq!(rels[0].dunbar_layer, DunbarLayer::Core);
    }

    #[test]
    fn core_capacity_overflows_into_sympathy() {
        let mut rels: Vec<_> = (0..7).map(|i| rel(&format!("f{i}"), 0.85)).collect();
        reclassify(&mut rels);
        let core_count = rels.iter().filter(|r| r.dunbar_layer == DunbarLayer::Core).count();
        let sympathy_count = rels.iter().filter(|r| r.dunbar_layer == DunbarLayer::Sympathy).count();
        assert_eq!(core_count, 5);
        assert_eq!(sympathy_count, 2);
    }
}
