//! Trust-score bookkeeping and pearl luster recomputation, both driven off
//! the event bus.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use clawbuds_eventbus::Subscriber;
use clawbuds_proto::{Event, EventKind, PearlEndorsement, OVERALL_DOMAIN};
use clawbuds_storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// `Q` adjustment applied on a high-score (> 0.7) pearl endorsement.
pub const Q_HIGH_ENDORSEMENT_BUMP: f64 = 0.05;
/// `Q` adjustment applied on a low-score (< 0.3) pearl endorsement.
pub const Q_LOW_ENDORSEMENT_PENALTY: f64 = 0.05;
/// Flat luster bonus applied when a thread contribution references a pearl,
/// on top of the endorsement-weighted recomputation.
pub const LUSTER_THREAD_CONTRIBUTION_BONUS: f64 = 0.02;

/// `friend.accepted`: seed both directional relationship records and the
/// default trust score for the new friend in the catch-all domain.
pub async fn handle_friend_accepted(storage: &Storage, claw_id: &str, friend_id: &str) -> StorageResult<()> {
    storage.get_or_create_relationship(claw_id, friend_id).await?;
    storage.get_or_create_relationship(friend_id, claw_id).await?;
    storage.get_or_create_trust(claw_id, friend_id, OVERALL_DOMAIN).await?;
    storage.get_or_create_trust(friend_id, claw_id, OVERALL_DOMAIN).await?;
    Ok(())
}

/// `relationship.layer_changed`: recompute the pair's composite from its
/// current `h`/`q` — the layer move itself doesn't change either input, but
/// the recompute keeps `composite` current if `h`/`q` drifted since the last
/// save without a matching recompute (e.g. a direct migration write).
pub async fn handle_layer_changed(storage: &Storage, claw_id: &str, friend_id: &str) -> StorageResult<()> {
    let mut t = storage.get_or_create_trust(claw_id, friend_id, OVERALL_DOMAIN).await?;
    t.recompute_composite();
    storage.save_trust(&t).await?;
    Ok(())
}

/// `pearl.endorsed`: nudges `Q` for `(ownerId, endorserId, domain)` based on
/// the endorsement score. `domain` is the pearl's first domain tag, or
/// [`OVERALL_DOMAIN`] if it has none.
pub async fn handle_pearl_endorsed(
    storage: &Storage,
    owner_id: &str,
    endorser_id: &str,
    domain: &str,
    score: f64,
) -> StorageResult<()> {
    if !(score > 0.7 || score < 0.3) {
        return Ok(());
    }
    let mut t = storage.get_or_create_trust(owner_id, endorser_id, domain).await?;
    if score > 0.7 {
        t.q = (t.q + Q_HIGH_ENDORSEMENT_BUMP).min(1.0);
    } else {
        t.q = (t.q - Q_LOW_ENDORSEMENT_PENALTY).max(0.0);
    }
    t.recompute_composite();
    storage.save_trust(&t).await?;
    Ok(())
}

fn weighted_luster(endorsements: &[PearlEndorsement], trust_by_endorser: &HashMap<String, f64>) -> f64 {
    if endorsements.is_empty() {
        return 0.5;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for e in endorsements {
        let weight = trust_by_endorser.get(&e.endorser_id).copied().unwrap_or(0.5).max(0.01);
        weighted_sum += e.score * weight;
        weight_total += weight;
    }
    (weighted_sum / weight_total).clamp(0.0, 1.0)
}

/// Recomputes a pearl's luster from its endorsements, weighted by each
/// endorser's trust composite in the pearl's primary domain. A real
/// recompute loads every endorser's trust record; when `trust_by_endorser`
/// already has an entry (warm path) it's reused instead of hitting storage.
pub async fn update_luster(storage: &Storage, pearl_id: Uuid) -> StorageResult<Option<f64>> {
    let Some(pearl) = storage.get_pearl(pearl_id).await? else { return Ok(None) };
    let endorsements = storage.list_endorsements(pearl_id).await?;

    let mut trust_by_endorser = HashMap::with_capacity(endorsements.len());
    for e in &endorsements {
        let t = storage.get_or_create_trust(&pearl.owner_id, &e.endorser_id, pearl.primary_domain()).await?;
        trust_by_endorser.insert(e.endorser_id.clone(), t.composite);
    }

    let luster = weighted_luster(&endorsements, &trust_by_endorser);
    storage.set_pearl_luster(pearl_id, luster).await?;
    Ok(Some(luster))
}

/// `thread.contribution_added` with `contentType = pearl_ref`: recomputes
/// luster as above, then applies the flat contribution bonus on top. A
/// no-op if `pearl_id` doesn't resolve to a stored pearl.
pub async fn update_luster_for_contribution(storage: &Storage, pearl_id: Uuid) -> StorageResult<Option<f64>> {
    let Some(base) = update_luster(storage, pearl_id).await? else { return Ok(None) };
    let bumped = (base + LUSTER_THREAD_CONTRIBUTION_BONUS).min(1.0);
    storage.set_pearl_luster(pearl_id, bumped).await?;
    Ok(Some(bumped))
}

/// Wires the trust-update rules above to the four events that drive them.
pub struct TrustSubscriber {
    storage: Arc<Storage>,
}

impl TrustSubscriber {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Subscriber for TrustSubscriber {
    fn name(&self) -> &str {
        "trust"
    }

    async fn handle(&self, event: &Event) {
        let result = match event.kind {
            EventKind::FriendAccepted => {
                let Some(friend_id) = event.data.get("friendId").and_then(|v| v.as_str()) else { return };
                handle_friend_accepted(&self.storage, &event.claw_id, friend_id).await
            }
            EventKind::RelationshipLayerChanged => {
                let Some(friend_id) = event.data.get("friendId").and_then(|v| v.as_str()) else { return };
                handle_layer_changed(&self.storage, &event.claw_id, friend_id).await
            }
            EventKind::PearlEndorsed => {
                let (Some(owner_id), Some(endorser_id), Some(score)) = (
                    event.data.get("ownerId").and_then(|v| v.as_str()),
                    event.data.get("endorserId").and_then(|v| v.as_str()),
                    event.data.get("score").and_then(|v| v.as_f64()),
                ) else {
                    return;
                };
                let domain = event.data.get("domain").and_then(|v| v.as_str()).unwrap_or(OVERALL_DOMAIN);
                let r1 = handle_pearl_endorsed(&self.storage, owner_id, endorser_id, domain, score).await;
                let Some(pearl_id) = event.data.get("pearlId").and_then(|v| v.as_str()) else { return };
                let Ok(pearl_id) = Uuid::parse_str(pearl_id) else { return };
                let r2 = update_luster(&self.storage, pearl_id).await.map(|_| ());
                r1.and(r2)
            }
            EventKind::ThreadContributionAdded => {
                if event.data.get("contentType").and_then(|v| v.as_str()) != Some("pearl_ref") {
                    return;
                }
                let Some(pearl_id) = event.data.get("pearlRefId").and_then(|v| v.as_str()) else { return };
                let Ok(pearl_id) = Uuid::parse_str(pearl_id) else { return };
                update_luster_for_contribution(&self.storage, pearl_id).await.map(|_| ())
            }
            _ => return,
        };
        if let Err(err) = result {
            warn!(kind = ?event.kind, error = %err, "trust subscriber failed to process event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::{Pearl, PearlOriginType, PearlType, Shareability};

    async fn memory_storage() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn high_score_endorsement_bumps_q() {
        let storage = memory_storage().await;
        handle_pearl_endorsed(&storage, "alice", "bob", "AI", 0.9).await.unwrap();
        let t = storage.get_trust("alice", "bob", "AI").await.unwrap().unwrap();
        assert!(t.q > 0.5);
    }

    #[tokio::test]
    async fn low_score_endorsement_penalizes_q() {
        let storage = memory_storage().await;
        handle_pearl_endorsed(&storage, "alice", "bob", "AI", 0.1).await.unwrap();
        let t = storage.get_trust("alice", "bob", "AI").await.unwrap().unwrap();
        assert!(t.q < 0.5);
    }

    #[tokio::test]
    async fn mid_score_endorsement_is_ignored() {
        let storage = memory_storage().await;
        handle_pearl_endorsed(&storage, "alice", "bob", "AI", 0.5).await.unwrap();
        assert!(storage.get_trust("alice", "bob", "AI").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn friend_accepted_seeds_both_directions() {
        let storage = memory_storage().await;
        handle_friend_accepted(&storage, "alice", "bob").await.unwrap();
        assert!(storage.get_relationship("alice", "bob").await.unwrap().is_some());
        assert!(storage.get_relationship("bob", "alice").await.unwrap().is_some());
        assert!(storage.get_trust("alice", "bob", OVERALL_DOMAIN).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn luster_recompute_weights_by_endorser_trust() {
        let storage = memory_storage().await;
        let pearl = Pearl {
            id: Uuid::new_v4(),
            owner_id: "alice".into(),
            pearl_type: PearlType::Insight,
            trigger_text: "t".into(),
            body: None,
            context: None,
            domain_tags: vec!["AI".into()],
            luster: 0.5,
            shareability: Shareability::FriendsOnly,
            origin_type: PearlOriginType::Manual,
            created_at: chrono::Utc::now(),
        };
        storage.create_pearl(&pearl).await.unwrap();
        storage
            .upsert_endorsement(&PearlEndorsement {
                pearl_id: pearl.id,
                endorser_id: "bob".into(),
                score: 1.0,
                comment: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let luster = update_luster(&storage, pearl.id).await.unwrap().unwrap();
        assert!(luster > 0.4);

        let bumped = update_luster_for_contribution(&storage, pearl.id).await.unwrap().unwrap();
        assert!(bumped >= luster);
    }
}
