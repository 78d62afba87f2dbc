//! Pearls: creation, sharing, and endorsement. Endorsement only records the
//! score and emits `pearl.endorsed`; the trust-score nudge and luster
//! recompute that follow from it live in the trust crate, reacting off the
//! event bus rather than being called directly from here.

use crate::error::storage_err;
use chrono::Utc;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{ApiError, EventKind, Pearl, PearlEndorsement, PearlOriginType, PearlShare, PearlType, Shareability};
use clawbuds_storage::Storage;
use uuid::Uuid;

pub async fn create_pearl(
    storage: &Storage,
    owner_id: &str,
    pearl_type: PearlType,
    trigger_text: &str,
    body: Option<&str>,
    context: Option<&str>,
    domain_tags: Vec<String>,
    shareability: Shareability,
) -> Result<Pearl, ApiError> {
    if trigger_text.trim().is_empty() {
        return Err(ApiError::validation("triggerText must not be empty"));
    }
    let pearl = Pearl {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        pearl_type,
        trigger_text: trigger_text.to_string(),
        body: body.map(str::to_string),
        context: context.map(str::to_string),
        domain_tags,
        luster: 0.5,
        shareability,
        origin_type: PearlOriginType::Manual,
        created_at: Utc::now(),
    };
    storage.create_pearl(&pearl).await.map_err(storage_err)?;
    Ok(pearl)
}

pub async fn list_pearls(storage: &Storage, owner_id: &str) -> Result<Vec<Pearl>, ApiError> {
    storage.list_pearls_by_owner(owner_id).await.map_err(storage_err)
}

/// A repeat endorsement from the same claw overwrites its prior score
/// (spec.md §8 property 5 / S5).
pub async fn endorse_pearl(
    storage: &Storage,
    events: &EventBus,
    endorser_id: &str,
    pearl_id: Uuid,
    score: f64,
    comment: Option<&str>,
) -> Result<(), ApiError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(ApiError::validation("score must be within [0, 1]"));
    }
    let pearl = storage.get_pearl(pearl_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such pearl"))?;
    if pearl.owner_id == endorser_id {
        return Err(ApiError::not_authorized("a claw cannot endorse its own pearl"));
    }
    storage
        .upsert_endorsement(&PearlEndorsement {
            pearl_id,
            endorser_id: endorser_id.to_string(),
            score,
            comment: comment.map(str::to_string),
            created_at: Utc::now(),
        })
        .await
        .map_err(storage_err)?;

    events.publish_kind(
        EventKind::PearlEndorsed,
        pearl.owner_id.clone(),
        serde_json::json!({
            "pearlId": pearl_id,
            "ownerId": pearl.owner_id,
            "endorserId": endorser_id,
            "domain": pearl.primary_domain(),
            "score": score,
        }),
    );
    Ok(())
}

pub async fn share_pearl(storage: &Storage, events: &EventBus, from_claw_id: &str, pearl_id: Uuid, to_claw_id: &str) -> Result<(), ApiError> {
    let pearl = storage.get_pearl(pearl_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such pearl"))?;
    if pearl.owner_id != from_claw_id {
        return Err(ApiError::not_authorized("only the owner can share this pearl"));
    }
    if pearl.shareability == Shareability::Private {
        return Err(ApiError::not_authorized("pearl is marked private"));
    }
    if pearl.shareability == Shareability::FriendsOnly && !storage.are_friends(from_claw_id, to_claw_id).await.map_err(storage_err)? {
        return Err(ApiError::not_authorized("pearl is friends-only"));
    }
    storage
        .create_pearl_share(&PearlShare { id: Uuid::new_v4(), pearl_id, from_claw_id: from_claw_id.to_string(), to_claw_id: to_claw_id.to_string(), created_at: Utc::now() })
        .await
        .map_err(storage_err)?;
    events.publish_kind(EventKind::PearlShared, from_claw_id.to_string(), serde_json::json!({ "pearlId": pearl_id, "toClawId": to_claw_id }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::FriendshipStatus;
    use clawbuds_storage::Storage;

    async fn memory_storage() -> Storage {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn repeat_endorsement_overwrites_and_self_endorsement_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let pearl = create_pearl(&storage, "alice", PearlType::Insight, "t", None, None, vec!["AI".into()], Shareability::FriendsOnly)
            .await
            .unwrap();

        let err = endorse_pearl(&storage, &events, "alice", pearl.id, 0.9, None).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");

        endorse_pearl(&storage, &events, "bob", pearl.id, 0.4, None).await.unwrap();
        endorse_pearl(&storage, &events, "bob", pearl.id, 0.9, None).await.unwrap();
        let endorsements = storage.list_endorsements(pearl.id).await.unwrap();
        assert_eq!(endorsements.len(), 1);
        assert_eq!(endorsements[0].score, 0.9);
    }

    #[tokio::test]
    async fn friends_only_pearl_cannot_be_shared_with_a_stranger() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let pearl = create_pearl(&storage, "alice", PearlType::Insight, "t", None, None, vec![], Shareability::FriendsOnly)
            .await
            .unwrap();
        let err = share_pearl(&storage, &events, "alice", pearl.id, "mallory").await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");

        storage.create_friendship("alice", "bob", FriendshipStatus::Accepted).await.unwrap();
        share_pearl(&storage, &events, "alice", pearl.id, "bob").await.unwrap();
    }
}
