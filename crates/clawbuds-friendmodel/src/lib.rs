//! Heartbeat diff/keepalive computation and the Proxy ToM belief model
//! (`FriendModel`) that each claw keeps about its friends.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use clawbuds_eventbus::{EventBus, Subscriber};
use clawbuds_proto::{Event, EventKind, FriendModel, Heartbeat, HeartbeatState};
use clawbuds_storage::{Storage, StorageResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const EXPERTISE_FIRST_APPEARANCE: f64 = 0.3;
const EXPERTISE_PERSIST_STEP: f64 = 0.05;
const EXPERTISE_ABSENCE_STEP: f64 = 0.02;
const EXPERTISE_PRUNE_BELOW: f64 = 0.1;

/// Computes the next outgoing heartbeat from `from_claw_id` to `to_claw_id`
/// given the current observed state and the last non-keepalive record sent
/// to that friend. Stores only the fields that changed; a keepalive carries
/// none.
pub async fn build_outgoing_heartbeat(
    storage: &Storage,
    from_claw_id: &str,
    to_claw_id: &str,
    current: HeartbeatState,
) -> StorageResult<Heartbeat> {
    let previous = storage.last_payload_heartbeat(from_claw_id, to_claw_id).await?;
    let previous_state = previous.as_ref().map(|h| HeartbeatState {
        interests: h.interests.clone(),
        availability: h.availability.clone(),
        recent_topics: h.recent_topics.clone(),
    });

    let is_keepalive = previous_state.as_ref().is_some_and(|prev| current.unchanged_from(prev));

    let heartbeat = if is_keepalive {
        Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: from_claw_id.to_string(),
            to_claw_id: to_claw_id.to_string(),
            interests: None,
            availability: None,
            recent_topics: None,
            is_keepalive: true,
            created_at: chrono::Utc::now(),
        }
    } else {
        let (interests, availability, recent_topics) = match &previous_state {
            None => (current.interests, current.availability, current.recent_topics),
            Some(prev) => (
                if current.interests != prev.interests { current.interests } else { None },
                if current.availability != prev.availability { current.availability } else { None },
                if current.recent_topics != prev.recent_topics { current.recent_topics } else { None },
            ),
        };
        Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: from_claw_id.to_string(),
            to_claw_id: to_claw_id.to_string(),
            interests,
            availability,
            recent_topics,
            is_keepalive: false,
            created_at: chrono::Utc::now(),
        }
    };

    storage.create_heartbeat(&heartbeat).await?;
    Ok(heartbeat)
}

/// `ProxyToMService.updateFromHeartbeat`: folds a received heartbeat into
/// the receiver's belief model about the sender.
pub async fn update_from_heartbeat(storage: &Storage, receiver_claw_id: &str, heartbeat: &Heartbeat) -> StorageResult<()> {
    let mut model = storage.get_or_create_friend_model(receiver_claw_id, &heartbeat.from_claw_id).await?;
    let now = chrono::Utc::now();

    if heartbeat.is_keepalive {
        model.last_heartbeat_at = Some(now);
        return storage.save_friend_model(&model).await;
    }

    let effective_interests: BTreeSet<String> = match &heartbeat.interests {
        Some(list) => list.iter().cloned().collect(),
        None => model.inferred_interests.clone(),
    };
    if heartbeat.interests.is_some() {
        model.inferred_interests = effective_interests.clone();
    }

    for tag in &effective_interests {
        let entry = model.expertise_tags.entry(tag.clone()).or_insert(0.0);
        *entry = if *entry <= 0.0 { EXPERTISE_FIRST_APPEARANCE } else { (*entry + EXPERTISE_PERSIST_STEP).min(1.0) };
    }
    for (tag, score) in model.expertise_tags.iter_mut() {
        if !effective_interests.contains(tag) {
            *score -= EXPERTISE_ABSENCE_STEP;
        }
    }
    model.expertise_tags.retain(|_, score| *score >= EXPERTISE_PRUNE_BELOW);

    if let Some(topics) = &heartbeat.recent_topics {
        if !topics.is_empty() {
            model.last_known_state = Some(topics.join(", "));
        }
    }

    model.last_heartbeat_at = Some(now);
    storage.save_friend_model(&model).await
}

/// Pairwise non-empty interest intersections across a set of friend models,
/// e.g. for briefing's "friends with shared interests" suggestions.
pub fn interest_overlaps(models: &[FriendModel]) -> Vec<(String, String, BTreeSet<String>)> {
    let mut out = Vec::new();
    for i in 0..models.len() {
        for j in (i + 1)..models.len() {
            let overlap: BTreeSet<String> =
                models[i].inferred_interests.intersection(&models[j].inferred_interests).cloned().collect();
            if !overlap.is_empty() {
                out.push((models[i].friend_id.clone(), models[j].friend_id.clone(), overlap));
            }
        }
    }
    out
}

/// Sends a heartbeat, persists it, and publishes `heartbeat.received` — the
/// single entry point domain code calls on each heartbeat tick.
pub async fn emit_heartbeat(
    storage: &Storage,
    events: &EventBus,
    from_claw_id: &str,
    to_claw_id: &str,
    current: HeartbeatState,
) -> StorageResult<Heartbeat> {
    let heartbeat = build_outgoing_heartbeat(storage, from_claw_id, to_claw_id, current).await?;
    events.publish_kind(
        EventKind::HeartbeatReceived,
        to_claw_id.to_string(),
        serde_json::json!({
            "fromClawId": heartbeat.from_claw_id,
            "isKeepalive": heartbeat.is_keepalive,
            "interests": heartbeat.interests,
            "availability": heartbeat.availability,
            "recentTopics": heartbeat.recent_topics,
        }),
    );
    Ok(heartbeat)
}

pub struct FriendModelSubscriber {
    storage: Arc<Storage>,
}

impl FriendModelSubscriber {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Subscriber for FriendModelSubscriber {
    fn name(&self) -> &str {
        "friendmodel"
    }

    async fn handle(&self, event: &Event) {
        if event.kind != EventKind::HeartbeatReceived {
            return;
        }
        let Some(from_claw_id) = event.data.get("fromClawId").and_then(|v| v.as_str()) else { return };
        let is_keepalive = event.data.get("isKeepalive").and_then(|v| v.as_bool()).unwrap_or(false);
        let interests = event
            .data
            .get("interests")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());
        let availability = event.data.get("availability").and_then(|v| v.as_str()).map(str::to_string);
        let recent_topics = event
            .data
            .get("recentTopics")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());

        let heartbeat = Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: from_claw_id.to_string(),
            to_claw_id: event.claw_id.clone(),
            interests,
            availability,
            recent_topics,
            is_keepalive,
            created_at: event.occurred_at,
        };

        if let Err(err) = update_from_heartbeat(&self.storage, &event.claw_id, &heartbeat).await {
            warn!(error = %err, "friendmodel subscriber failed to fold heartbeat");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::Heartbeat;

    async fn memory_storage() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    fn state(interests: Option<&[&str]>, availability: Option<&str>, topics: Option<&[&str]>) -> HeartbeatState {
        HeartbeatState {
            interests: interests.map(|s| s.iter().map(|s| s.to_string()).collect()),
            availability: availability.map(str::to_string),
            recent_topics: topics.map(|s| s.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[tokio::test]
    async fn first_heartbeat_is_never_keepalive() {
        let storage = memory_storage().await;
        let hb = build_outgoing_heartbeat(&storage, "alice", "bob", state(Some(&["rust"]), None, None)).await.unwrap();
        assert!(!hb.is_keepalive);
    }

    #[tokio::test]
    async fn unchanged_state_yields_keepalive() {
        let storage = memory_storage().await;
        let s = state(Some(&["rust"]), Some("online"), None);
        build_outgoing_heartbeat(&storage, "alice", "bob", s.clone()).await.unwrap();
        let second = build_outgoing_heartbeat(&storage, "alice", "bob", s).await.unwrap();
        assert!(second.is_keepalive);
        assert!(second.interests.is_none());
    }

    #[tokio::test]
    async fn partial_change_carries_only_changed_field() {
        let storage = memory_storage().await;
        build_outgoing_heartbeat(&storage, "alice", "bob", state(Some(&["rust"]), Some("online"), None)).await.unwrap();
        let second =
            build_outgoing_heartbeat(&storage, "alice", "bob", state(Some(&["rust"]), Some("away"), None)).await.unwrap();
        assert!(!second.is_keepalive);
        assert!(second.interests.is_none());
        assert_eq!(second.availability.as_deref(), Some("away"));
    }

    #[tokio::test]
    async fn expertise_tag_first_appearance_then_persists() {
        let storage = memory_storage().await;
        let hb1 = Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: "bob".into(),
            to_claw_id: "alice".into(),
            interests: Some(vec!["rust".into()]),
            availability: None,
            recent_topics: None,
            is_keepalive: false,
            created_at: chrono::Utc::now(),
        };
        update_from_heartbeat(&storage, "alice", &hb1).await.unwrap();
        let model = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert_eq!(model.expertise_tags.get("rust"), Some(&0.3));

        update_from_heartbeat(&storage, "alice", &hb1).await.unwrap();
        let model = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert!((model.expertise_tags.get("rust").unwrap() - 0.35).abs() < 1e-9);
    }

    #[tokio::test]
    async fn absent_tag_decays_and_is_pruned() {
        let storage = memory_storage().await;
        let mut model = FriendModel::new("alice".into(), "bob".into());
        model.expertise_tags.insert("rust".into(), 0.11);
        storage.save_friend_model(&model).await.unwrap();

        let hb = Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: "bob".into(),
            to_claw_id: "alice".into(),
            interests: Some(vec!["go".into()]),
            availability: None,
            recent_topics: None,
            is_keepalive: false,
            created_at: chrono::Utc::now(),
        };
        update_from_heartbeat(&storage, "alice", &hb).await.unwrap();
        let model = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert!(!model.expertise_tags.contains_key("rust"));
        assert_eq!(model.expertise_tags.get("go"), Some(&0.3));
    }

    #[tokio::test]
    async fn last_known_state_only_updates_with_topics() {
        let storage = memory_storage().await;
        let hb_no_topics = Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: "bob".into(),
            to_claw_id: "alice".into(),
            interests: None,
            availability: None,
            recent_topics: None,
            is_keepalive: false,
            created_at: chrono::Utc::now(),
        };
        update_from_heartbeat(&storage, "alice", &hb_no_topics).await.unwrap();
        let model = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert!(model.last_known_state.is_none());

        let hb_topics = Heartbeat { recent_topics: Some(vec!["migration".into()]), ..hb_no_topics };
        update_from_heartbeat(&storage, "alice", &hb_topics).await.unwrap();
        let model = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert_eq!(model.last_known_state.as_deref(), Some("migration"));
    }

    #[test]
    fn interest_overlap_skips_empty_intersections() {
        let mut a = FriendModel::new("me".into(), "bob".into());
        a.inferred_interests = ["rust", "go"].iter().map(|s| s.to_string()).collect();
        let mut b = FriendModel::new("me".into(), "carol".into());
        b.inferred_interests = ["go", "python"].iter().map(|s| s.to_string()).collect();
        let mut c = FriendModel::new("me".into(), "dan".into());
        c.inferred_interests = ["java"].iter().map(|s| s.to_string()).collect();

        let overlaps = interest_overlaps(&[a, b, c]);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].0, "bob");
        assert_eq!(overlaps[0].1, "carol");
        assert!(overlaps[0].2.contains("go"));
    }
}
