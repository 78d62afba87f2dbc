//! Friendship requests: a reverse-pending request auto-accepts instead of
//! creating a second row, per [`clawbuds_proto::Friendship`]'s single-active-
//! record-per-pair invariant.

use crate::error::storage_err;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{ApiError, EventKind, Friendship, FriendshipStatus};
use clawbuds_storage::Storage;

pub async fn send_request(
    storage: &Storage,
    events: &EventBus,
    requester_id: &str,
    accepter_id: &str,
) -> Result<Friendship, ApiError> {
    if requester_id == accepter_id {
        return Err(ApiError::self_request());
    }
    if storage.get_claw(accepter_id).await.map_err(storage_err)?.is_none() {
        return Err(ApiError::claw_not_found());
    }
    if let Some(existing) = storage.find_active_friendship(requester_id, accepter_id).await.map_err(storage_err)? {
        if existing.status == FriendshipStatus::Accepted {
            return Err(ApiError::already_friends());
        }
        if existing.requester_id == accepter_id {
            // Reverse request already pending: this call auto-accepts it.
            storage.set_friendship_status(existing.id, FriendshipStatus::Accepted).await.map_err(storage_err)?;
            events.publish_kind(
                EventKind::FriendAccepted,
                existing.requester_id.clone(),
                serde_json::json!({ "friendId": existing.accepter_id }),
            );
            let mut accepted = existing;
            accepted.status = FriendshipStatus::Accepted;
            return Ok(accepted);
        }
        return Err(ApiError::duplicate_request());
    }

    let friendship =
        storage.create_friendship(requester_id, accepter_id, FriendshipStatus::Pending).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::FriendRequest,
        requester_id.to_string(),
        serde_json::json!({ "accepterId": accepter_id }),
    );
    Ok(friendship)
}

pub async fn accept_request(
    storage: &Storage,
    events: &EventBus,
    accepter_id: &str,
    friendship_id: uuid::Uuid,
) -> Result<(), ApiError> {
    let pending = storage.list_pending_requests(accepter_id).await.map_err(storage_err)?;
    let friendship = pending
        .into_iter()
        .find(|f| f.id == friendship_id)
        .ok_or_else(|| ApiError::not_found("no pending request with that id"))?;

    storage.set_friendship_status(friendship.id, FriendshipStatus::Accepted).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::FriendAccepted,
        friendship.requester_id.clone(),
        serde_json::json!({ "friendId": friendship.accepter_id }),
    );
    Ok(())
}

pub async fn reject_request(storage: &Storage, accepter_id: &str, friendship_id: uuid::Uuid) -> Result<(), ApiError> {
    let pending = storage.list_pending_requests(accepter_id).await.map_err(storage_err)?;
    let friendship = pending
        .into_iter()
        .find(|f| f.id == friendship_id)
        .ok_or_else(|| ApiError::not_found("no pending request with that id"))?;
    storage.set_friendship_status(friendship.id, FriendshipStatus::Rejected).await.map_err(storage_err)
}

/// Removes a friendship and cascades the removal into every circle the
/// remover owns (a former friend can't remain a circle member).
pub async fn remove_friend(storage: &Storage, claw_id: &str, friend_id: &str) -> Result<(), ApiError> {
    let removed = storage.remove_friendship(claw_id, friend_id).await.map_err(storage_err)?;
    if removed == 0 {
        return Err(ApiError::not_found("not friends with that claw"));
    }
    storage.remove_friend_from_all_circles(claw_id, friend_id).await.map_err(storage_err)?;
    storage.remove_friend_from_all_circles(friend_id, claw_id).await.map_err(storage_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_storage::Storage;

    async fn memory_storage() -> Storage {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        storage
    }

    fn sample_claw(id: &str) -> clawbuds_proto::Claw {
        clawbuds_proto::Claw {
            claw_id: id.to_string(),
            public_key: format!("key-{id}"),
            display_name: id.to_string(),
            bio: None,
            status: Default::default(),
            tags: Default::default(),
            discoverable: true,
            avatar_url: None,
            autonomy_level: Default::default(),
            autonomy_config: serde_json::json!({}),
            notification_preferences: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            last_seen_at: chrono::Utc::now(),
        }
    }

    async fn seed_pair(storage: &Storage, a: &str, b: &str) {
        storage.create_claw(&sample_claw(a)).await.unwrap();
        storage.create_claw(&sample_claw(b)).await.unwrap();
    }

    #[tokio::test]
    async fn reverse_pending_request_auto_accepts() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        seed_pair(&storage, "alice", "bob").await;
        send_request(&storage, &events, "alice", "bob").await.unwrap();
        let accepted = send_request(&storage, &events, "bob", "alice").await.unwrap();
        assert_eq!(accepted.status, FriendshipStatus::Accepted);
        assert_eq!(storage.list_friends("alice").await.unwrap(), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn already_friends_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        seed_pair(&storage, "alice", "bob").await;
        send_request(&storage, &events, "alice", "bob").await.unwrap();
        accept_request(&storage, &events, "bob", storage.list_pending_requests("bob").await.unwrap()[0].id)
            .await
            .unwrap();
        let err = send_request(&storage, &events, "alice", "bob").await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_FRIENDS");
    }

    #[tokio::test]
    async fn self_request_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        seed_pair(&storage, "alice", "bob").await;
        let err = send_request(&storage, &events, "alice", "alice").await.unwrap_err();
        assert_eq!(err.code(), "SELF_REQUEST");
    }

    #[tokio::test]
    async fn request_to_unknown_claw_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        storage.create_claw(&sample_claw("alice")).await.unwrap();
        let err = send_request(&storage, &events, "alice", "ghost").await.unwrap_err();
        assert_eq!(err.code(), "CLAW_NOT_FOUND");
    }

    #[tokio::test]
    async fn removal_cascades_into_circles() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        seed_pair(&storage, "alice", "bob").await;
        send_request(&storage, &events, "alice", "bob").await.unwrap();
        accept_request(&storage, &events, "bob", storage.list_pending_requests("bob").await.unwrap()[0].id)
            .await
            .unwrap();
        let circle = storage.create_circle("alice", "inner").await.unwrap();
        storage.add_circle_member(circle.id, "bob").await.unwrap();

        remove_friend(&storage, "alice", "bob").await.unwrap();
        assert!(storage.list_circle_members(circle.id).await.unwrap().is_empty());
    }
}
