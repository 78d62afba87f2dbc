//! Reactions and poll votes: thin wrappers over the message a reaction or
//! vote targets, existing only to validate the target and emit the right
//! event.

use crate::error::storage_err;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{ApiError, Block, EventKind};
use clawbuds_storage::engagement::{PollVote, Reaction};
use clawbuds_storage::Storage;
use uuid::Uuid;

async fn require_message_visible_to(storage: &Storage, claw_id: &str, message_id: Uuid) -> Result<(), ApiError> {
    let message = storage.get_message(message_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such message"))?;
    if message.from_claw_id == claw_id {
        return Ok(());
    }
    let visible = storage.list_inbox(claw_id, 0, i64::MAX).await.map_err(storage_err)?.into_iter().any(|e| e.message_id == message_id);
    if !visible {
        return Err(ApiError::not_authorized("message is not visible to this claw"));
    }
    Ok(())
}

pub async fn add_reaction(storage: &Storage, events: &EventBus, claw_id: &str, message_id: Uuid, emoji: &str) -> Result<(), ApiError> {
    require_message_visible_to(storage, claw_id, message_id).await?;
    storage.add_reaction(message_id, claw_id, emoji).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::ReactionAdded,
        claw_id.to_string(),
        serde_json::json!({ "messageId": message_id, "emoji": emoji }),
    );
    Ok(())
}

pub async fn remove_reaction(storage: &Storage, events: &EventBus, claw_id: &str, message_id: Uuid, emoji: &str) -> Result<(), ApiError> {
    storage.remove_reaction(message_id, claw_id, emoji).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::ReactionRemoved,
        claw_id.to_string(),
        serde_json::json!({ "messageId": message_id, "emoji": emoji }),
    );
    Ok(())
}

pub async fn list_reactions(storage: &Storage, message_id: Uuid) -> Result<Vec<Reaction>, ApiError> {
    storage.list_reactions(message_id).await.map_err(storage_err)
}

pub async fn cast_poll_vote(storage: &Storage, events: &EventBus, claw_id: &str, message_id: Uuid, option_index: i64) -> Result<(), ApiError> {
    require_message_visible_to(storage, claw_id, message_id).await?;
    let message = storage.get_message(message_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such message"))?;
    let option_count = message.blocks.iter().find_map(|b| match b {
        Block::Poll { options, .. } => Some(options.len()),
        _ => None,
    });
    match option_count {
        Some(count) if (option_index as usize) < count => {}
        Some(_) => return Err(ApiError::validation("optionIndex is out of range for this poll")),
        None => return Err(ApiError::validation("message carries no poll block")),
    }
    storage.cast_poll_vote(message_id, claw_id, option_index).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::PollVoted,
        claw_id.to_string(),
        serde_json::json!({ "messageId": message_id, "optionIndex": option_index }),
    );
    Ok(())
}

pub async fn list_poll_votes(storage: &Storage, message_id: Uuid) -> Result<Vec<PollVote>, ApiError> {
    storage.list_poll_votes(message_id).await.map_err(storage_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::{FriendshipStatus, SendMessageRequest, Visibility};
    use clawbuds_storage::Storage;

    async fn memory_storage() -> Storage {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn vote_out_of_range_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        storage.create_friendship("alice", "bob", FriendshipStatus::Accepted).await.unwrap();
        let request = SendMessageRequest {
            blocks: vec![Block::Poll { question: "pick".into(), options: vec!["a".into(), "b".into()] }],
            visibility: Visibility::Direct,
            to_claw_ids: vec!["bob".into()],
            circle_names: vec![],
            group_id: None,
            reply_to: None,
            content_warning: None,
        };
        let result = crate::message::send_message(&storage, &events, "alice", request).await.unwrap();
        let err = cast_poll_vote(&storage, &events, "bob", result.message_id, 5).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        cast_poll_vote(&storage, &events, "bob", result.message_id, 1).await.unwrap();
        assert_eq!(list_poll_votes(&storage, result.message_id).await.unwrap().len(), 1);
    }
}
