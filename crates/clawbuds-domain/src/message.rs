//! Message send & fan-out pipeline (spec.md §4.4): validate visibility,
//! resolve recipients, persist message + per-recipient inbox entries
//! atomically, emit `message.new`. Any failure rolls back the whole send —
//! nothing is ever partially fanned out.

use crate::error::storage_err;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{ApiError, EventKind, InboxEntry, InboxStatus, Message, SendMessageRequest, SendMessageResult, Visibility};
use clawbuds_storage::Storage;
use std::collections::BTreeSet;
use uuid::Uuid;

pub async fn send_message(
    storage: &Storage,
    events: &EventBus,
    sender_id: &str,
    request: SendMessageRequest,
) -> Result<SendMessageResult, ApiError> {
    let recipients = resolve_recipients(storage, sender_id, &request).await?;

    let (message, entries) = storage
        .fan_out_message(
            sender_id,
            &request.blocks,
            request.visibility,
            request.group_id,
            request.reply_to,
            request.content_warning.as_deref(),
            &recipients,
        )
        .await
        .map_err(storage_err)?;

    events.publish_kind(
        EventKind::MessageNew,
        sender_id.to_string(),
        serde_json::json!({
            "messageId": message.id,
            "senderId": sender_id,
            "recipientIds": recipients,
            "payload": message.blocks,
        }),
    );

    Ok(SendMessageResult { message_id: message.id, recipient_count: entries.len() as u64, recipients })
}

async fn resolve_recipients(
    storage: &Storage,
    sender_id: &str,
    request: &SendMessageRequest,
) -> Result<Vec<String>, ApiError> {
    match request.visibility {
        Visibility::Direct => {
            if request.to_claw_ids.is_empty() {
                return Err(ApiError::validation("direct messages require at least one recipient"));
            }
            let mut recipients = BTreeSet::new();
            for to in &request.to_claw_ids {
                if to == sender_id {
                    continue;
                }
                if !storage.are_friends(sender_id, to).await.map_err(storage_err)? {
                    return Err(ApiError::not_authorized("all direct recipients must be friends"));
                }
                recipients.insert(to.clone());
            }
            Ok(recipients.into_iter().collect())
        }
        Visibility::Circles => {
            if request.circle_names.is_empty() {
                return Err(ApiError::validation("circle messages require at least one circle name"));
            }
            let members = storage.resolve_circle_members_by_name(sender_id, &request.circle_names).await.map_err(storage_err)?;
            let mut recipients = BTreeSet::new();
            for member in members {
                if member != sender_id && storage.are_friends(sender_id, &member).await.map_err(storage_err)? {
                    recipients.insert(member);
                }
            }
            Ok(recipients.into_iter().collect())
        }
        Visibility::Group => {
            let group_id = request.group_id.ok_or_else(|| ApiError::validation("group messages require groupId"))?;
            let membership = storage.get_group_member(group_id, sender_id).await.map_err(storage_err)?;
            if membership.is_none() {
                return Err(ApiError::not_authorized("sending requires current group membership"));
            }
            let members = storage.list_group_members(group_id).await.map_err(storage_err)?;
            Ok(members.into_iter().map(|m| m.claw_id).filter(|id| id != sender_id).collect())
        }
        Visibility::Public => Ok(storage.list_friends(sender_id).await.map_err(storage_err)?),
    }
}

pub async fn get_message(storage: &Storage, id: Uuid) -> Result<Message, ApiError> {
    storage.get_message(id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such message"))
}

fn edit_window_secs() -> i64 {
    std::env::var("CLAWBUDS_MESSAGE_EDIT_WINDOW_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(900)
}

/// Edits are author-only and bounded by [`edit_window_secs`]; the window is
/// measured from `createdAt`, not from the most recent edit, so repeated
/// edits can't indefinitely extend it.
pub async fn edit_message(
    storage: &Storage,
    events: &EventBus,
    editor_id: &str,
    message_id: Uuid,
    blocks: Vec<clawbuds_proto::Block>,
) -> Result<(), ApiError> {
    let message = get_message(storage, message_id).await?;
    if message.from_claw_id != editor_id {
        return Err(ApiError::not_authorized("only the author can edit this message"));
    }
    let age = (chrono::Utc::now() - message.created_at).num_seconds();
    if age > edit_window_secs() {
        return Err(ApiError::not_authorized("edit window has closed"));
    }
    storage.edit_message(message_id, &blocks).await.map_err(storage_err)?;
    events.publish_kind(EventKind::MessageEdited, editor_id.to_string(), serde_json::json!({ "messageId": message_id }));
    Ok(())
}

pub async fn delete_message(storage: &Storage, events: &EventBus, deleter_id: &str, message_id: Uuid) -> Result<(), ApiError> {
    let message = get_message(storage, message_id).await?;
    if message.from_claw_id != deleter_id {
        return Err(ApiError::not_authorized("only the author can delete this message"));
    }
    storage.delete_message(message_id).await.map_err(storage_err)?;
    events.publish_kind(EventKind::MessageDeleted, deleter_id.to_string(), serde_json::json!({ "messageId": message_id }));
    Ok(())
}

/// History is visible only to current members (spec.md §4.11).
pub async fn group_messages(storage: &Storage, caller_id: &str, group_id: Uuid, limit: i64) -> Result<Vec<Message>, ApiError> {
    if storage.get_group_member(group_id, caller_id).await.map_err(storage_err)?.is_none() {
        return Err(ApiError::not_authorized("message history is visible only to current members"));
    }
    storage.list_group_messages(group_id, limit).await.map_err(storage_err)
}

pub async fn list_inbox(storage: &Storage, recipient_id: &str, after_seq: i64, limit: i64) -> Result<Vec<InboxEntry>, ApiError> {
    storage.list_inbox(recipient_id, after_seq, limit).await.map_err(storage_err)
}

pub async fn mark_read(storage: &Storage, recipient_id: &str, message_id: Uuid) -> Result<(), ApiError> {
    storage.set_inbox_status(recipient_id, message_id, InboxStatus::Read).await.map_err(storage_err)
}

pub async fn ack_message(storage: &Storage, recipient_id: &str, message_id: Uuid) -> Result<(), ApiError> {
    storage.set_inbox_status(recipient_id, message_id, InboxStatus::Acked).await.map_err(storage_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawbuds_proto::{Block, FriendshipStatus, GroupType};
    use clawbuds_storage::Storage;

    async fn memory_storage() -> Storage {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        storage
    }

    fn text_request(visibility: Visibility) -> SendMessageRequest {
        SendMessageRequest {
            blocks: vec![Block::Text { text: "hi".into() }],
            visibility,
            to_claw_ids: vec![],
            circle_names: vec![],
            group_id: None,
            reply_to: None,
            content_warning: None,
        }
    }

    #[tokio::test]
    async fn direct_message_requires_friendship() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let mut req = text_request(Visibility::Direct);
        req.to_claw_ids = vec!["bob".into()];
        let err = send_message(&storage, &events, "alice", req).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
    }

    #[tokio::test]
    async fn direct_message_fans_out_to_friends() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        storage.create_friendship("alice", "bob", FriendshipStatus::Accepted).await.unwrap();
        let mut req = text_request(Visibility::Direct);
        req.to_claw_ids = vec!["bob".into()];
        let result = send_message(&storage, &events, "alice", req).await.unwrap();
        assert_eq!(result.recipients, vec!["bob".to_string()]);
        assert_eq!(result.recipient_count, 1);
    }

    #[tokio::test]
    async fn circle_message_resolves_union_of_friend_members() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        storage.create_friendship("alice", "bob", FriendshipStatus::Accepted).await.unwrap();
        storage.create_friendship("alice", "charlie", FriendshipStatus::Accepted).await.unwrap();
        let a = storage.create_circle("alice", "a").await.unwrap();
        let b = storage.create_circle("alice", "b").await.unwrap();
        storage.add_circle_member(a.id, "bob").await.unwrap();
        storage.add_circle_member(b.id, "charlie").await.unwrap();

        let mut req = text_request(Visibility::Circles);
        req.circle_names = vec!["a".into(), "b".into()];
        let result = send_message(&storage, &events, "alice", req).await.unwrap();
        assert_eq!(result.recipients, vec!["bob".to_string(), "charlie".to_string()]);
    }

    #[tokio::test]
    async fn group_message_requires_current_membership() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = storage.create_group("g", GroupType::Public, "alice", 10, false).await.unwrap();
        let mut req = text_request(Visibility::Group);
        req.group_id = Some(group.id);
        let err = send_message(&storage, &events, "mallory", req).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
    }

    #[tokio::test]
    async fn group_message_excludes_sender_from_recipients() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = storage.create_group("g", GroupType::Public, "alice", 10, false).await.unwrap();
        storage.add_group_member(group.id, "bob", clawbuds_proto::GroupRole::Member).await.unwrap();
        let mut req = text_request(Visibility::Group);
        req.group_id = Some(group.id);
        let result = send_message(&storage, &events, "alice", req).await.unwrap();
        assert_eq!(result.recipients, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn only_author_may_edit_or_delete() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        storage.create_friendship("alice", "bob", FriendshipStatus::Accepted).await.unwrap();
        let mut req = text_request(Visibility::Direct);
        req.to_claw_ids = vec!["bob".into()];
        let result = send_message(&storage, &events, "alice", req).await.unwrap();

        let err = edit_message(&storage, &events, "bob", result.message_id, vec![Block::Text { text: "nope".into() }])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");

        edit_message(&storage, &events, "alice", result.message_id, vec![Block::Text { text: "edited".into() }])
            .await
            .unwrap();
        let updated = get_message(&storage, result.message_id).await.unwrap();
        assert!(updated.edited_at.is_some());

        let err = delete_message(&storage, &events, "bob", result.message_id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
        delete_message(&storage, &events, "alice", result.message_id).await.unwrap();
        assert!(get_message(&storage, result.message_id).await.is_err());
    }
}
