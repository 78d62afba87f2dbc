//! Group lifecycle and the role/invitation invariants spec.md §4.11 binds
//! to the handler boundary: exactly one owner, owner immune to demotion/
//! removal/leaving, role changes require strictly greater privilege, public
//! groups join open (capacity permitting), private groups require a pending
//! single-use invitation.

use crate::error::storage_err;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{
    validate_group_max_members, ApiError, EventKind, Group, GroupInvitation, GroupMember, GroupRole, GroupType,
    InvitationStatus,
};
use clawbuds_storage::Storage;
use uuid::Uuid;

pub async fn create_group(
    storage: &Storage,
    owner_id: &str,
    name: &str,
    group_type: GroupType,
    max_members: u32,
    encrypted: bool,
) -> Result<Group, ApiError> {
    validate_group_max_members(max_members)?;
    storage.create_group(name, group_type, owner_id, max_members, encrypted).await.map_err(storage_err)
}

pub async fn delete_group(storage: &Storage, caller_id: &str, group_id: Uuid) -> Result<(), ApiError> {
    let group = require_group(storage, group_id).await?;
    if group.owner_id != caller_id {
        return Err(ApiError::not_authorized("only the owner may delete this group"));
    }
    storage.delete_group(group_id).await.map_err(storage_err)
}

async fn require_group(storage: &Storage, group_id: Uuid) -> Result<Group, ApiError> {
    storage
        .get_group(group_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ApiError::not_found("no such group"))
}

async fn require_member(storage: &Storage, group_id: Uuid, claw_id: &str) -> Result<GroupMember, ApiError> {
    storage
        .get_group_member(group_id, claw_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ApiError::not_authorized("not a member of this group"))
}

/// Invites `invited_id` to a private group. Public groups don't need
/// invitations — joining is open, so this is a private-group-only operation.
pub async fn invite_member(
    storage: &Storage,
    events: &EventBus,
    group_id: Uuid,
    inviter_id: &str,
    invited_id: &str,
) -> Result<GroupInvitation, ApiError> {
    let group = require_group(storage, group_id).await?;
    let inviter = require_member(storage, group_id, inviter_id).await?;
    if !matches!(inviter.role, GroupRole::Owner | GroupRole::Admin) {
        return Err(ApiError::not_authorized("only owner or admin may invite"));
    }
    if storage.get_group_member(group_id, invited_id).await.map_err(storage_err)?.is_some() {
        return Err(ApiError::duplicate("already a member"));
    }
    let invitation = storage.create_invitation(group_id, invited_id, inviter_id).await.map_err(storage_err)?;
    events.publish_kind(
        EventKind::GroupInvited,
        invited_id.to_string(),
        serde_json::json!({ "groupId": group_id, "groupName": group.name, "invitedBy": inviter_id }),
    );
    Ok(invitation)
}

/// Joins `claw_id` into `group_id`. Public: open join, rejected with
/// `GROUP_FULL` once `max_members` is reached. Private: requires a pending
/// invitation for `claw_id`, rejected with `NO_INVITATION` otherwise; the
/// invitation is consumed on success.
pub async fn join_group(storage: &Storage, events: &EventBus, group_id: Uuid, claw_id: &str) -> Result<(), ApiError> {
    let group = require_group(storage, group_id).await?;
    if storage.get_group_member(group_id, claw_id).await.map_err(storage_err)?.is_some() {
        return Err(ApiError::duplicate("already a member"));
    }

    let current = storage.count_group_members(group_id).await.map_err(storage_err)? as u32;
    if current >= group.max_members {
        return Err(ApiError::group_full());
    }

    match group.group_type {
        GroupType::Public => {}
        GroupType::Private => {
            let invitation = storage
                .find_pending_invitation(group_id, claw_id)
                .await
                .map_err(storage_err)?
                .ok_or_else(ApiError::no_invitation)?;
            storage.set_invitation_status(invitation.id, InvitationStatus::Accepted).await.map_err(storage_err)?;
        }
    }

    storage.add_group_member(group_id, claw_id, GroupRole::Member).await.map_err(storage_err)?;
    events.publish_kind(EventKind::GroupJoined, claw_id.to_string(), serde_json::json!({ "groupId": group_id }));
    Ok(())
}

pub async fn reject_invitation(storage: &Storage, group_id: Uuid, claw_id: &str) -> Result<(), ApiError> {
    let invitation = storage
        .find_pending_invitation(group_id, claw_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(ApiError::no_invitation)?;
    storage.set_invitation_status(invitation.id, InvitationStatus::Rejected).await.map_err(storage_err)
}

/// The owner may never leave; they must delete the group or transfer
/// ownership (not modeled — owner transfer isn't part of the role model).
pub async fn leave_group(storage: &Storage, events: &EventBus, group_id: Uuid, claw_id: &str) -> Result<(), ApiError> {
    let member = require_member(storage, group_id, claw_id).await?;
    if member.role == GroupRole::Owner {
        return Err(ApiError::not_authorized("the owner cannot leave a group"));
    }
    storage.remove_group_member(group_id, claw_id).await.map_err(storage_err)?;
    events.publish_kind(EventKind::GroupLeft, claw_id.to_string(), serde_json::json!({ "groupId": group_id }));
    Ok(())
}

/// Only the owner may promote/demote, and never to/from `Owner`.
pub async fn set_member_role(
    storage: &Storage,
    group_id: Uuid,
    caller_id: &str,
    target_id: &str,
    new_role: GroupRole,
) -> Result<(), ApiError> {
    let caller = require_member(storage, group_id, caller_id).await?;
    let target = require_member(storage, group_id, target_id).await?;
    if !caller.role.can_set(target.role, new_role) {
        return Err(ApiError::not_authorized("insufficient privilege to set that role"));
    }
    storage.set_group_member_role(group_id, target_id, new_role).await.map_err(storage_err)
}

/// Owner or admin may remove a non-owner member.
pub async fn remove_member(
    storage: &Storage,
    events: &EventBus,
    group_id: Uuid,
    caller_id: &str,
    target_id: &str,
) -> Result<(), ApiError> {
    let caller = require_member(storage, group_id, caller_id).await?;
    let target = require_member(storage, group_id, target_id).await?;
    if !caller.role.can_remove(target.role) {
        return Err(ApiError::not_authorized("insufficient privilege to remove that member"));
    }
    storage.remove_group_member(group_id, target_id).await.map_err(storage_err)?;
    events.publish_kind(EventKind::GroupRemoved, target_id.to_string(), serde_json::json!({ "groupId": group_id }));
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

    #[tokio::test]
    async fn public_group_join_respects_capacity() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = create_group(&storage, "alice", "g", GroupType::Public, 3, false).await.unwrap();
        join_group(&storage, &events, group.id, "bob").await.unwrap();
        join_group(&storage, &events, group.id, "charlie").await.unwrap();
        let err = join_group(&storage, &events, group.id, "dave").await.unwrap_err();
        assert_eq!(err.code(), "GROUP_FULL");
    }

    #[tokio::test]
    async fn private_group_join_requires_invitation() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = create_group(&storage, "alice", "g", GroupType::Private, 10, false).await.unwrap();
        let err = join_group(&storage, &events, group.id, "bob").await.unwrap_err();
        assert_eq!(err.code(), "NO_INVITATION");

        invite_member(&storage, &events, group.id, "alice", "bob").await.unwrap();
        join_group(&storage, &events, group.id, "bob").await.unwrap();
        // Invitation was consumed; joining again is rejected as already-a-member,
        // and a second join attempt by someone else with no invitation still fails.
        let err = join_group(&storage, &events, group.id, "charlie").await.unwrap_err();
        assert_eq!(err.code(), "NO_INVITATION");
    }

    #[tokio::test]
    async fn owner_cannot_be_removed_or_demoted_or_leave() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = create_group(&storage, "alice", "g", GroupType::Public, 10, false).await.unwrap();
        join_group(&storage, &events, group.id, "bob").await.unwrap();
        set_member_role(&storage, group.id, "alice", "bob", GroupRole::Admin).await.unwrap();

        let err = set_member_role(&storage, group.id, "bob", "alice", GroupRole::Member).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
        let err = remove_member(&storage, &events, group.id, "bob", "alice").await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
        let err = leave_group(&storage, &events, group.id, "alice").await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
    }

    #[tokio::test]
    async fn only_owner_promotes_admins() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let group = create_group(&storage, "alice", "g", GroupType::Public, 10, false).await.unwrap();
        join_group(&storage, &events, group.id, "bob").await.unwrap();
        join_group(&storage, &events, group.id, "charlie").await.unwrap();
        set_member_role(&storage, group.id, "alice", "bob", GroupRole::Admin).await.unwrap();

        let err = set_member_role(&storage, group.id, "bob", "charlie", GroupRole::Admin).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
    }
}
