//! Circles: named subsets of an owner's friends used to address
//! `visibility: circles` messages.

use crate::error::storage_err;
use clawbuds_proto::{validate_circle_name, ApiError, Circle, MAX_CIRCLES_PER_OWNER};
use clawbuds_storage::Storage;
use uuid::Uuid;

pub async fn create_circle(storage: &Storage, owner_id: &str, name: &str) -> Result<Circle, ApiError> {
    validate_circle_name(name)?;
    let count = storage.count_circles(owner_id).await.map_err(storage_err)?;
    if count as usize >= MAX_CIRCLES_PER_OWNER {
        return Err(ApiError::validation("circle limit reached"));
    }
    storage.create_circle(owner_id, name).await.map_err(storage_err)
}

pub async fn delete_circle(storage: &Storage, owner_id: &str, circle_id: Uuid) -> Result<(), ApiError> {
    ensure_owns_circle(storage, owner_id, circle_id).await?;
    storage.delete_circle(circle_id).await.map_err(storage_err)
}

pub async fn add_member(storage: &Storage, owner_id: &str, circle_id: Uuid, friend_id: &str) -> Result<(), ApiError> {
    ensure_owns_circle(storage, owner_id, circle_id).await?;
    if !storage.are_friends(owner_id, friend_id).await.map_err(storage_err)? {
        return Err(ApiError::validation("circle members must be friends of the owner"));
    }
    storage.add_circle_member(circle_id, friend_id).await.map_err(storage_err)
}

pub async fn remove_member(storage: &Storage, owner_id: &str, circle_id: Uuid, friend_id: &str) -> Result<(), ApiError> {
    ensure_owns_circle(storage, owner_id, circle_id).await?;
    storage.remove_circle_member(circle_id, friend_id).await.map_err(storage_err)
}

async fn ensure_owns_circle(storage: &Storage, owner_id: &str, circle_id: Uuid) -> Result<(), ApiError> {
    let owns = storage
        .list_circles(owner_id)
        .await
        .map_err(storage_err)?
        .into_iter()
        .any(|c| c.id == circle_id);
    if !owns {
        return Err(ApiError::not_found("no such circle for this owner"));
    }
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
    async fn non_friend_cannot_be_added_to_a_circle() {
        let storage = memory_storage().await;
        let circle = create_circle(&storage, "alice", "inner").await.unwrap();
        let err = add_member(&storage, "alice", circle.id, "bob").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn friend_can_be_added_once_accepted() {
        let storage = memory_storage().await;
        storage.create_friendship("alice", "bob", clawbuds_proto::FriendshipStatus::Accepted).await.unwrap();
        let circle = create_circle(&storage, "alice", "inner").await.unwrap();
        add_member(&storage, "alice", circle.id, "bob").await.unwrap();
        assert_eq!(storage.list_circle_members(circle.id).await.unwrap(), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn another_owner_cannot_delete_someone_elses_circle() {
        let storage = memory_storage().await;
        let circle = create_circle(&storage, "alice", "inner").await.unwrap();
        let err = delete_circle(&storage, "mallory", circle.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
