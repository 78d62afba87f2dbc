//! Unsent message drafts: a scratch pad scoped to one claw, never fanned out
//! and never visible to anyone else.

use crate::error::storage_err;
use clawbuds_proto::ApiError;
use clawbuds_storage::engagement::MessageDraft;
use clawbuds_storage::Storage;
use uuid::Uuid;

pub async fn save_draft(storage: &Storage, claw_id: &str, content: &str) -> Result<MessageDraft, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("draft content must not be empty"));
    }
    storage.save_draft(claw_id, content).await.map_err(storage_err)
}

pub async fn list_drafts(storage: &Storage, claw_id: &str) -> Result<Vec<MessageDraft>, ApiError> {
    storage.list_drafts(claw_id).await.map_err(storage_err)
}

pub async fn delete_draft(storage: &Storage, claw_id: &str, id: Uuid) -> Result<(), ApiError> {
    storage.delete_draft(claw_id, id).await.map_err(storage_err)
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
    async fn save_list_delete_roundtrip() {
        let storage = memory_storage().await;
        let draft = save_draft(&storage, "alice", "unsent thought").await.unwrap();
        assert_eq!(list_drafts(&storage, "alice").await.unwrap().len(), 1);
        delete_draft(&storage, "alice", draft.id).await.unwrap();
        assert!(list_drafts(&storage, "alice").await.unwrap().is_empty());
    }
}
