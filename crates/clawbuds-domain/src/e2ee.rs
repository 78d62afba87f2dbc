//! E2EE key bundle publication. Key *management* (generation, rotation
//! policy, session ratcheting) is a client concern; the core only stores
//! the opaque bundle a claw publishes and republishes it to lookups.

use crate::error::storage_err;
use clawbuds_eventbus::EventBus;
use clawbuds_proto::{ApiError, EventKind};
use clawbuds_storage::Storage;

pub async fn publish_key_bundle(storage: &Storage, events: &EventBus, claw_id: &str, key_bundle: &str) -> Result<(), ApiError> {
    if key_bundle.trim().is_empty() {
        return Err(ApiError::validation("keyBundle must not be empty"));
    }
    storage.upsert_e2ee_key_bundle(claw_id, key_bundle).await.map_err(storage_err)?;
    events.publish_kind(EventKind::E2eeKeyUpdated, claw_id.to_string(), serde_json::json!({}));
    Ok(())
}

pub async fn get_key_bundle(storage: &Storage, claw_id: &str) -> Result<String, ApiError> {
    storage.get_e2ee_key_bundle(claw_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no key bundle published"))
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
    async fn publish_then_fetch_roundtrips() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        publish_key_bundle(&storage, &events, "alice", "opaque-bundle").await.unwrap();
        assert_eq!(get_key_bundle(&storage, "alice").await.unwrap(), "opaque-bundle");
    }

    #[tokio::test]
    async fn blank_bundle_is_rejected() {
        let storage = memory_storage().await;
        let events = EventBus::new();
        let err = publish_key_bundle(&storage, &events, "alice", "  ").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
