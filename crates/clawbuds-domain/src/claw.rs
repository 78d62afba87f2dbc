//! Claw lifecycle: registration, profile/autonomy updates, stats.

use chrono::Utc;
use clawbuds_proto::{validate_display_name, ApiError, AutonomyLevel, Claw, ClawStats, ClawStatus};
use clawbuds_storage::{Storage, StorageResult};
use std::collections::BTreeSet;

use crate::error::storage_err;

/// Registers a new claw, deriving its id from the raw public key so the
/// server never has to trust a client-supplied id. Rejects a public key
/// that's already registered (idempotent re-registration isn't supported —
/// a claw that loses its identity file needs a fresh key pair).
pub async fn register_claw(
    storage: &Storage,
    public_key_b64: &str,
    display_name: &str,
) -> Result<Claw, ApiError> {
    validate_display_name(display_name)?;
    let raw = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, public_key_b64)
        .map_err(|_| ApiError::validation("publicKey is not valid base64url"))?;
    let claw_id = clawbuds_identity::derive_claw_id(&raw);

    if storage.get_claw(&claw_id).await.map_err(storage_err)?.is_some() {
        return Err(ApiError::claw_id_collision());
    }
    if storage.get_claw_by_public_key(public_key_b64).await.map_err(storage_err)?.is_some() {
        return Err(ApiError::public_key_taken());
    }

    let now = Utc::now();
    let claw = Claw {
        claw_id,
        public_key: public_key_b64.to_string(),
        display_name: display_name.to_string(),
        bio: None,
        status: ClawStatus::Active,
        tags: BTreeSet::new(),
        discoverable: true,
        avatar_url: None,
        autonomy_level: AutonomyLevel::default(),
        autonomy_config: serde_json::json!({}),
        notification_preferences: serde_json::json!({}),
        created_at: now,
        last_seen_at: now,
    };
    storage.create_claw(&claw).await.map_err(storage_err)?;
    Ok(claw)
}

pub async fn update_profile(
    storage: &Storage,
    claw_id: &str,
    display_name: &str,
    bio: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<(), ApiError> {
    validate_display_name(display_name)?;
    storage.update_claw_profile(claw_id, display_name, bio, avatar_url).await.map_err(storage_err)
}

pub async fn update_autonomy(
    storage: &Storage,
    claw_id: &str,
    level: AutonomyLevel,
    config: &serde_json::Value,
) -> Result<(), ApiError> {
    storage.update_claw_autonomy(claw_id, level, config).await.map_err(storage_err)
}

pub async fn claw_stats(storage: &Storage, claw_id: &str) -> StorageResult<ClawStats> {
    let friend_count = storage.list_friends(claw_id).await?.len() as u64;
    let pearl_count = storage.list_pearls_by_owner(claw_id).await?.len() as u64;
    let reflex_count = storage.list_enabled_reflexes(claw_id).await?.len() as u64;
    Ok(ClawStats { friend_count, pearl_count, message_count: 0, reflex_count })
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
    async fn registration_derives_claw_id_from_public_key() {
        let storage = memory_storage().await;
        let identity = clawbuds_identity::ClawIdentity::generate();
        let claw = register_claw(&storage, &identity.public_key_base64url(), "Alice").await.unwrap();
        assert_eq!(claw.claw_id, identity.claw_id);
    }

    #[tokio::test]
    async fn duplicate_public_key_registration_is_rejected() {
        let storage = memory_storage().await;
        let identity = clawbuds_identity::ClawIdentity::generate();
        register_claw(&storage, &identity.public_key_base64url(), "Alice").await.unwrap();
        let err = register_claw(&storage, &identity.public_key_base64url(), "Alice Again").await.unwrap_err();
        assert_eq!(err.code(), "CLAW_ID_COLLISION");
    }

    #[tokio::test]
    async fn blank_display_name_is_rejected() {
        let storage = memory_storage().await;
        let identity = clawbuds_identity::ClawIdentity::generate();
        let err = register_claw(&storage, &identity.public_key_base64url(), "   ").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
