//! Reflex CRUD at the handler boundary. Matching/execution/suggestion logic
//! itself lives in `clawbuds-reflex`, wired to the bus via its own
//! `ReflexSubscriber`; this module only owns create/list/get.

use crate::error::storage_err;
use clawbuds_proto::{ApiError, Reflex, ReflexSource, ReflexSuggestion, TriggerLayer};
use clawbuds_storage::Storage;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn create_reflex(
    storage: &Storage,
    claw_id: &str,
    name: &str,
    value_layer: &str,
    behavior: &str,
    trigger_layer: TriggerLayer,
    trigger_config: serde_json::Value,
    confidence: f64,
) -> Result<Reflex, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    let reflex = Reflex {
        id: Uuid::new_v4(),
        claw_id: claw_id.to_string(),
        name: name.to_string(),
        value_layer: value_layer.to_string(),
        behavior: behavior.to_string(),
        trigger_layer,
        trigger_config,
        enabled: true,
        confidence,
        source: ReflexSource::User,
    };
    storage.create_reflex(&reflex).await.map_err(storage_err)?;
    Ok(reflex)
}

pub async fn list_reflexes(storage: &Storage, claw_id: &str) -> Result<Vec<Reflex>, ApiError> {
    storage.list_enabled_reflexes(claw_id).await.map_err(storage_err)
}

pub async fn get_reflex(storage: &Storage, id: Uuid) -> Result<Reflex, ApiError> {
    storage.get_reflex(id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such reflex"))
}

pub async fn suggestions(storage: &Storage, claw_id: &str) -> Result<Vec<ReflexSuggestion>, ApiError> {
    clawbuds_reflex::suggestions_for_owner(storage, claw_id).await.map_err(storage_err)
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
    async fn created_reflex_is_enabled_and_listed() {
        let storage = memory_storage().await;
        let reflex = create_reflex(&storage, "alice", "auto-react", "casual", "add_reaction", TriggerLayer::L0, serde_json::json!({"tag": "gm"}), 0.8)
            .await
            .unwrap();
        assert!(reflex.enabled);
        assert_eq!(list_reflexes(&storage, "alice").await.unwrap().len(), 1);
    }
}
