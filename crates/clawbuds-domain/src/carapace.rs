//! Carapace service (spec.md §4.13): thin wrapper over the storage-layer
//! versioned document plus the pure rule-evaluation helpers in
//! `clawbuds_proto::carapace`.

use crate::error::storage_err;
use clawbuds_proto::{evaluate_rules, rules_from_document, ApiError, CarapaceDecision, CarapaceHistory, CarapaceSource};
use clawbuds_storage::Storage;

pub async fn current(storage: &Storage, claw_id: &str) -> Result<Option<CarapaceHistory>, ApiError> {
    storage.current_carapace(claw_id).await.map_err(storage_err)
}

pub async fn history(storage: &Storage, claw_id: &str) -> Result<Vec<CarapaceHistory>, ApiError> {
    storage.list_carapace_history(claw_id).await.map_err(storage_err)
}

pub async fn propose_amendment(
    storage: &Storage,
    claw_id: &str,
    document: &serde_json::Value,
) -> Result<CarapaceHistory, ApiError> {
    if document.get("rules").map(|v| !v.is_array()).unwrap_or(true) {
        return Err(ApiError::validation("carapace document must contain a `rules` array"));
    }
    storage.propose_carapace_amendment(claw_id, document, CarapaceSource::Manual).await.map_err(storage_err)
}

/// Evaluates `action` against `claw_id`'s current carapace document.
/// No stored document at all defaults to allow, same as an empty rule list.
pub async fn evaluate(storage: &Storage, claw_id: &str, action: &str) -> Result<CarapaceDecision, ApiError> {
    let current = storage.current_carapace(claw_id).await.map_err(storage_err)?;
    let rules = current.map(|c| rules_from_document(&c.document)).unwrap_or_default();
    Ok(evaluate_rules(&rules, action))
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
    async fn no_carapace_document_defaults_to_allow() {
        let storage = memory_storage().await;
        let decision = evaluate(&storage, "alice", "send_pearl").await.unwrap();
        assert_eq!(decision, CarapaceDecision::Allow);
    }

    #[tokio::test]
    async fn amendment_is_evaluated_after_propose() {
        let storage = memory_storage().await;
        let doc = serde_json::json!({ "rules": [{ "action_pattern": "send_pearl", "decision": "block" }] });
        propose_amendment(&storage, "alice", &doc).await.unwrap();
        let decision = evaluate(&storage, "alice", "send_pearl").await.unwrap();
        assert_eq!(decision, CarapaceDecision::Block);
    }

    #[tokio::test]
    async fn malformed_document_is_rejected() {
        let storage = memory_storage().await;
        let err = propose_amendment(&storage, "alice", &serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
