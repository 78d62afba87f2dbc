//! Inbound/outbound webhook subscription CRUD. Delivery itself is
//! `clawbuds-webhooks`'s job, driven fire-and-forget from
//! [`crate::webhook_dispatch`]; this module only manages the subscription
//! records an owner creates, reads, updates, and deletes.

use crate::error::storage_err;
use clawbuds_proto::{ApiError, Webhook, WebhookDelivery, WebhookType};
use clawbuds_storage::Storage;
use uuid::Uuid;

async fn require_owned_webhook(storage: &Storage, claw_id: &str, id: Uuid) -> Result<Webhook, ApiError> {
    let webhook = storage.get_webhook(id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such webhook"))?;
    if webhook.claw_id != claw_id {
        return Err(ApiError::not_authorized("not this claw's webhook"));
    }
    Ok(webhook)
}

pub async fn create_webhook(
    storage: &Storage,
    claw_id: &str,
    webhook_type: WebhookType,
    name: &str,
    url: Option<&str>,
    events: Vec<String>,
    secret: &str,
) -> Result<Webhook, ApiError> {
    if let Some(url) = url {
        clawbuds_webhooks::check_url_for_ssrf(url).await.map_err(|e| ApiError::validation(e.to_string()))?;
    }
    let webhook = Webhook {
        id: Uuid::new_v4(),
        claw_id: claw_id.to_string(),
        webhook_type,
        name: name.to_string(),
        url: url.map(str::to_string),
        secret: secret.to_string(),
        events,
        active: true,
        failure_count: 0,
        last_status_code: None,
        last_triggered_at: None,
    };
    storage.create_webhook(&webhook).await.map_err(storage_err)?;
    Ok(webhook)
}

pub async fn list_webhooks(storage: &Storage, claw_id: &str) -> Result<Vec<Webhook>, ApiError> {
    storage.list_webhooks_for_claw(claw_id).await.map_err(storage_err)
}

pub async fn update_webhook(
    storage: &Storage,
    claw_id: &str,
    id: Uuid,
    name: &str,
    url: Option<&str>,
    events: Vec<String>,
    active: bool,
) -> Result<(), ApiError> {
    require_owned_webhook(storage, claw_id, id).await?;
    if let Some(url) = url {
        clawbuds_webhooks::check_url_for_ssrf(url).await.map_err(|e| ApiError::validation(e.to_string()))?;
        storage.update_webhook_url(id, url).await.map_err(storage_err)?;
    }
    storage.update_webhook(id, name, &events, active).await.map_err(storage_err)
}

pub async fn delete_webhook(storage: &Storage, claw_id: &str, id: Uuid) -> Result<(), ApiError> {
    require_owned_webhook(storage, claw_id, id).await?;
    storage.delete_webhook(id).await.map_err(storage_err)
}

pub async fn list_deliveries(storage: &Storage, claw_id: &str, webhook_id: Uuid, limit: i64) -> Result<Vec<WebhookDelivery>, ApiError> {
    require_owned_webhook(storage, claw_id, webhook_id).await?;
    storage.list_deliveries(webhook_id, limit).await.map_err(storage_err)
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
    async fn forbidden_url_is_rejected_on_create_and_update() {
        let storage = memory_storage().await;
        let err = create_webhook(&storage, "alice", WebhookType::Outgoing, "hook", Some("http://169.254.169.254/"), vec!["message.new".into()], "s3cr3t")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");

        let webhook = create_webhook(&storage, "alice", WebhookType::Outgoing, "hook", Some("https://example.com/hook"), vec!["message.new".into()], "s3cr3t")
            .await
            .unwrap();
        let err = update_webhook(&storage, "alice", webhook.id, "hook", Some("http://127.0.0.1/"), vec!["message.new".into()], true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn only_owner_may_delete() {
        let storage = memory_storage().await;
        let webhook = create_webhook(&storage, "alice", WebhookType::Outgoing, "hook", Some("https://example.com/hook"), vec!["message.new".into()], "s3cr3t")
            .await
            .unwrap();
        let err = delete_webhook(&storage, "mallory", webhook.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
        delete_webhook(&storage, "alice", webhook.id).await.unwrap();
    }
}
