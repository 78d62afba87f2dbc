use crate::error::{classify, StorageResult};
use crate::util::{to_json, to_ts, to_ts_opt};
use crate::Storage;
use clawbuds_proto::{DeliveryOutcome, Webhook, WebhookDelivery, WebhookType};
use sqlx::Row;
use uuid::Uuid;

fn webhook_type_str(t: WebhookType) -> &'static str {
    match t {
        WebhookType::Outgoing => "outgoing",
        WebhookType::Incoming => "incoming",
    }
}
fn webhook_type_from(s: &str) -> WebhookType {
    if s == "incoming" { WebhookType::Incoming } else { WebhookType::Outgoing }
}
fn outcome_str(o: DeliveryOutcome) -> &'static str {
    match o {
        DeliveryOutcome::Success => "success",
        DeliveryOutcome::Failed => "failed",
        DeliveryOutcome::Aborted => "aborted",
    }
}

fn row_to_webhook(row: sqlx::any::AnyRow) -> StorageResult<Webhook> {
    Ok(Webhook {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
            .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        claw_id: row.try_get("claw_id")?,
        webhook_type: webhook_type_from(&row.try_get::<String, _>("webhook_type")?),
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        secret: row.try_get("secret")?,
        events: crate::util::from_json(&row.try_get::<String, _>("events")?)?,
        active: row.try_get::<i64, _>("active")? != 0,
        failure_count: row.try_get::<i64, _>("failure_count")? as u32,
        last_status_code: row.try_get::<Option<i64>, _>("last_status_code")?.map(|c| c as u16),
        last_triggered_at: crate::util::from_ts_opt(row.try_get("last_triggered_at")?)?,
    })
}

impl Storage {
    pub async fn create_webhook(&self, webhook: &Webhook) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO webhooks (id, claw_id, webhook_type, name, url, secret, events, \
             active, failure_count, last_status_code, last_triggered_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(webhook.id.to_string())
        .bind(&webhook.claw_id)
        .bind(webhook_type_str(webhook.webhook_type))
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(&webhook.secret)
        .bind(to_json(&webhook.events)?)
        .bind(webhook.active as i64)
        .bind(webhook.failure_count as i64)
        .bind(webhook.last_status_code.map(|c| c as i64))
        .bind(to_ts_opt(webhook.last_triggered_at))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "webhooks.claw_id+name"))?;
        Ok(())
    }

    pub async fn get_webhook(&self, id: Uuid) -> StorageResult<Option<Webhook>> {
        let row = sqlx::query("SELECT * FROM webhooks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_webhook).transpose()
    }

    pub async fn update_webhook_url(&self, id: Uuid, url: &str) -> StorageResult<()> {
        sqlx::query("UPDATE webhooks SET url = ? WHERE id = ?")
            .bind(url)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_webhooks_for_claw(&self, claw_id: &str) -> StorageResult<Vec<Webhook>> {
        let rows = sqlx::query("SELECT * FROM webhooks WHERE claw_id = ?").bind(claw_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_webhook).collect()
    }

    pub async fn update_webhook(&self, id: Uuid, name: &str, events: &[String], active: bool) -> StorageResult<()> {
        sqlx::query("UPDATE webhooks SET name = ?, events = ?, active = ? WHERE id = ?")
            .bind(name)
            .bind(to_json(events)?)
            .bind(active as i64)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "webhooks.claw_id+name"))?;
        Ok(())
    }

    pub async fn delete_webhook(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM webhooks WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list_active_outgoing_subscribed(&self, claw_id: &str, event: &str) -> StorageResult<Vec<Webhook>> {
        let rows = sqlx::query(
            "SELECT * FROM webhooks WHERE claw_id = ? AND webhook_type = 'outgoing' AND active = 1",
        )
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(row_to_webhook)
            .collect::<StorageResult<Vec<_>>>()
            .map(|webhooks| webhooks.into_iter().filter(|w| w.subscribes_to(event)).collect())
    }

    /// Re-reads state between attempts; increments on failure, resets on success.
    pub async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        outcome: DeliveryOutcome,
        status_code: Option<u16>,
    ) -> StorageResult<Webhook> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM webhooks WHERE id = ?")
            .bind(webhook_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let mut webhook = row_to_webhook(row)?;

        if matches!(outcome, DeliveryOutcome::Success) {
            webhook.failure_count = 0;
        } else {
            webhook.failure_count += 1;
            if webhook.failure_count >= clawbuds_proto::CIRCUIT_BREAKER_THRESHOLD {
                webhook.active = false;
            }
        }
        webhook.last_status_code = status_code;
        webhook.last_triggered_at = Some(chrono::Utc::now());

        sqlx::query(
            "UPDATE webhooks SET failure_count = ?, active = ?, last_status_code = ?, last_triggered_at = ? WHERE id = ?",
        )
        .bind(webhook.failure_count as i64)
        .bind(webhook.active as i64)
        .bind(webhook.last_status_code.map(|c| c as i64))
        .bind(to_ts_opt(webhook.last_triggered_at))
        .bind(webhook_id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        let _ = outcome_str(outcome);
        Ok(webhook)
    }

    pub async fn create_delivery_record(&self, delivery: &WebhookDelivery) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO webhook_deliveries (id, webhook_id, event, attempt, outcome, \
             status_code, response_body, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(delivery.id.to_string())
        .bind(delivery.webhook_id.to_string())
        .bind(&delivery.event)
        .bind(delivery.attempt as i64)
        .bind(outcome_str(delivery.outcome))
        .bind(delivery.status_code.map(|c| c as i64))
        .bind(
            delivery
                .response_body
                .as_ref()
                .map(|b| b.chars().take(clawbuds_proto::RESPONSE_BODY_TRUNCATE_BYTES).collect::<String>()),
        )
        .bind(to_ts(delivery.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Descending by `createdAt`, per spec.md §4.2 ordering guarantee.
    pub async fn list_deliveries(&self, webhook_id: Uuid, limit: i64) -> StorageResult<Vec<WebhookDelivery>> {
        let rows = sqlx::query(
            "SELECT * FROM webhook_deliveries WHERE webhook_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(webhook_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(WebhookDelivery {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    webhook_id,
                    event: row.try_get("event")?,
                    attempt: row.try_get::<i64, _>("attempt")? as u32,
                    outcome: match row.try_get::<String, _>("outcome")?.as_str() {
                        "success" => DeliveryOutcome::Success,
                        "aborted" => DeliveryOutcome::Aborted,
                        _ => DeliveryOutcome::Failed,
                    },
                    status_code: row.try_get::<Option<i64>, _>("status_code")?.map(|c| c as u16),
                    response_body: row.try_get("response_body")?,
                    created_at: crate::util::from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    fn sample_webhook(claw_id: &str) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            claw_id: claw_id.to_string(),
            webhook_type: WebhookType::Outgoing,
            name: "primary".into(),
            url: Some("https://example.com/hook".into()),
            secret: "s3cr3t".into(),
            events: vec!["message.new".into()],
            active: true,
            failure_count: 0,
            last_status_code: None,
            last_triggered_at: None,
        }
    }

    #[tokio::test]
    async fn circuit_breaker_deactivates_at_threshold() {
        let storage = memory_storage().await;
        let webhook = sample_webhook("alice");
        storage.create_webhook(&webhook).await.unwrap();

        for _ in 0..10 {
            storage.record_delivery_outcome(webhook.id, DeliveryOutcome::Failed, None).await.unwrap();
        }
        let reloaded = storage.get_webhook(webhook.id).await.unwrap().unwrap();
        assert!(!reloaded.active);
        assert_eq!(reloaded.failure_count, 10);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let storage = memory_storage().await;
        let webhook = sample_webhook("alice");
        storage.create_webhook(&webhook).await.unwrap();
        storage.record_delivery_outcome(webhook.id, DeliveryOutcome::Failed, Some(500)).await.unwrap();
        storage.record_delivery_outcome(webhook.id, DeliveryOutcome::Success, Some(200)).await.unwrap();
        let reloaded = storage.get_webhook(webhook.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failure_count, 0);
    }
}
