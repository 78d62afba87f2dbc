use crate::error::StorageResult;
use crate::util::{from_ts, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::Heartbeat;
use sqlx::Row;
use uuid::Uuid;

impl Storage {
    pub async fn create_heartbeat(&self, heartbeat: &Heartbeat) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO heartbeats (id, from_claw_id, to_claw_id, interests, availability, \
             recent_topics, is_keepalive, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(heartbeat.id.to_string())
        .bind(&heartbeat.from_claw_id)
        .bind(&heartbeat.to_claw_id)
        .bind(heartbeat.interests.as_ref().map(to_json).transpose()?)
        .bind(&heartbeat.availability)
        .bind(heartbeat.recent_topics.as_ref().map(to_json).transpose()?)
        .bind(heartbeat.is_keepalive as i64)
        .bind(to_ts(heartbeat.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Last non-keepalive heartbeat from `from_claw_id` to `to_claw_id`, used
    /// as the diff baseline per spec.md §4.10.
    pub async fn last_payload_heartbeat(&self, from_claw_id: &str, to_claw_id: &str) -> StorageResult<Option<Heartbeat>> {
        let row = sqlx::query(
            "SELECT * FROM heartbeats WHERE from_claw_id = ? AND to_claw_id = ? AND is_keepalive = 0 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(from_claw_id)
        .bind(to_claw_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_heartbeat).transpose()
    }

    /// Deletes heartbeats older than `retention_days`; returns the count removed.
    pub async fn prune_heartbeats(&self, retention_days: i64) -> StorageResult<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
        let result = sqlx::query("DELETE FROM heartbeats WHERE created_at < ?")
            .bind(to_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_heartbeat(row: sqlx::any::AnyRow) -> StorageResult<Heartbeat> {
    Ok(Heartbeat {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
            .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        from_claw_id: row.try_get("from_claw_id")?,
        to_claw_id: row.try_get("to_claw_id")?,
        interests: row.try_get::<Option<String>, _>("interests")?.map(|s| crate::util::from_json(&s)).transpose()?,
        availability: row.try_get("availability")?,
        recent_topics: row
            .try_get::<Option<String>, _>("recent_topics")?
            .map(|s| crate::util::from_json(&s))
            .transpose()?,
        is_keepalive: row.try_get::<i64, _>("is_keepalive")? != 0,
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn prune_removes_old_rows_only() {
        let storage = memory_storage().await;
        let old = Heartbeat {
            id: Uuid::new_v4(),
            from_claw_id: "alice".into(),
            to_claw_id: "bob".into(),
            interests: None,
            availability: None,
            recent_topics: None,
            is_keepalive: true,
            created_at: chrono::Utc::now() - chrono::Duration::days(30),
        };
        storage.create_heartbeat(&old).await.unwrap();
        let removed = storage.prune_heartbeats(7).await.unwrap();
        assert_eq!(removed, 1);
    }
}
