use crate::error::StorageResult;
use crate::util::{from_ts, to_ts};
use crate::Storage;
use clawbuds_proto::{CarapaceHistory, CarapaceSource};
use sqlx::Row;

fn source_str(s: CarapaceSource) -> &'static str {
    match s {
        CarapaceSource::Manual => "manual",
        CarapaceSource::MicroMolt => "micro_molt",
    }
}
fn source_from(s: &str) -> CarapaceSource {
    if s == "micro_molt" { CarapaceSource::MicroMolt } else { CarapaceSource::Manual }
}

fn row_to_history(row: sqlx::any::AnyRow) -> StorageResult<CarapaceHistory> {
    Ok(CarapaceHistory {
        claw_id: row.try_get("claw_id")?,
        version: row.try_get::<i64, _>("version")? as u32,
        document: crate::util::from_json(&row.try_get::<String, _>("document")?)?,
        source: source_from(&row.try_get::<String, _>("source")?),
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

impl Storage {
    /// Version is `MAX(version)+1` per claw, computed in the same transaction as the insert.
    pub async fn propose_carapace_amendment(
        &self,
        claw_id: &str,
        document: &serde_json::Value,
        source: CarapaceSource,
    ) -> StorageResult<CarapaceHistory> {
        let mut tx = self.pool.begin().await?;
        let next_version: i64 = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) + 1 AS v FROM carapace_history WHERE claw_id = ?",
        )
        .bind(claw_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("v")?;

        let history = CarapaceHistory {
            claw_id: claw_id.to_string(),
            version: next_version as u32,
            document: document.clone(),
            source,
            created_at: chrono::Utc::now(),
        };
        sqlx::query(
            "INSERT INTO carapace_history (claw_id, version, document, source, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&history.claw_id)
        .bind(history.version as i64)
        .bind(serde_json::to_string(&history.document)?)
        .bind(source_str(history.source))
        .bind(to_ts(history.created_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(history)
    }

    pub async fn current_carapace(&self, claw_id: &str) -> StorageResult<Option<CarapaceHistory>> {
        let row = sqlx::query(
            "SELECT * FROM carapace_history WHERE claw_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(claw_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_history).transpose()
    }

    pub async fn list_carapace_history(&self, claw_id: &str) -> StorageResult<Vec<CarapaceHistory>> {
        let rows = sqlx::query(
            "SELECT * FROM carapace_history WHERE claw_id = ? ORDER BY version DESC",
        )
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_history).collect()
    }

    /// Keeps only the newest `keep` versions per claw; deletes the rest.
    pub async fn prune_carapace_history(&self, claw_id: &str, keep: u32) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM carapace_history WHERE claw_id = ? AND version NOT IN ( \
             SELECT version FROM carapace_history WHERE claw_id = ? \
             ORDER BY version DESC LIMIT ?)",
        )
        .bind(claw_id)
        .bind(claw_id)
        .bind(keep as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn version_increments_per_claw() {
        let storage = memory_storage().await;
        let doc = serde_json::json!({"rules": []});
        let first = storage.propose_carapace_amendment("alice", &doc, CarapaceSource::Manual).await.unwrap();
        let second = storage.propose_carapace_amendment("alice", &doc, CarapaceSource::MicroMolt).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let current = storage.current_carapace("alice").await.unwrap().unwrap();
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn prune_keeps_only_newest_n() {
        let storage = memory_storage().await;
        let doc = serde_json::json!({});
        for _ in 0..25 {
            storage.propose_carapace_amendment("alice", &doc, CarapaceSource::Manual).await.unwrap();
        }
        let pruned = storage.prune_carapace_history("alice", 20).await.unwrap();
        assert_eq!(pruned, 5);
        let remaining = storage.list_carapace_history("alice").await.unwrap();
        assert_eq!(remaining.len(), 20);
        assert_eq!(remaining[0].version, 25);
        assert_eq!(remaining[19].version, 6);
    }
}
