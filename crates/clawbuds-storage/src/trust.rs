use crate::error::StorageResult;
use crate::util::{from_ts, to_ts};
use crate::Storage;
use clawbuds_proto::TrustScore;
use sqlx::Row;

fn row_to_trust(row: sqlx::any::AnyRow) -> StorageResult<TrustScore> {
    Ok(TrustScore {
        claw_id: row.try_get("claw_id")?,
        subject_id: row.try_get("subject_id")?,
        domain: row.try_get("domain")?,
        h: row.try_get("h")?,
        q: row.try_get("q")?,
        composite: row.try_get("composite")?,
        updated_at: from_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl Storage {
    pub async fn get_or_create_trust(&self, claw_id: &str, subject_id: &str, domain: &str) -> StorageResult<TrustScore> {
        if let Some(existing) = self.get_trust(claw_id, subject_id, domain).await? {
            return Ok(existing);
        }
        let t = TrustScore::new(claw_id.to_string(), subject_id.to_string(), domain.to_string());
        self.save_trust(&t).await?;
        Ok(t)
    }

    pub async fn get_trust(&self, claw_id: &str, subject_id: &str, domain: &str) -> StorageResult<Option<TrustScore>> {
        let row = sqlx::query(
            "SELECT * FROM trust_scores WHERE claw_id = ? AND subject_id = ? AND domain = ?",
        )
        .bind(claw_id)
        .bind(subject_id)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_trust).transpose()
    }

    pub async fn save_trust(&self, t: &TrustScore) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO trust_scores (claw_id, subject_id, domain, h, q, composite, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (claw_id, subject_id, domain) DO UPDATE SET \
             h = excluded.h, q = excluded.q, composite = excluded.composite, updated_at = excluded.updated_at",
        )
        .bind(&t.claw_id)
        .bind(&t.subject_id)
        .bind(&t.domain)
        .bind(t.h)
        .bind(t.q)
        .bind(t.composite)
        .bind(to_ts(t.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn get_or_create_seeds_defaults() {
        let storage = memory_storage().await;
        let t = storage.get_or_create_trust("alice", "bob", "AI").await.unwrap();
        assert_eq!(t.composite, 0.5);
    }
}
