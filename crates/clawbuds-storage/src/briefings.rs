use crate::error::StorageResult;
use crate::util::{from_ts, from_ts_opt, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::{Briefing, BriefingType};
use sqlx::Row;
use uuid::Uuid;

fn type_str(t: BriefingType) -> &'static str {
    match t {
        BriefingType::Daily => "daily",
        BriefingType::Weekly => "weekly",
    }
}
fn type_from(s: &str) -> BriefingType {
    if s == "weekly" { BriefingType::Weekly } else { BriefingType::Daily }
}

impl Storage {
    pub async fn create_briefing(&self, briefing: &Briefing) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO briefings (id, claw_id, briefing_type, content, raw_data, generated_at, acknowledged_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(briefing.id.to_string())
        .bind(&briefing.claw_id)
        .bind(type_str(briefing.briefing_type))
        .bind(&briefing.content)
        .bind(to_json(&briefing.raw_data)?)
        .bind(to_ts(briefing.generated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn acknowledge_briefing(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE briefings SET acknowledged_at = ? WHERE id = ?")
            .bind(to_ts(chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Descending by `generatedAt`, per spec.md §4.2 ordering guarantee.
    pub async fn list_briefings(&self, claw_id: &str, limit: i64) -> StorageResult<Vec<Briefing>> {
        let rows = sqlx::query(
            "SELECT * FROM briefings WHERE claw_id = ? ORDER BY generated_at DESC LIMIT ?",
        )
        .bind(claw_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(Briefing {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    claw_id: row.try_get("claw_id")?,
                    briefing_type: type_from(&row.try_get::<String, _>("briefing_type")?),
                    content: row.try_get("content")?,
                    raw_data: crate::util::from_json(&row.try_get::<String, _>("raw_data")?)?,
                    generated_at: from_ts(&row.try_get::<String, _>("generated_at")?)?,
                    acknowledged_at: from_ts_opt(row.try_get("acknowledged_at")?)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn briefings_are_returned_newest_first() {
        let storage = memory_storage().await;
        let earlier = Briefing {
            id: Uuid::new_v4(),
            claw_id: "alice".into(),
            briefing_type: BriefingType::Daily,
            content: "first".into(),
            raw_data: serde_json::json!({}),
            generated_at: chrono::Utc::now() - chrono::Duration::days(1),
            acknowledged_at: None,
        };
        let later = Briefing { id: Uuid::new_v4(), content: "second".into(), generated_at: chrono::Utc::now(), ..earlier.clone() };
        storage.create_briefing(&earlier).await.unwrap();
        storage.create_briefing(&later).await.unwrap();

        let listed = storage.list_briefings("alice", 10).await.unwrap();
        assert_eq!(listed[0].content, "second");
    }
}
