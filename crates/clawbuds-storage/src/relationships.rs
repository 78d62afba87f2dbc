use crate::error::StorageResult;
use crate::util::{from_ts_opt, to_ts_opt};
use crate::Storage;
use clawbuds_proto::{DunbarLayer, RelationshipStrength};
use sqlx::Row;

fn layer_str(l: DunbarLayer) -> &'static str {
    match l {
        DunbarLayer::Core => "core",
        DunbarLayer::Sympathy => "sympathy",
        DunbarLayer::Active => "active",
        DunbarLayer::Casual => "casual",
    }
}

fn layer_from(s: &str) -> DunbarLayer {
    match s {
        "core" => DunbarLayer::Core,
        "sympathy" => DunbarLayer::Sympathy,
        "active" => DunbarLayer::Active,
        _ => DunbarLayer::Casual,
    }
}

fn row_to_relationship(row: sqlx::any::AnyRow) -> StorageResult<RelationshipStrength> {
    Ok(RelationshipStrength {
        claw_id: row.try_get("claw_id")?,
        friend_id: row.try_get("friend_id")?,
        strength: row.try_get("strength")?,
        dunbar_layer: layer_from(&row.try_get::<String, _>("dunbar_layer")?),
        manual_override: row.try_get::<i64, _>("manual_override")? != 0,
        last_interaction_at: from_ts_opt(row.try_get("last_interaction_at")?)?,
    })
}

impl Storage {
    pub async fn get_or_create_relationship(&self, claw_id: &str, friend_id: &str) -> StorageResult<RelationshipStrength> {
        if let Some(existing) = self.get_relationship(claw_id, friend_id).await? {
            return Ok(existing);
        }
        let r = RelationshipStrength::new(claw_id.to_string(), friend_id.to_string());
        self.save_relationship(&r).await?;
        Ok(r)
    }

    pub async fn get_relationship(&self, claw_id: &str, friend_id: &str) -> StorageResult<Option<RelationshipStrength>> {
        let row = sqlx::query("SELECT * FROM relationship_strengths WHERE claw_id = ? AND friend_id = ?")
            .bind(claw_id)
            .bind(friend_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_relationship).transpose()
    }

    pub async fn save_relationship(&self, r: &RelationshipStrength) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO relationship_strengths (claw_id, friend_id, strength, dunbar_layer, \
             manual_override, last_interaction_at) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (claw_id, friend_id) DO UPDATE SET \
             strength = excluded.strength, dunbar_layer = excluded.dunbar_layer, \
             manual_override = excluded.manual_override, last_interaction_at = excluded.last_interaction_at",
        )
        .bind(&r.claw_id)
        .bind(&r.friend_id)
        .bind(r.strength)
        .bind(layer_str(r.dunbar_layer))
        .bind(r.manual_override as i64)
        .bind(to_ts_opt(r.last_interaction_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All relationships owned by `claw_id`, used by the daily reclassification pass.
    pub async fn list_relationships_for_owner(&self, claw_id: &str) -> StorageResult<Vec<RelationshipStrength>> {
        let rows = sqlx::query("SELECT * FROM relationship_strengths WHERE claw_id = ?")
            .bind(claw_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_relationship).collect()
    }

    pub async fn list_owners_with_relationships(&self) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT claw_id FROM relationship_strengths")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(r.try_get::<String, _>("claw_id")?)).collect()
    }

    pub async fn delete_relationships_for_pair(&self, a: &str, b: &str) -> StorageResult<()> {
        sqlx::query(
            "DELETE FROM relationship_strengths WHERE (claw_id = ? AND friend_id = ?) OR (claw_id = ? AND friend_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Interaction boost already applied for `(claw_id, friend_id)` on `boost_date`
    /// (an RFC3339 UTC calendar date string, e.g. `"2026-07-27"`).
    pub async fn daily_boost_used(&self, claw_id: &str, friend_id: &str, boost_date: &str) -> StorageResult<f64> {
        let row = sqlx::query(
            "SELECT boost_used FROM relationship_daily_boosts WHERE claw_id = ? AND friend_id = ? AND boost_date = ?",
        )
        .bind(claw_id)
        .bind(friend_id)
        .bind(boost_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get::<f64, _>("boost_used")).transpose()?.unwrap_or(0.0))
    }

    /// Records that `additional` more boost was applied today, returning the new running total.
    pub async fn add_daily_boost_used(
        &self,
        claw_id: &str,
        friend_id: &str,
        boost_date: &str,
        additional: f64,
    ) -> StorageResult<f64> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT boost_used FROM relationship_daily_boosts WHERE claw_id = ? AND friend_id = ? AND boost_date = ?",
        )
        .bind(claw_id)
        .bind(friend_id)
        .bind(boost_date)
        .fetch_optional(&mut *tx)
        .await?;
        let current = row.map(|r| r.try_get::<f64, _>("boost_used")).transpose()?.unwrap_or(0.0);
        let updated = current + additional;
        sqlx::query(
            "INSERT INTO relationship_daily_boosts (claw_id, friend_id, boost_date, boost_used) VALUES (?, ?, ?, ?) \
             ON CONFLICT (claw_id, friend_id, boost_date) DO UPDATE SET boost_used = excluded.boost_used",
        )
        .bind(claw_id)
        .bind(friend_id)
        .bind(boost_date)
        .bind(updated)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes boost-tracking rows older than `before_date`, called from the
    /// same daily pass that runs decay and reclassification.
    pub async fn prune_daily_boosts_before(&self, before_date: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM relationship_daily_boosts WHERE boost_date < ?")
            .bind(before_date)
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
    async fn initial_relationship_defaults() {
        let storage = memory_storage().await;
        let r = storage.get_or_create_relationship("alice", "bob").await.unwrap();
        assert_eq!(r.strength, 0.5);
        assert_eq!(r.dunbar_layer, DunbarLayer::Casual);
    }

    #[tokio::test]
    async fn save_overwrites_on_conflict() {
        let storage = memory_storage().await;
        let mut r = storage.get_or_create_relationship("alice", "bob").await.unwrap();
        r.strength = 0.9;
        r.dunbar_layer = DunbarLayer::Core;
        storage.save_relationship(&r).await.unwrap();
        let reloaded = storage.get_relationship("alice", "bob").await.unwrap().unwrap();
        assert_eq!(reloaded.strength, 0.9);
        assert_eq!(reloaded.dunbar_layer, DunbarLayer::Core);
    }

    #[tokio::test]
    async fn daily_boost_accumulates_and_resets_per_date() {
        let storage = memory_storage().await;
        assert_eq!(storage.daily_boost_used("alice", "bob", "2026-07-27").await.unwrap(), 0.0);

        let total = storage.add_daily_boost_used("alice", "bob", "2026-07-27", 0.05).await.unwrap();
        assert_eq!(total, 0.05);
        let total = storage.add_daily_boost_used("alice", "bob", "2026-07-27", 0.05).await.unwrap();
        assert_eq!(total, 0.10);

        // A new day starts a fresh running total.
        assert_eq!(storage.daily_boost_used("alice", "bob", "2026-07-28").await.unwrap(), 0.0);
    }
}
