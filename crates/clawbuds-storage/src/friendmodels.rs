use crate::error::StorageResult;
use crate::util::{from_ts_opt, to_json, to_ts_opt};
use crate::Storage;
use clawbuds_proto::FriendModel;
use sqlx::Row;

impl Storage {
    pub async fn get_or_create_friend_model(&self, claw_id: &str, friend_id: &str) -> StorageResult<FriendModel> {
        if let Some(existing) = self.get_friend_model(claw_id, friend_id).await? {
            return Ok(existing);
        }
        let model = FriendModel::new(claw_id.to_string(), friend_id.to_string());
        self.save_friend_model(&model).await?;
        Ok(model)
    }

    pub async fn get_friend_model(&self, claw_id: &str, friend_id: &str) -> StorageResult<Option<FriendModel>> {
        let row = sqlx::query("SELECT * FROM friend_models WHERE claw_id = ? AND friend_id = ?")
            .bind(claw_id)
            .bind(friend_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_model).transpose()
    }

    pub async fn save_friend_model(&self, model: &FriendModel) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO friend_models (claw_id, friend_id, last_known_state, inferred_interests, \
             expertise_tags, last_heartbeat_at, last_interaction_at, emotional_tone, \
             inferred_needs, knowledge_gaps) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (claw_id, friend_id) DO UPDATE SET \
             last_known_state = excluded.last_known_state, \
             inferred_interests = excluded.inferred_interests, \
             expertise_tags = excluded.expertise_tags, \
             last_heartbeat_at = excluded.last_heartbeat_at, \
             last_interaction_at = excluded.last_interaction_at, \
             emotional_tone = excluded.emotional_tone, \
             inferred_needs = excluded.inferred_needs, \
             knowledge_gaps = excluded.knowledge_gaps",
        )
        .bind(&model.claw_id)
        .bind(&model.friend_id)
        .bind(&model.last_known_state)
        .bind(to_json(&model.inferred_interests)?)
        .bind(to_json(&model.expertise_tags)?)
        .bind(to_ts_opt(model.last_heartbeat_at))
        .bind(to_ts_opt(model.last_interaction_at))
        .bind(&model.emotional_tone)
        .bind(to_json(&model.inferred_needs)?)
        .bind(to_json(&model.knowledge_gaps)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removed alongside the friendship (spec.md §3: FriendModel destroyed
    /// when the friendship is removed).
    pub async fn delete_friend_models_for_pair(&self, a: &str, b: &str) -> StorageResult<()> {
        sqlx::query(
            "DELETE FROM friend_models WHERE (claw_id = ? AND friend_id = ?) OR (claw_id = ? AND friend_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_model(row: sqlx::any::AnyRow) -> StorageResult<FriendModel> {
    Ok(FriendModel {
        claw_id: row.try_get("claw_id")?,
        friend_id: row.try_get("friend_id")?,
        last_known_state: row.try_get("last_known_state")?,
        inferred_interests: crate::util::from_json(&row.try_get::<String, _>("inferred_interests")?)?,
        expertise_tags: crate::util::from_json(&row.try_get::<String, _>("expertise_tags")?)?,
        last_heartbeat_at: from_ts_opt(row.try_get("last_heartbeat_at")?)?,
        last_interaction_at: from_ts_opt(row.try_get("last_interaction_at")?)?,
        emotional_tone: row.try_get("emotional_tone")?,
        inferred_needs: crate::util::from_json(&row.try_get::<String, _>("inferred_needs")?)?,
        knowledge_gaps: crate::util::from_json(&row.try_get::<String, _>("knowledge_gaps")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let storage = memory_storage().await;
        let first = storage.get_or_create_friend_model("alice", "bob").await.unwrap();
        let second = storage.get_or_create_friend_model("alice", "bob").await.unwrap();
        assert_eq!(first.claw_id, second.claw_id);
        assert_eq!(storage.get_friend_model("alice", "bob").await.unwrap().is_some(), true);
    }

    #[tokio::test]
    async fn save_upserts_expertise_tags() {
        let storage = memory_storage().await;
        let mut model = storage.get_or_create_friend_model("alice", "bob").await.unwrap();
        model.expertise_tags.insert("rust".into(), 0.3);
        storage.save_friend_model(&model).await.unwrap();
        let reloaded = storage.get_friend_model("alice", "bob").await.unwrap().unwrap();
        assert_eq!(reloaded.expertise_tags.get("rust"), Some(&0.3));
    }
}
