use crate::error::{classify, StorageResult};
use crate::util::to_ts;
use crate::Storage;
use clawbuds_proto::Circle;
use sqlx::Row;
use uuid::Uuid;

impl Storage {
    pub async fn count_circles(&self, owner_id: &str) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM circles WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    pub async fn create_circle(&self, owner_id: &str, name: &str) -> StorageResult<Circle> {
        let circle = Circle { id: Uuid::new_v4(), owner_id: owner_id.to_string(), name: name.to_string(), created_at: chrono::Utc::now() };
        sqlx::query("INSERT INTO circles (id, owner_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(circle.id.to_string())
            .bind(&circle.owner_id)
            .bind(&circle.name)
            .bind(to_ts(circle.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "circles.owner_id+name"))?;
        Ok(circle)
    }

    pub async fn list_circles(&self, owner_id: &str) -> StorageResult<Vec<Circle>> {
        let rows = sqlx::query("SELECT * FROM circles WHERE owner_id = ? ORDER BY created_at")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Circle {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    owner_id: row.try_get("owner_id")?,
                    name: row.try_get("name")?,
                    created_at: crate::util::from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    pub async fn delete_circle(&self, circle_id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM circle_members WHERE circle_id = ?")
            .bind(circle_id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM circles WHERE id = ?")
            .bind(circle_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_circle_member(&self, circle_id: Uuid, friend_id: &str) -> StorageResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO circle_members (circle_id, friend_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(circle_id.to_string())
        .bind(friend_id)
        .bind(to_ts(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_circle_member(&self, circle_id: Uuid, friend_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM circle_members WHERE circle_id = ? AND friend_id = ?")
            .bind(circle_id.to_string())
            .bind(friend_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes `friend_id` from every circle owned by `owner_id` (friend removal cascade).
    pub async fn remove_friend_from_all_circles(&self, owner_id: &str, friend_id: &str) -> StorageResult<()> {
        sqlx::query(
            "DELETE FROM circle_members WHERE friend_id = ? AND circle_id IN \
             (SELECT id FROM circles WHERE owner_id = ?)",
        )
        .bind(friend_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_circle_members(&self, circle_id: Uuid) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT friend_id FROM circle_members WHERE circle_id = ?")
            .bind(circle_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(r.try_get::<String, _>("friend_id")?)).collect()
    }

    /// Resolves the deduplicated union of members across circles by name, owned by `owner_id`.
    pub async fn resolve_circle_members_by_name(
        &self,
        owner_id: &str,
        circle_names: &[String],
    ) -> StorageResult<Vec<String>> {
        let mut members = std::collections::BTreeSet::new();
        for name in circle_names {
            let row = sqlx::query("SELECT id FROM circles WHERE owner_id = ? AND name = ?")
                .bind(owner_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = row {
                let circle_id = Uuid::parse_str(&row.try_get::<String, _>("id")?)
                    .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?;
                for m in self.list_circle_members(circle_id).await? {
                    members.insert(m);
                }
            }
        }
        Ok(members.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn multi_circle_union_is_deduplicated() {
        let storage = memory_storage().await;
        let a = storage.create_circle("alice", "layer-a").await.expect("create");
        let b = storage.create_circle("alice", "layer-b").await.expect("create");
        storage.add_circle_member(a.id, "bob").await.unwrap();
        storage.add_circle_member(a.id, "charlie").await.unwrap();
        storage.add_circle_member(b.id, "charlie").await.unwrap();
        storage.add_circle_member(b.id, "dave").await.unwrap();

        let members = storage
            .resolve_circle_members_by_name("alice", &["layer-a".into(), "layer-b".into()])
            .await
            .expect("resolve");
        assert_eq!(members, vec!["bob".to_string(), "charlie".to_string(), "dave".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_circle_name_rejected() {
        let storage = memory_storage().await;
        storage.create_circle("alice", "work").await.unwrap();
        let err = storage.create_circle("alice", "work").await.unwrap_err();
        assert!(matches!(err, crate::StorageError::Duplicate(_)));
    }
}
