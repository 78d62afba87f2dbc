use crate::error::{classify, StorageResult};
use crate::util::{from_ts, to_ts};
use crate::Storage;
use clawbuds_proto::{Friendship, FriendshipStatus};
use sqlx::Row;
use uuid::Uuid;

fn status_str(s: FriendshipStatus) -> &'static str {
    match s {
        FriendshipStatus::Pending => "pending",
        FriendshipStatus::Accepted => "accepted",
        FriendshipStatus::Rejected => "rejected",
        FriendshipStatus::Blocked => "blocked",
    }
}

fn status_from(s: &str) -> FriendshipStatus {
    match s {
        "accepted" => FriendshipStatus::Accepted,
        "rejected" => FriendshipStatus::Rejected,
        "blocked" => FriendshipStatus::Blocked,
        _ => FriendshipStatus::Pending,
    }
}

fn row_to_friendship(row: &sqlx::any::AnyRow) -> StorageResult<Friendship> {
    Ok(Friendship {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
            .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        requester_id: row.try_get("requester_id")?,
        accepter_id: row.try_get("accepter_id")?,
        status: status_from(&row.try_get::<String, _>("status")?),
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: from_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl Storage {
    /// The single non-terminal record for an unordered pair, if any.
    pub async fn find_active_friendship(
        &self,
        a: &str,
        b: &str,
    ) -> StorageResult<Option<Friendship>> {
        let row = sqlx::query(
            "SELECT * FROM friendships WHERE \
             ((requester_id = ? AND accepter_id = ?) OR (requester_id = ? AND accepter_id = ?)) \
             AND status IN ('pending', 'accepted') \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_friendship).transpose()
    }

    pub async fn create_friendship(
        &self,
        requester_id: &str,
        accepter_id: &str,
        status: FriendshipStatus,
    ) -> StorageResult<Friendship> {
        let now = chrono::Utc::now();
        let friendship = Friendship {
            id: Uuid::new_v4(),
            requester_id: requester_id.to_string(),
            accepter_id: accepter_id.to_string(),
            status,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO friendships (id, requester_id, accepter_id, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(friendship.id.to_string())
        .bind(&friendship.requester_id)
        .bind(&friendship.accepter_id)
        .bind(status_str(friendship.status))
        .bind(to_ts(now))
        .bind(to_ts(now))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "friendships"))?;
        Ok(friendship)
    }

    pub async fn set_friendship_status(
        &self,
        id: Uuid,
        status: FriendshipStatus,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE friendships SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_str(status))
            .bind(to_ts(chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_friends(&self, claw_id: &str) -> StorageResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT requester_id, accepter_id FROM friendships \
             WHERE (requester_id = ? OR accepter_id = ?) AND status = 'accepted'",
        )
        .bind(claw_id)
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let requester: String = row.try_get("requester_id")?;
            let accepter: String = row.try_get("accepter_id")?;
            out.push(if requester == claw_id { accepter } else { requester });
        }
        Ok(out)
    }

    pub async fn are_friends(&self, a: &str, b: &str) -> StorageResult<bool> {
        let row = sqlx::query(
            "SELECT 1 as present FROM friendships WHERE \
             ((requester_id = ? AND accepter_id = ?) OR (requester_id = ? AND accepter_id = ?)) \
             AND status = 'accepted' LIMIT 1",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn list_pending_requests(&self, claw_id: &str) -> StorageResult<Vec<Friendship>> {
        let rows = sqlx::query(
            "SELECT * FROM friendships WHERE accepter_id = ? AND status = 'pending' \
             ORDER BY created_at DESC",
        )
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_friendship).collect()
    }

    /// Removes the accepted friendship between `a` and `b`, if any.
    pub async fn remove_friendship(&self, a: &str, b: &str) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM friendships WHERE \
             ((requester_id = ? AND accepter_id = ?) OR (requester_id = ? AND accepter_id = ?)) \
             AND status = 'accepted'",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
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
    async fn auto_accept_on_reverse_pending() {
        let storage = memory_storage().await;
        storage
            .create_friendship("alice", "bob", FriendshipStatus::Pending)
            .await
            .expect("request");
        let existing = storage.find_active_friendship("bob", "alice").await.expect("find");
        assert!(existing.is_some());
        let friendship = existing.unwrap();
        storage
            .set_friendship_status(friendship.id, FriendshipStatus::Accepted)
            .await
            .expect("accept");

        let alice_friends = storage.list_friends("alice").await.expect("list");
        let bob_friends = storage.list_friends("bob").await.expect("list");
        assert_eq!(alice_friends, vec!["bob".to_string()]);
        assert_eq!(bob_friends, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn removal_is_symmetric() {
        let storage = memory_storage().await;
        let f = storage
            .create_friendship("alice", "bob", FriendshipStatus::Accepted)
            .await
            .expect("create");
        let _ = f;
        storage.remove_friendship("bob", "alice").await.expect("remove");
        assert!(storage.list_friends("alice").await.unwrap().is_empty());
        assert!(storage.list_friends("bob").await.unwrap().is_empty());
    }
}
