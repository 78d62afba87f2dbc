//! The message-adjacent surface the wire protocol names but the component
//! designs leave unspecified beyond an event name: reactions, poll votes, an
//! opaque E2EE key bundle per claw, and unsent message drafts.

use crate::error::StorageResult;
use crate::util::{from_ts, to_ts};
use crate::Storage;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Reaction {
    pub message_id: Uuid,
    pub claw_id: String,
    pub emoji: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PollVote {
    pub message_id: Uuid,
    pub claw_id: String,
    pub option_index: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageDraft {
    pub id: Uuid,
    pub claw_id: String,
    pub content: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Storage {
    /// Idempotent: reacting twice with the same emoji is a no-op, not a
    /// duplicate row, since `(message_id, claw_id, emoji)` is the key.
    pub async fn add_reaction(&self, message_id: Uuid, claw_id: &str, emoji: &str) -> StorageResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO reactions (message_id, claw_id, emoji, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(message_id.to_string())
        .bind(claw_id)
        .bind(emoji)
        .bind(to_ts(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_reaction(&self, message_id: Uuid, claw_id: &str, emoji: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM reactions WHERE message_id = ? AND claw_id = ? AND emoji = ?")
            .bind(message_id.to_string())
            .bind(claw_id)
            .bind(emoji)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_reactions(&self, message_id: Uuid) -> StorageResult<Vec<Reaction>> {
        let rows = sqlx::query("SELECT * FROM reactions WHERE message_id = ?")
            .bind(message_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Reaction {
                    message_id,
                    claw_id: row.try_get("claw_id")?,
                    emoji: row.try_get("emoji")?,
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    /// A second vote from the same claw replaces the first (one vote per
    /// claw per poll message).
    pub async fn cast_poll_vote(&self, message_id: Uuid, claw_id: &str, option_index: i64) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO poll_votes (message_id, claw_id, option_index, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(message_id, claw_id) DO UPDATE SET option_index = excluded.option_index, created_at = excluded.created_at",
        )
        .bind(message_id.to_string())
        .bind(claw_id)
        .bind(option_index)
        .bind(to_ts(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_poll_votes(&self, message_id: Uuid) -> StorageResult<Vec<PollVote>> {
        let rows = sqlx::query("SELECT * FROM poll_votes WHERE message_id = ?")
            .bind(message_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(PollVote {
                    message_id,
                    claw_id: row.try_get("claw_id")?,
                    option_index: row.try_get("option_index")?,
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    /// `key_bundle` is opaque to the core (spec.md: E2EE key management is a
    /// client concern); the server only stores and republishes it.
    pub async fn upsert_e2ee_key_bundle(&self, claw_id: &str, key_bundle: &str) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO e2ee_keys (claw_id, key_bundle, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(claw_id) DO UPDATE SET key_bundle = excluded.key_bundle, updated_at = excluded.updated_at",
        )
        .bind(claw_id)
        .bind(key_bundle)
        .bind(to_ts(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_e2ee_key_bundle(&self, claw_id: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT key_bundle FROM e2ee_keys WHERE claw_id = ?")
            .bind(claw_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<String, _>("key_bundle")).transpose().map_err(Into::into)
    }

    pub async fn save_draft(&self, claw_id: &str, content: &str) -> StorageResult<MessageDraft> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query("INSERT INTO message_drafts (id, claw_id, content, updated_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(claw_id)
            .bind(content)
            .bind(to_ts(now))
            .execute(&self.pool)
            .await?;
        Ok(MessageDraft { id, claw_id: claw_id.to_string(), content: content.to_string(), updated_at: now })
    }

    pub async fn list_drafts(&self, claw_id: &str) -> StorageResult<Vec<MessageDraft>> {
        let rows = sqlx::query("SELECT * FROM message_drafts WHERE claw_id = ? ORDER BY updated_at DESC")
            .bind(claw_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(MessageDraft {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    claw_id: row.try_get("claw_id")?,
                    content: row.try_get("content")?,
                    updated_at: from_ts(&row.try_get::<String, _>("updated_at")?)?,
                })
            })
            .collect()
    }

    pub async fn delete_draft(&self, claw_id: &str, id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM message_drafts WHERE claw_id = ? AND id = ?")
            .bind(claw_id)
            .bind(id.to_string())
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
    async fn reacting_twice_with_same_emoji_is_idempotent() {
        let storage = memory_storage().await;
        let message_id = Uuid::new_v4();
        storage.add_reaction(message_id, "alice", "👍").await.unwrap();
        storage.add_reaction(message_id, "alice", "👍").await.unwrap();
        assert_eq!(storage.list_reactions(message_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_poll_vote_replaces_the_first() {
        let storage = memory_storage().await;
        let message_id = Uuid::new_v4();
        storage.cast_poll_vote(message_id, "alice", 0).await.unwrap();
        storage.cast_poll_vote(message_id, "alice", 2).await.unwrap();
        let votes = storage.list_poll_votes(message_id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].option_index, 2);
    }

    #[tokio::test]
    async fn e2ee_bundle_upsert_overwrites() {
        let storage = memory_storage().await;
        storage.upsert_e2ee_key_bundle("alice", "bundle-v1").await.unwrap();
        storage.upsert_e2ee_key_bundle("alice", "bundle-v2").await.unwrap();
        assert_eq!(storage.get_e2ee_key_bundle("alice").await.unwrap().as_deref(), Some("bundle-v2"));
    }
}
