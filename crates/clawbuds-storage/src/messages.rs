use crate::error::{classify, StorageResult};
use crate::util::{from_ts, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::{Block, InboxEntry, InboxStatus, Message, Visibility};
use sqlx::Row;
use uuid::Uuid;

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Direct => "direct",
        Visibility::Circles => "circles",
        Visibility::Group => "group",
    }
}

fn visibility_from(s: &str) -> Visibility {
    match s {
        "direct" => Visibility::Direct,
        "circles" => Visibility::Circles,
        "group" => Visibility::Group,
        _ => Visibility::Public,
    }
}

fn parse_uuid(s: String) -> StorageResult<Uuid> {
    Uuid::parse_str(&s).map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn parse_uuid_opt(s: Option<String>) -> StorageResult<Option<Uuid>> {
    s.map(parse_uuid).transpose()
}

fn row_to_message(row: sqlx::any::AnyRow) -> StorageResult<Message> {
    Ok(Message {
        id: parse_uuid(row.try_get("id")?)?,
        from_claw_id: row.try_get("from_claw_id")?,
        blocks: crate::util::from_json(&row.try_get::<String, _>("blocks")?)?,
        visibility: visibility_from(&row.try_get::<String, _>("visibility")?),
        group_id: parse_uuid_opt(row.try_get("group_id")?)?,
        reply_to: parse_uuid_opt(row.try_get("reply_to")?)?,
        content_warning: row.try_get("content_warning")?,
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
        edited_at: row.try_get::<Option<String>, _>("edited_at")?.map(|s| from_ts(&s)).transpose()?,
    })
}

impl Storage {
    /// Persists a `Message` and one `InboxEntry` per recipient atomically.
    /// `seq` for each recipient is `prevMax + 1`. On any failure the whole
    /// transaction rolls back, leaving no orphan `Message` (spec.md §5).
    pub async fn fan_out_message(
        &self,
        from_claw_id: &str,
        blocks: &[Block],
        visibility: Visibility,
        group_id: Option<Uuid>,
        reply_to: Option<Uuid>,
        content_warning: Option<&str>,
        recipients: &[String],
    ) -> StorageResult<(Message, Vec<InboxEntry>)> {
        let message = Message {
            id: Uuid::new_v4(),
            from_claw_id: from_claw_id.to_string(),
            blocks: blocks.to_vec(),
            visibility,
            group_id,
            reply_to,
            content_warning: content_warning.map(str::to_string),
            created_at: chrono::Utc::now(),
            edited_at: None,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO messages (id, from_claw_id, blocks, visibility, group_id, reply_to, \
             content_warning, created_at, edited_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(message.id.to_string())
        .bind(&message.from_claw_id)
        .bind(to_json(&message.blocks)?)
        .bind(visibility_str(message.visibility))
        .bind(message.group_id.map(|g| g.to_string()))
        .bind(message.reply_to.map(|r| r.to_string()))
        .bind(&message.content_warning)
        .bind(to_ts(message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, "messages"))?;

        let mut entries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) as max_seq FROM inbox_entries WHERE recipient_id = ?")
                .bind(recipient)
                .fetch_one(&mut *tx)
                .await?;
            let next_seq: i64 = row.try_get::<i64, _>("max_seq")? + 1;

            let entry = InboxEntry {
                id: Uuid::new_v4(),
                recipient_id: recipient.clone(),
                message_id: message.id,
                seq: next_seq,
                status: InboxStatus::Unread,
                created_at: message.created_at,
            };
            sqlx::query(
                "INSERT INTO inbox_entries (id, recipient_id, message_id, seq, status, created_at) \
                 VALUES (?, ?, ?, ?, 'unread', ?)",
            )
            .bind(entry.id.to_string())
            .bind(&entry.recipient_id)
            .bind(entry.message_id.to_string())
            .bind(entry.seq)
            .bind(to_ts(entry.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, "inbox_entries"))?;
            entries.push(entry);
        }

        tx.commit().await?;
        Ok((message, entries))
    }

    pub async fn get_message(&self, id: Uuid) -> StorageResult<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_message).transpose()
    }

    pub async fn edit_message(&self, id: Uuid, blocks: &[Block]) -> StorageResult<()> {
        sqlx::query("UPDATE messages SET blocks = ?, edited_at = ? WHERE id = ?")
            .bind(to_json(blocks)?)
            .bind(to_ts(chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes a message and every row that references it (inbox entries,
    /// reactions, poll votes) so nothing orphans.
    pub async fn delete_message(&self, id: Uuid) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM inbox_entries WHERE message_id = ?").bind(id.to_string()).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM reactions WHERE message_id = ?").bind(id.to_string()).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM poll_votes WHERE message_id = ?").bind(id.to_string()).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM messages WHERE id = ?").bind(id.to_string()).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Direct messages `from_claw_id` sent to `to_claw_id` since `since`,
    /// used by the reflex engine's grooming-pattern analysis.
    pub async fn list_direct_messages(
        &self,
        from_claw_id: &str,
        to_claw_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> StorageResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.* FROM messages m JOIN inbox_entries i ON i.message_id = m.id \
             WHERE m.from_claw_id = ? AND i.recipient_id = ? AND m.visibility = 'direct' AND m.created_at >= ?",
        )
        .bind(from_claw_id)
        .bind(to_claw_id)
        .bind(to_ts(since))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_message).collect()
    }

    pub async fn list_group_messages(&self, group_id: Uuid, limit: i64) -> StorageResult<Vec<Message>> {
        let rows = sqlx::query("SELECT * FROM messages WHERE group_id = ? ORDER BY created_at ASC LIMIT ?")
            .bind(group_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_message).collect()
    }

    /// How many of `message_ids` were replied to by `from_claw_id`.
    pub async fn count_replies_to(&self, from_claw_id: &str, message_ids: &[Uuid]) -> StorageResult<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = std::iter::repeat("?").take(message_ids.len()).collect::<Vec<_>>().join(",");
        let sql = format!("SELECT COUNT(*) as c FROM messages WHERE from_claw_id = ? AND reply_to IN ({placeholders})");
        let mut query = sqlx::query(&sql).bind(from_claw_id);
        for id in message_ids {
            query = query.bind(id.to_string());
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("c")? as usize)
    }

    /// Ordered ascending by `seq`, per spec.md §4.2.
    pub async fn list_inbox(&self, recipient_id: &str, after_seq: i64, limit: i64) -> StorageResult<Vec<InboxEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM inbox_entries WHERE recipient_id = ? AND seq > ? ORDER BY seq ASC LIMIT ?",
        )
        .bind(recipient_id)
        .bind(after_seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(InboxEntry {
                    id: parse_uuid(row.try_get("id")?)?,
                    recipient_id: row.try_get("recipient_id")?,
                    message_id: parse_uuid(row.try_get("message_id")?)?,
                    seq: row.try_get("seq")?,
                    status: match row.try_get::<String, _>("status")?.as_str() {
                        "read" => InboxStatus::Read,
                        "acked" => InboxStatus::Acked,
                        _ => InboxStatus::Unread,
                    },
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    /// Advances an inbox entry's status; `status` is taken verbatim so a
    /// caller can't regress `acked` back to `read` by replaying an older ack.
    pub async fn set_inbox_status(&self, recipient_id: &str, message_id: Uuid, status: InboxStatus) -> StorageResult<()> {
        let s = match status {
            InboxStatus::Unread => "unread",
            InboxStatus::Read => "read",
            InboxStatus::Acked => "acked",
        };
        sqlx::query("UPDATE inbox_entries SET status = ? WHERE recipient_id = ? AND message_id = ?")
            .bind(s)
            .bind(recipient_id)
            .bind(message_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    fn text_block(s: &str) -> Vec<Block> {
        vec![Block::Text { text: s.to_string() }]
    }

    #[tokio::test]
    async fn fan_out_conservation() {
        let storage = memory_storage().await;
        let recipients = vec!["bob".to_string(), "charlie".to_string(), "dave".to_string()];
        let (message, entries) = storage
            .fan_out_message("alice", &text_block("hi"), Visibility::Direct, None, None, None, &recipients)
            .await
            .expect("fan out");
        assert_eq!(entries.len(), recipients.len());
        for entry in &entries {
            assert_eq!(entry.message_id, message.id);
            assert_eq!(entry.seq, 1);
        }
    }

    #[tokio::test]
    async fn seq_is_per_recipient_monotone() {
        let storage = memory_storage().await;
        let recipients = vec!["bob".to_string()];
        storage
            .fan_out_message("alice", &text_block("one"), Visibility::Direct, None, None, None, &recipients)
            .await
            .unwrap();
        let (_, second) = storage
            .fan_out_message("alice", &text_block("two"), Visibility::Direct, None, None, None, &recipients)
            .await
            .unwrap();
        assert_eq!(second[0].seq, 2);
    }

    #[tokio::test]
    async fn duplicate_recipient_does_not_double_write() {
        let storage = memory_storage().await;
        let recipients = vec!["bob".to_string(), "bob".to_string()];
        let result = storage
            .fan_out_message("alice", &text_block("hi"), Visibility::Direct, None, None, None, &recipients)
            .await;
        assert!(result.is_err(), "unique (recipient, seq) must reject a duplicated recipient list");
    }
}
