use crate::error::StorageResult;
use crate::util::{from_ts, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::{Pearl, PearlEndorsement, PearlOriginType, PearlShare, PearlType, Shareability};
use sqlx::Row;
use uuid::Uuid;

fn pearl_type_str(t: PearlType) -> &'static str {
    match t {
        PearlType::Insight => "insight",
        PearlType::Framework => "framework",
        PearlType::Experience => "experience",
    }
}
fn pearl_type_from(s: &str) -> PearlType {
    match s {
        "framework" => PearlType::Framework,
        "experience" => PearlType::Experience,
        _ => PearlType::Insight,
    }
}
fn shareability_str(s: Shareability) -> &'static str {
    match s {
        Shareability::Private => "private",
        Shareability::FriendsOnly => "friends_only",
        Shareability::Public => "public",
    }
}
fn shareability_from(s: &str) -> Shareability {
    match s {
        "public" => Shareability::Public,
        "friends_only" => Shareability::FriendsOnly,
        _ => Shareability::Private,
    }
}
fn origin_str(o: PearlOriginType) -> &'static str {
    match o {
        PearlOriginType::Manual => "manual",
        PearlOriginType::Extracted => "extracted",
        PearlOriginType::Synthesized => "synthesized",
    }
}
fn origin_from(s: &str) -> PearlOriginType {
    match s {
        "extracted" => PearlOriginType::Extracted,
        "synthesized" => PearlOriginType::Synthesized,
        _ => PearlOriginType::Manual,
    }
}

fn row_to_pearl(row: sqlx::any::AnyRow) -> StorageResult<Pearl> {
    Ok(Pearl {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
            .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        owner_id: row.try_get("owner_id")?,
        pearl_type: pearl_type_from(&row.try_get::<String, _>("pearl_type")?),
        trigger_text: row.try_get("trigger_text")?,
        body: row.try_get("body")?,
        context: row.try_get("context")?,
        domain_tags: crate::util::from_json(&row.try_get::<String, _>("domain_tags")?)?,
        luster: row.try_get("luster")?,
        shareability: shareability_from(&row.try_get::<String, _>("shareability")?),
        origin_type: origin_from(&row.try_get::<String, _>("origin_type")?),
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

impl Storage {
    pub async fn create_pearl(&self, pearl: &Pearl) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO pearls (id, owner_id, pearl_type, trigger_text, body, context, \
             domain_tags, luster, shareability, origin_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pearl.id.to_string())
        .bind(&pearl.owner_id)
        .bind(pearl_type_str(pearl.pearl_type))
        .bind(&pearl.trigger_text)
        .bind(&pearl.body)
        .bind(&pearl.context)
        .bind(to_json(&pearl.domain_tags)?)
        .bind(pearl.luster)
        .bind(shareability_str(pearl.shareability))
        .bind(origin_str(pearl.origin_type))
        .bind(to_ts(pearl.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Used by the reflex engine's pearl-routing pattern analysis.
    pub async fn list_pearls_by_owner(&self, owner_id: &str) -> StorageResult<Vec<Pearl>> {
        let rows = sqlx::query("SELECT * FROM pearls WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_pearl).collect()
    }

    pub async fn get_pearl(&self, id: Uuid) -> StorageResult<Option<Pearl>> {
        let row = sqlx::query("SELECT * FROM pearls WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_pearl).transpose()
    }

    pub async fn set_pearl_luster(&self, id: Uuid, luster: f64) -> StorageResult<()> {
        sqlx::query("UPDATE pearls SET luster = ? WHERE id = ?")
            .bind(luster)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// UNIQUE (pearl, endorser): a repeat endorsement overwrites the prior one.
    pub async fn upsert_endorsement(&self, endorsement: &PearlEndorsement) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO pearl_endorsements (pearl_id, endorser_id, score, comment, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (pearl_id, endorser_id) DO UPDATE SET \
             score = excluded.score, comment = excluded.comment, created_at = excluded.created_at",
        )
        .bind(endorsement.pearl_id.to_string())
        .bind(&endorsement.endorser_id)
        .bind(endorsement.score)
        .bind(&endorsement.comment)
        .bind(to_ts(endorsement.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_endorsements(&self, pearl_id: Uuid) -> StorageResult<Vec<PearlEndorsement>> {
        let rows = sqlx::query("SELECT * FROM pearl_endorsements WHERE pearl_id = ?")
            .bind(pearl_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(PearlEndorsement {
                    pearl_id,
                    endorser_id: row.try_get("endorser_id")?,
                    score: row.try_get("score")?,
                    comment: row.try_get("comment")?,
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    pub async fn create_pearl_share(&self, share: &PearlShare) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO pearl_shares (id, pearl_id, from_claw_id, to_claw_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(share.id.to_string())
        .bind(share.pearl_id.to_string())
        .bind(&share.from_claw_id)
        .bind(&share.to_claw_id)
        .bind(to_ts(share.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    fn sample_pearl(owner: &str) -> Pearl {
        Pearl {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            pearl_type: PearlType::Insight,
            trigger_text: "trigger".into(),
            body: None,
            context: None,
            domain_tags: vec!["AI".into()],
            luster: 0.5,
            shareability: Shareability::FriendsOnly,
            origin_type: PearlOriginType::Manual,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn repeat_endorsement_overwrites() {
        let storage = memory_storage().await;
        let pearl = sample_pearl("alice");
        storage.create_pearl(&pearl).await.unwrap();

        storage
            .upsert_endorsement(&PearlEndorsement {
                pearl_id: pearl.id,
                endorser_id: "bob".into(),
                score: 0.4,
                comment: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        storage
            .upsert_endorsement(&PearlEndorsement {
                pearl_id: pearl.id,
                endorser_id: "bob".into(),
                score: 0.9,
                comment: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let endorsements = storage.list_endorsements(pearl.id).await.unwrap();
        assert_eq!(endorsements.len(), 1);
        assert_eq!(endorsements[0].score, 0.9);
    }
}
