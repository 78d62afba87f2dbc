use crate::error::{classify, StorageResult};
use crate::util::{from_ts, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::{AutonomyLevel, Claw, ClawStatus};
use sqlx::Row;
use std::collections::BTreeSet;

fn status_str(s: ClawStatus) -> &'static str {
    match s {
        ClawStatus::Active => "active",
        ClawStatus::Suspended => "suspended",
        ClawStatus::Deactivated => "deactivated",
    }
}

fn status_from(s: &str) -> ClawStatus {
    match s {
        "suspended" => ClawStatus::Suspended,
        "deactivated" => ClawStatus::Deactivated,
        _ => ClawStatus::Active,
    }
}

fn autonomy_str(a: AutonomyLevel) -> &'static str {
    match a {
        AutonomyLevel::Manual => "manual",
        AutonomyLevel::Assisted => "assisted",
        AutonomyLevel::Autonomous => "autonomous",
    }
}

fn autonomy_from(s: &str) -> AutonomyLevel {
    match s {
        "manual" => AutonomyLevel::Manual,
        "autonomous" => AutonomyLevel::Autonomous,
        _ => AutonomyLevel::Assisted,
    }
}

fn row_to_claw(row: &sqlx::any::AnyRow) -> StorageResult<Claw> {
    let tags: BTreeSet<String> = crate::util::from_json(row.try_get::<String, _>("tags")?.as_str())?;
    Ok(Claw {
        claw_id: row.try_get("claw_id")?,
        public_key: row.try_get("public_key")?,
        display_name: row.try_get("display_name")?,
        bio: row.try_get("bio")?,
        status: status_from(&row.try_get::<String, _>("status")?),
        tags,
        discoverable: row.try_get::<i64, _>("discoverable")? != 0,
        avatar_url: row.try_get("avatar_url")?,
        autonomy_level: autonomy_from(&row.try_get::<String, _>("autonomy_level")?),
        autonomy_config: crate::util::from_json(
            row.try_get::<String, _>("autonomy_config")?.as_str(),
        )?,
        notification_preferences: crate::util::from_json(
            row.try_get::<String, _>("notification_preferences")?.as_str(),
        )?,
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
        last_seen_at: from_ts(&row.try_get::<String, _>("last_seen_at")?)?,
    })
}

impl Storage {
    pub async fn create_claw(&self, claw: &Claw) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO claws (claw_id, public_key, display_name, bio, status, tags, \
             discoverable, avatar_url, autonomy_level, autonomy_config, \
             notification_preferences, created_at, last_seen_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&claw.claw_id)
        .bind(&claw.public_key)
        .bind(&claw.display_name)
        .bind(&claw.bio)
        .bind(status_str(claw.status))
        .bind(to_json(&claw.tags)?)
        .bind(claw.discoverable as i64)
        .bind(&claw.avatar_url)
        .bind(autonomy_str(claw.autonomy_level))
        .bind(to_json(&claw.autonomy_config)?)
        .bind(to_json(&claw.notification_preferences)?)
        .bind(to_ts(claw.created_at))
        .bind(to_ts(claw.last_seen_at))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "claws.public_key"))?;
        Ok(())
    }

    pub async fn get_claw(&self, claw_id: &str) -> StorageResult<Option<Claw>> {
        let row = sqlx::query("SELECT * FROM claws WHERE claw_id = ?")
            .bind(claw_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_claw).transpose()
    }

    pub async fn get_claw_by_public_key(&self, public_key: &str) -> StorageResult<Option<Claw>> {
        let row = sqlx::query("SELECT * FROM claws WHERE public_key = ?")
            .bind(public_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_claw).transpose()
    }

    pub async fn update_claw_profile(
        &self,
        claw_id: &str,
        display_name: &str,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> StorageResult<()> {
        sqlx::query(
            "UPDATE claws SET display_name = ?, bio = ?, avatar_url = ? WHERE claw_id = ?",
        )
        .bind(display_name)
        .bind(bio)
        .bind(avatar_url)
        .bind(claw_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_claw_autonomy(
        &self,
        claw_id: &str,
        level: AutonomyLevel,
        config: &serde_json::Value,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE claws SET autonomy_level = ?, autonomy_config = ? WHERE claw_id = ?")
            .bind(autonomy_str(level))
            .bind(to_json(config)?)
            .bind(claw_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_claw_status(&self, claw_id: &str, status: ClawStatus) -> StorageResult<()> {
        sqlx::query("UPDATE claws SET status = ? WHERE claw_id = ?")
            .bind(status_str(status))
            .bind(claw_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Every registered claw id, for sweeps the scheduler runs against the
    /// whole population (briefing generation, carapace pruning).
    pub async fn list_claw_ids(&self) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT claw_id FROM claws").fetch_all(&self.pool).await?;
        rows.iter().map(|r| Ok(r.try_get::<String, _>("claw_id")?)).collect()
    }

    pub async fn touch_last_seen(&self, claw_id: &str) -> StorageResult<()> {
        sqlx::query("UPDATE claws SET last_seen_at = ? WHERE claw_id = ?")
            .bind(to_ts(chrono::Utc::now()))
            .bind(claw_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;
    use chrono::Utc;

    fn sample_claw(id: &str, pubkey: &str) -> Claw {
        Claw {
            claw_id: id.to_string(),
            public_key: pubkey.to_string(),
            display_name: "Alice".into(),
            bio: None,
            status: ClawStatus::Active,
            tags: BTreeSet::new(),
            discoverable: true,
            avatar_url: None,
            autonomy_level: AutonomyLevel::Assisted,
            autonomy_config: serde_json::json!({}),
            notification_preferences: serde_json::json!({}),
            created_at: Utc::now(),
            last_seen_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let storage = memory_storage().await;
        let claw = sample_claw("claw-1", "pubkey-1");
        storage.create_claw(&claw).await.expect("create");

        let fetched = storage.get_claw("claw-1").await.expect("get").expect("present");
        assert_eq!(fetched.display_name, "Alice");
        assert_eq!(fetched.status, ClawStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_public_key_is_rejected() {
        let storage = memory_storage().await;
        storage.create_claw(&sample_claw("claw-1", "shared-key")).await.expect("create");
        let err = storage
            .create_claw(&sample_claw("claw-2", "shared-key"))
            .await
            .expect_err("should collide");
        assert!(matches!(err, crate::StorageError::Duplicate(_)));
    }

    #[tokio::test]
    async fn profile_update_persists() {
        let storage = memory_storage().await;
        storage.create_claw(&sample_claw("claw-1", "pubkey-1")).await.expect("create");
        storage
            .update_claw_profile("claw-1", "New Name", Some("bio text"), None)
            .await
            .expect("update");
        let fetched = storage.get_claw("claw-1").await.expect("get").expect("present");
        assert_eq!(fetched.display_name, "New Name");
        assert_eq!(fetched.bio.as_deref(), Some("bio text"));
    }
}
