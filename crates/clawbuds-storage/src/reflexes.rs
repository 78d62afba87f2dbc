use crate::error::{classify, StorageResult};
use crate::util::{from_ts, to_json, to_ts};
use crate::Storage;
use clawbuds_proto::{ExecutionOutcome, Reflex, ReflexExecution, ReflexSource, ReflexStats, TriggerLayer};
use sqlx::Row;
use uuid::Uuid;

fn trigger_layer_str(t: TriggerLayer) -> &'static str {
    match t {
        TriggerLayer::L0 => "l0",
        TriggerLayer::L1 => "l1",
    }
}
fn trigger_layer_from(s: &str) -> TriggerLayer {
    if s == "l1" { TriggerLayer::L1 } else { TriggerLayer::L0 }
}
fn source_str(s: ReflexSource) -> &'static str {
    match s {
        ReflexSource::Builtin => "builtin",
        ReflexSource::User => "user",
        ReflexSource::MicroMolt => "micro_molt",
    }
}
fn source_from(s: &str) -> ReflexSource {
    match s {
        "user" => ReflexSource::User,
        "micro_molt" => ReflexSource::MicroMolt,
        _ => ReflexSource::Builtin,
    }
}
fn outcome_str(o: ExecutionOutcome) -> &'static str {
    match o {
        ExecutionOutcome::Executed => "executed",
        ExecutionOutcome::Recommended => "recommended",
        ExecutionOutcome::Blocked => "blocked",
        ExecutionOutcome::QueuedForL1 => "queued_for_l1",
    }
}
fn outcome_from(s: &str) -> ExecutionOutcome {
    match s {
        "executed" => ExecutionOutcome::Executed,
        "recommended" => ExecutionOutcome::Recommended,
        "blocked" => ExecutionOutcome::Blocked,
        _ => ExecutionOutcome::QueuedForL1,
    }
}

fn row_to_reflex(row: sqlx::any::AnyRow) -> StorageResult<Reflex> {
    Ok(Reflex {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
            .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        claw_id: row.try_get("claw_id")?,
        name: row.try_get("name")?,
        value_layer: row.try_get("value_layer")?,
        behavior: row.try_get("behavior")?,
        trigger_layer: trigger_layer_from(&row.try_get::<String, _>("trigger_layer")?),
        trigger_config: crate::util::from_json(&row.try_get::<String, _>("trigger_config")?)?,
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        confidence: row.try_get("confidence")?,
        source: source_from(&row.try_get::<String, _>("source")?),
    })
}

impl Storage {
    pub async fn create_reflex(&self, reflex: &Reflex) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO reflexes (id, claw_id, name, value_layer, behavior, trigger_layer, \
             trigger_config, enabled, confidence, source) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reflex.id.to_string())
        .bind(&reflex.claw_id)
        .bind(&reflex.name)
        .bind(&reflex.value_layer)
        .bind(&reflex.behavior)
        .bind(trigger_layer_str(reflex.trigger_layer))
        .bind(to_json(&reflex.trigger_config)?)
        .bind(reflex.enabled as i64)
        .bind(reflex.confidence)
        .bind(source_str(reflex.source))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "reflexes.claw_id+name"))?;
        Ok(())
    }

    pub async fn list_enabled_reflexes(&self, claw_id: &str) -> StorageResult<Vec<Reflex>> {
        let rows = sqlx::query("SELECT * FROM reflexes WHERE claw_id = ? AND enabled = 1")
            .bind(claw_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_reflex).collect()
    }

    pub async fn get_reflex(&self, id: Uuid) -> StorageResult<Option<Reflex>> {
        let row = sqlx::query("SELECT * FROM reflexes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_reflex).transpose()
    }

    pub async fn record_execution(&self, execution: &ReflexExecution) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO reflex_executions (id, reflex_id, event_id, claw_id, outcome, \
             detail, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.to_string())
        .bind(execution.reflex_id.to_string())
        .bind(execution.event_id.to_string())
        .bind(&execution.claw_id)
        .bind(outcome_str(execution.outcome))
        .bind(execution.detail.as_ref().map(to_json).transpose()?)
        .bind(to_ts(execution.created_at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn reflex_stats(&self, reflex_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> StorageResult<ReflexStats> {
        let rows = sqlx::query(
            "SELECT outcome FROM reflex_executions WHERE reflex_id = ? AND created_at >= ?",
        )
        .bind(reflex_id.to_string())
        .bind(to_ts(since))
        .fetch_all(&self.pool)
        .await?;
        let mut stats = ReflexStats::default();
        for row in &rows {
            stats.total += 1;
            match outcome_from(&row.try_get::<String, _>("outcome")?) {
                ExecutionOutcome::Executed => stats.executed += 1,
                ExecutionOutcome::Blocked => stats.blocked += 1,
                ExecutionOutcome::QueuedForL1 => stats.queued_for_l1 += 1,
                ExecutionOutcome::Recommended => {}
            }
        }
        Ok(stats)
    }

    pub async fn list_executions_in_window(
        &self,
        claw_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> StorageResult<Vec<ReflexExecution>> {
        let rows = sqlx::query(
            "SELECT * FROM reflex_executions WHERE claw_id = ? AND created_at >= ? ORDER BY created_at",
        )
        .bind(claw_id)
        .bind(to_ts(since))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ReflexExecution {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    reflex_id: Uuid::parse_str(&row.try_get::<String, _>("reflex_id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    event_id: Uuid::parse_str(&row.try_get::<String, _>("event_id")?)
                        .map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
                    claw_id: row.try_get("claw_id")?,
                    outcome: outcome_from(&row.try_get::<String, _>("outcome")?),
                    detail: row
                        .try_get::<Option<String>, _>("detail")?
                        .map(|s| crate::util::from_json(&s))
                        .transpose()?,
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
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
    async fn execution_dedup_is_at_most_once() {
        let storage = memory_storage().await;
        let reflex_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let execution = ReflexExecution {
            id: Uuid::new_v4(),
            reflex_id,
            event_id,
            claw_id: "alice".into(),
            outcome: ExecutionOutcome::Executed,
            detail: None,
            created_at: chrono::Utc::now(),
        };
        let first = storage.record_execution(&execution).await.unwrap();
        let mut dup = execution.clone();
        dup.id = Uuid::new_v4();
        let second = storage.record_execution(&dup).await.unwrap();
        assert!(first);
        assert!(!second);
    }
}
