//! Background maintenance ticks: relationship decay, briefing generation,
//! and the retention sweeps the storage layer exposes but nothing else ever
//! calls on its own. Each tick is isolated so one claw's failure (a bad
//! carapace document, a briefing generation error) never stops the loop —
//! mirrors [`clawbuds_relationship::run_daily_pass`]'s own per-owner
//! isolation, extended to every per-claw job this scheduler drives.

use clawbuds_eventbus::EventBus;
use clawbuds_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub fn spawn(storage: Arc<Storage>, events: EventBus, tick: Duration, heartbeat_retention_days: i64, carapace_keep_versions: u32) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;
            run_tick(&storage, &events, heartbeat_retention_days, carapace_keep_versions).await;
        }
    })
}

async fn run_tick(storage: &Storage, events: &EventBus, heartbeat_retention_days: i64, carapace_keep_versions: u32) {
    info!("scheduler tick starting");

    clawbuds_relationship::run_daily_pass(storage, events).await;

    match storage.list_claw_ids().await {
        Ok(claw_ids) => {
            for claw_id in &claw_ids {
                if let Err(err) = clawbuds_briefing::generate_daily_briefing(storage, claw_id).await {
                    warn!(claw_id, error = %err, "daily briefing generation failed");
                }
                if let Err(err) = storage.prune_carapace_history(claw_id, carapace_keep_versions).await {
                    warn!(claw_id, error = %err, "carapace history pruning failed");
                }
            }
        }
        Err(err) => error!(error = %err, "could not list claw ids for scheduler sweep"),
    }

    if let Err(err) = storage.prune_heartbeats(heartbeat_retention_days).await {
        warn!(error = %err, "heartbeat pruning failed");
    }

    info!("scheduler tick complete");
}

/// Runs the weekly briefing pass; intended to be scheduled separately from
/// [`spawn`]'s hourly tick (e.g. a once-a-week cron trigger upstream).
pub async fn run_weekly_briefings(storage: &Storage) {
    match storage.list_claw_ids().await {
        Ok(claw_ids) => {
            for claw_id in &claw_ids {
                if let Err(err) = clawbuds_briefing::generate_weekly_briefing(storage, claw_id).await {
                    warn!(claw_id, error = %err, "weekly briefing generation failed");
                }
            }
        }
        Err(err) => error!(error = %err, "could not list claw ids for weekly briefing sweep"),
    }
}
