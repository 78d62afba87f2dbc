//! Builds the process's [`RealtimeService`] from config. With no redis URL,
//! a single-node [`SocketLocalRealtime`] is authoritative. With one
//! configured, pushes also go out over a shared redis pub/sub namespace via
//! [`BrokerRealtime`] so other server processes' sockets see them too — and
//! a background relay subscribes this process's `SocketLocalRealtime` to
//! the same namespace, per `BrokerRealtime`'s own doc comment: "this type
//! only owns the publish/membership half of the contract."

use async_trait::async_trait;
use clawbuds_realtime::{BrokerRealtime, RealtimeResult, RealtimeService, SocketLocalRealtime};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

struct DualRealtime {
    local: Arc<SocketLocalRealtime>,
    broker: BrokerRealtime,
}

#[async_trait]
impl RealtimeService for DualRealtime {
    async fn send_to_user(&self, user_id: &str, payload: Value) -> RealtimeResult<()> {
        self.local.send_to_user(user_id, payload.clone()).await?;
        self.broker.send_to_user(user_id, payload).await
    }

    async fn send_to_users(&self, user_ids: &[String], payload: Value) -> RealtimeResult<()> {
        self.local.send_to_users(user_ids, payload.clone()).await?;
        self.broker.send_to_users(user_ids, payload).await
    }

    async fn broadcast(&self, room: &str, payload: Value) -> RealtimeResult<()> {
        self.local.broadcast(room, payload.clone()).await?;
        self.broker.broadcast(room, payload).await
    }

    async fn subscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        self.local.subscribe(user_id, room).await?;
        self.broker.subscribe(user_id, room).await
    }

    async fn unsubscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        self.local.unsubscribe(user_id, room).await?;
        self.broker.unsubscribe(user_id, room).await
    }
}

/// Returns the socket registry (always local — sockets this process holds
/// are only ever reachable through it) and the service pushes should go
/// through (local-only, or local+broker when redis is configured).
pub async fn build(redis_url: Option<&str>) -> RealtimeResult<(Arc<SocketLocalRealtime>, Arc<dyn RealtimeService>)> {
    let local = SocketLocalRealtime::new();
    match redis_url {
        None => {
            let service: Arc<dyn RealtimeService> = local.clone();
            Ok((local, service))
        }
        Some(url) => {
            let broker = BrokerRealtime::connect(url).await?;
            tokio::spawn(relay_loop(url.to_string(), local.clone()));
            let service: Arc<dyn RealtimeService> = Arc::new(DualRealtime { local: local.clone(), broker });
            Ok((local, service))
        }
    }
}

/// Forwards messages published on the shared redis namespace into sockets
/// this process holds. Reconnects on any failure rather than taking the
/// realtime transport down with it.
async fn relay_loop(redis_url: String, local: Arc<SocketLocalRealtime>) {
    loop {
        if let Err(err) = relay_once(&redis_url, &local).await {
            warn!(error = %err, "broker relay disconnected, retrying");
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn relay_once(redis_url: &str, local: &Arc<SocketLocalRealtime>) -> RealtimeResult<()> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe("clawbuds:user:*").await?;
    pubsub.psubscribe("clawbuds:room:*").await?;
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let Ok(payload) = msg.get_payload::<String>() else { continue };
        let Ok(value) = serde_json::from_str::<Value>(&payload) else { continue };
        if let Some(user_id) = channel.strip_prefix("clawbuds:user:") {
            let _ = local.send_to_user(user_id, value).await;
        } else if let Some(room) = channel.strip_prefix("clawbuds:room:") {
            let _ = local.broadcast(room, value).await;
        }
    }
    Ok(())
}
