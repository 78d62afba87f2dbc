//! Real-time push: one capability trait, two implementations.
//!
//! [`SocketLocalRealtime`] keeps every connection in-process (dashmap-backed
//! user/room indices) — correct for a single-node deployment. [`BrokerRealtime`]
//! fans the same four operations out through a shared Redis pub/sub namespace
//! plus a TTL'd online-set, so multiple server processes can deliver to
//! sockets they don't themselves hold.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// The four-operation capability set every real-time backend offers.
#[async_trait]
pub trait RealtimeService: Send + Sync {
    async fn send_to_user(&self, user_id: &str, payload: Value) -> RealtimeResult<()>;
    async fn send_to_users(&self, user_ids: &[String], payload: Value) -> RealtimeResult<()>;
    async fn broadcast(&self, room: &str, payload: Value) -> RealtimeResult<()>;
    async fn subscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()>;
    async fn unsubscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────
// Socket-local implementation
// ─────────────────────────────────────────────────────────────────────────

type SocketId = uuid::Uuid;

/// Outbound half of a connected socket: the server-side websocket task reads
/// from the matching receiver and writes frames to the wire.
pub type SocketSender = UnboundedSender<Value>;

#[derive(Default)]
pub struct SocketLocalRealtime {
    sockets: DashMap<SocketId, (String, SocketSender)>,
    user_sockets: DashMap<String, DashSet<SocketId>>,
    room_members: DashMap<String, DashSet<String>>,
}

impl SocketLocalRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a newly-connected socket under `user_id`.
    pub fn register_socket(&self, user_id: &str, sender: SocketSender) -> SocketId {
        let socket_id = uuid::Uuid::new_v4();
        self.sockets.insert(socket_id, (user_id.to_string(), sender));
        self.user_sockets.entry(user_id.to_string()).or_default().insert(socket_id);
        socket_id
    }

    /// Removes a socket, e.g. on disconnect.
    pub fn remove_socket(&self, socket_id: SocketId) {
        if let Some((_, (user_id, _))) = self.sockets.remove(&socket_id) {
            if let Some(set) = self.user_sockets.get(&user_id) {
                set.remove(&socket_id);
            }
        }
    }

    pub fn online_socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Drops sockets whose receiver has gone away. Intended to run on a
    /// periodic timer alongside the other scheduler jobs.
    pub fn sweep_dead_sockets(&self) -> usize {
        let dead: Vec<SocketId> = self
            .sockets
            .iter()
            .filter(|entry| entry.value().1.is_closed())
            .map(|entry| *entry.key())
            .collect();
        let count = dead.len();
        for socket_id in dead {
            self.remove_socket(socket_id);
        }
        if count > 0 {
            debug!(count, "swept dead sockets");
        }
        count
    }

    /// Spawns a background sweep loop; drop the returned handle to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.sweep_dead_sockets();
            }
        })
    }

    fn deliver_to_user(&self, user_id: &str, payload: &Value) {
        let Some(sockets) = self.user_sockets.get(user_id) else { return };
        for socket_id in sockets.iter() {
            if let Some(entry) = self.sockets.get(socket_id.key()) {
                if entry.1.send(payload.clone()).is_err() {
                    warn!(user_id, %socket_id, "dropped message: socket receiver gone");
                }
            }
        }
    }
}

#[async_trait]
impl RealtimeService for SocketLocalRealtime {
    async fn send_to_user(&self, user_id: &str, payload: Value) -> RealtimeResult<()> {
        self.deliver_to_user(user_id, &payload);
        Ok(())
    }

    async fn send_to_users(&self, user_ids: &[String], payload: Value) -> RealtimeResult<()> {
        for user_id in user_ids {
            self.deliver_to_user(user_id, &payload);
        }
        Ok(())
    }

    async fn broadcast(&self, room: &str, payload: Value) -> RealtimeResult<()> {
        if let Some(members) = self.room_members.get(room) {
            for user_id in members.iter() {
                self.deliver_to_user(&user_id, &payload);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        self.room_members.entry(room.to_string()).or_default().insert(user_id.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        if let Some(members) = self.room_members.get(room) {
            members.remove(user_id);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Broker-backed implementation
// ─────────────────────────────────────────────────────────────────────────

const ONLINE_SET_TTL_SECS: u64 = 90;

fn room_channel(room: &str) -> String {
    format!("clawbuds:room:{room}")
}
fn user_channel(user_id: &str) -> String {
    format!("clawbuds:user:{user_id}")
}
fn room_members_key(room: &str) -> String {
    format!("clawbuds:room_members:{room}")
}

/// Redis-backed: lets multiple server processes share one topic namespace
/// and one online-set. Actual wire delivery to a given process's sockets
/// still goes through that process's own `SocketLocalRealtime` subscribed to
/// the matching Redis channel — this type only owns the publish/membership
/// half of the contract.
#[derive(Clone)]
pub struct BrokerRealtime {
    conn: redis::aio::ConnectionManager,
}

impl BrokerRealtime {
    pub async fn connect(redis_url: &str) -> RealtimeResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub fn channel_name_for_room(room: &str) -> String {
        room_channel(room)
    }
    pub fn channel_name_for_user(user_id: &str) -> String {
        user_channel(user_id)
    }
}

#[async_trait]
impl RealtimeService for BrokerRealtime {
    async fn send_to_user(&self, user_id: &str, payload: Value) -> RealtimeResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&payload)?;
        redis::cmd("PUBLISH")
            .arg(user_channel(user_id))
            .arg(body)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn send_to_users(&self, user_ids: &[String], payload: Value) -> RealtimeResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&payload)?;
        let mut pipe = redis::pipe();
        for user_id in user_ids {
            pipe.cmd("PUBLISH").arg(user_channel(user_id)).arg(&body).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn broadcast(&self, room: &str, payload: Value) -> RealtimeResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&payload)?;
        redis::cmd("PUBLISH").arg(room_channel(room)).arg(body).query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn subscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SADD").arg(room_members_key(room)).arg(user_id).query_async::<()>(&mut conn).await?;
        redis::cmd("EXPIRE")
            .arg(room_members_key(room))
            .arg(ONLINE_SET_TTL_SECS)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn unsubscribe(&self, user_id: &str, room: &str) -> RealtimeResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SREM").arg(room_members_key(room)).arg(user_id).query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn send_to_user_reaches_every_socket_for_that_user() {
        let svc = SocketLocalRealtime::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        svc.register_socket("alice", tx1);
        svc.register_socket("alice", tx2);

        svc.send_to_user("alice", serde_json::json!({"hi": 1})).await.unwrap();

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_only_reaches_room_members() {
        let svc = SocketLocalRealtime::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        svc.register_socket("alice", tx_a);
        svc.register_socket("bob", tx_b);
        svc.subscribe("alice", "room-1").await.unwrap();

        svc.broadcast("room-1", serde_json::json!({})).await.unwrap();

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let svc = SocketLocalRealtime::new();
        let (tx, mut rx) = unbounded_channel();
        svc.register_socket("alice", tx);
        svc.subscribe("alice", "room-1").await.unwrap();
        svc.unsubscribe("alice", "room-1").await.unwrap();

        svc.broadcast("room-1", serde_json::json!({})).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_removes_sockets_whose_receiver_is_gone() {
        let svc = SocketLocalRealtime::new();
        let (tx, rx) = unbounded_channel::<Value>();
        svc.register_socket("alice", tx);
        drop(rx);

        assert_eq!(svc.online_socket_count(), 1);
        let swept = svc.sweep_dead_sockets();
        assert_eq!(swept, 1);
        assert_eq!(svc.online_socket_count(), 0);
    }
}
