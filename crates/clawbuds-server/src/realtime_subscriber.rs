//! Bridges the in-process event bus to connected websockets. Mirrors
//! [`clawbuds_domain::webhook_dispatch::WebhookSubscriber`]'s shape: look up
//! the targets for this event, then fire delivery off the critical path.
//!
//! Every domain event already publishes under the `claw_id` of whoever
//! should be notified about it (that convention is what lets
//! `WebhookSubscriber` key its lookup on `event.claw_id` alone) — so the
//! default here is to push to `event.claw_id`. `message.new` is the one
//! exception: it fans out to a recipient list carried in `data`.

use async_trait::async_trait;
use clawbuds_eventbus::Subscriber;
use clawbuds_proto::{Event, EventKind};
use clawbuds_realtime::RealtimeService;
use std::sync::Arc;
use tracing::warn;

pub struct RealtimeSubscriber {
    realtime: Arc<dyn RealtimeService>,
}

impl RealtimeSubscriber {
    pub fn new(realtime: Arc<dyn RealtimeService>) -> Self {
        Self { realtime }
    }
}

#[async_trait]
impl Subscriber for RealtimeSubscriber {
    fn name(&self) -> &str {
        "realtime"
    }

    async fn handle(&self, event: &Event) {
        let targets = targets_for(event);
        if targets.is_empty() {
            return;
        }
        let payload = serde_json::json!({
            "kind": event.kind.as_wire_name(),
            "clawId": event.claw_id,
            "data": event.data,
            "occurredAt": event.occurred_at,
        });
        let realtime = self.realtime.clone();
        tokio::spawn(async move {
            if let Err(err) = realtime.send_to_users(&targets, payload).await {
                warn!(error = %err, "realtime push failed");
            }
        });
    }
}

fn targets_for(event: &Event) -> Vec<String> {
    if event.kind == EventKind::MessageNew {
        return event
            .data
            .get("recipientIds")
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
    }
    vec![event.claw_id.clone()]
}
