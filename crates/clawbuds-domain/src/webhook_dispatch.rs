//! Wires outbound webhook delivery to every event-bus event: the subscriber
//! looks up `claw_id`'s active webhooks subscribed to the event's wire name
//! and dispatches each on its own task so a slow or failing endpoint never
//! holds up the bus.

use async_trait::async_trait;
use clawbuds_eventbus::Subscriber;
use clawbuds_proto::Event;
use clawbuds_storage::Storage;
use clawbuds_webhooks::Dispatcher;
use std::sync::Arc;
use tracing::warn;

pub struct WebhookSubscriber {
    storage: Arc<Storage>,
    dispatcher: Arc<Dispatcher>,
}

impl WebhookSubscriber {
    pub fn new(storage: Arc<Storage>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(storage.clone()));
        Self { storage, dispatcher }
    }
}

#[async_trait]
impl Subscriber for WebhookSubscriber {
    fn name(&self) -> &str {
        "webhook-dispatch"
    }

    async fn handle(&self, event: &Event) {
        let wire_name = event.kind.as_wire_name();
        let webhooks = match self.storage.list_active_outgoing_subscribed(&event.claw_id, wire_name).await {
            Ok(webhooks) => webhooks,
            Err(err) => {
                warn!(claw_id = %event.claw_id, error = %err, "failed to look up subscribed webhooks");
                return;
            }
        };

        for webhook in webhooks {
            let dispatcher = self.dispatcher.clone();
            let event_name = wire_name.to_string();
            let data = event.data.clone();
            let webhook_id = webhook.id;
            tokio::spawn(async move {
                if let Err(err) = dispatcher.deliver_with_retries(&webhook, &event_name, data).await {
                    warn!(%webhook_id, error = %err, "webhook delivery failed");
                }
            });
        }
    }
}
