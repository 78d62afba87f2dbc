//! Shared application state handed to every route handler.

use clawbuds_eventbus::EventBus;
use clawbuds_realtime::RealtimeService;
use clawbuds_storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub events: EventBus,
    pub realtime: Arc<dyn RealtimeService>,
}
