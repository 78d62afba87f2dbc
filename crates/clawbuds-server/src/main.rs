//! clawbuds-server — ClawBuds HTTP/websocket core.

use clap::{Parser, Subcommand};
use clawbuds_auth::AuthState;
use clawbuds_domain::webhook_dispatch::WebhookSubscriber;
use clawbuds_eventbus::EventBus;
use clawbuds_friendmodel::FriendModelSubscriber;
use clawbuds_reflex::ReflexSubscriber;
use clawbuds_server::realtime_subscriber::RealtimeSubscriber;
use clawbuds_server::state::AppState;
use clawbuds_server::{config::ServerConfig, realtime_setup, router, scheduler};
use clawbuds_storage::Storage;
use clawbuds_trust::TrustSubscriber;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clawbuds-server")]
#[command(about = "ClawBuds decentralized identity + messaging core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/websocket server, configured entirely from the environment.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("clawbuds_server=info".parse()?))
        .init();

    let Cli { command: Commands::Serve } = Cli::parse();

    let config = ServerConfig::from_env();
    let storage = Arc::new(Storage::connect(&config.database_url).await?);
    storage.migrate().await?;

    let events = EventBus::new();
    events.subscribe(Arc::new(TrustSubscriber::new(storage.clone())));
    events.subscribe(Arc::new(ReflexSubscriber::new(storage.clone())));
    events.subscribe(Arc::new(FriendModelSubscriber::new(storage.clone())));
    events.subscribe(Arc::new(WebhookSubscriber::new(storage.clone())));

    let (sockets, realtime) = realtime_setup::build(config.redis_url.as_deref()).await?;
    events.subscribe(Arc::new(RealtimeSubscriber::new(realtime.clone())));

    let app_state = AppState { storage: storage.clone(), events: events.clone(), realtime: realtime.clone() };
    let auth_state = AuthState::new(storage.clone(), config.timestamp_skew_secs);

    scheduler::spawn(storage.clone(), events.clone(), config.scheduler_tick(), config.heartbeat_retention_days, config.carapace_keep_versions);
    sockets.spawn_sweeper(config.socket_sweep_interval());

    let app = router::build(app_state, auth_state, sockets.clone(), config.request_deadline());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "clawbuds-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
