//! Environment-driven server configuration, following
//! [`clawnode::config::NodeConfig`]'s plain-struct-with-defaults shape.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub timestamp_skew_secs: i64,
    pub request_deadline_secs: u64,
    pub heartbeat_retention_days: i64,
    pub carapace_keep_versions: u32,
    pub scheduler_tick_secs: u64,
    pub socket_sweep_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("CLAWBUDS_BIND_ADDR", "0.0.0.0:8080"),
            database_url: env_string("CLAWBUDS_DATABASE_URL", "sqlite://clawbuds.db?mode=rwc"),
            redis_url: std::env::var("CLAWBUDS_REDIS_URL").ok().filter(|s| !s.is_empty()),
            timestamp_skew_secs: env_parse("CLAWBUDS_TIMESTAMP_SKEW_SECS", 300),
            request_deadline_secs: env_parse("CLAWBUDS_REQUEST_DEADLINE_SECS", 30),
            heartbeat_retention_days: env_parse("CLAWBUDS_HEARTBEAT_RETENTION_DAYS", 7),
            carapace_keep_versions: env_parse("CLAWBUDS_CARAPACE_KEEP_VERSIONS", 20),
            scheduler_tick_secs: env_parse("CLAWBUDS_SCHEDULER_TICK_SECS", 3600),
            socket_sweep_secs: env_parse("CLAWBUDS_SOCKET_SWEEP_SECS", 60),
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs)
    }

    pub fn socket_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.socket_sweep_secs)
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
