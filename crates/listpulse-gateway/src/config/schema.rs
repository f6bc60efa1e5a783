use std::time::Duration;

use serde::Deserialize;
use listpulse_core::error::{PulseError, Result};

use crate::realtime::QoS;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulseConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub broadcast: BroadcastSection,

    #[serde(default)]
    pub poller: PollerSection,
}

impl PulseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PulseError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.database.validate()?;
        self.broadcast.validate()?;
        self.poller.validate()?;
        Ok(())
    }
}

fn bad(msg: &str) -> PulseError {
    PulseError::BadRequest(msg.to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Per-connection outbound queue depth.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(bad("server.ping_interval_ms must be between 1000 and 120000"));
        }
        if !(5000..=600000).contains(&self.idle_timeout_ms) {
            return Err(bad("server.idle_timeout_ms must be between 5000 and 600000"));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(bad("server.idle_timeout_ms must be greater than ping_interval_ms"));
        }
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(bad("server.outbound_queue must be between 1 and 65536"));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_outbound_queue() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    #[serde(default = "default_db_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseSection {
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("sqlite:") {
            return Err(bad("database.url must be a sqlite: url"));
        }
        if self.max_connections == 0 {
            return Err(bad("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// In-memory databases live inside a single connection.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_db_url() -> String {
    "sqlite://listpulse.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QosMode {
    #[default]
    Lossy,
    Reliable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastSection {
    #[serde(default)]
    pub qos: QosMode,

    /// Per-send allowance for `reliable` delivery.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default = "default_max_subscribers")]
    pub max_subscribers_per_listing: usize,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            qos: QosMode::default(),
            send_timeout_ms: default_send_timeout_ms(),
            max_subscribers_per_listing: default_max_subscribers(),
        }
    }
}

impl BroadcastSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10000).contains(&self.send_timeout_ms) {
            return Err(bad("broadcast.send_timeout_ms must be between 1 and 10000"));
        }
        if self.max_subscribers_per_listing == 0 {
            return Err(bad("broadcast.max_subscribers_per_listing must be at least 1"));
        }
        Ok(())
    }

    pub fn qos(&self) -> QoS {
        match self.qos {
            QosMode::Lossy => QoS::Lossy,
            QosMode::Reliable => QoS::Reliable {
                timeout_ms: self.send_timeout_ms,
            },
        }
    }
}

fn default_send_timeout_ms() -> u64 {
    250
}
fn default_max_subscribers() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerSection {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PollerSection {
    pub fn validate(&self) -> Result<()> {
        if !(500..=600000).contains(&self.interval_ms) {
            return Err(bad("poller.interval_ms must be between 500 and 600000"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}
