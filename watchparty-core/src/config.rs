use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::service::{HostLeavePolicy, PlaybackPolicy};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub room: RoomConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub ws_ping_interval_secs: u64,
    pub ws_idle_timeout_secs: u64,
    /// Per-connection outbound queue length. Clients that fall this far
    /// behind lose messages.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            ws_ping_interval_secs: 30,
            ws_idle_timeout_secs: 90,
            outbound_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// How long a dropped host (or viewer) may take to come back.
    pub grace_period_secs: u64,
    pub code_length: usize,
    pub max_members: usize,
    /// Rooms idle this long are closed. 0 disables reaping.
    pub idle_room_ttl_secs: u64,
    pub playback_policy: PlaybackPolicy,
    pub host_leave_policy: HostLeavePolicy,
    pub max_chat_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
            code_length: 6,
            max_members: 50,
            idle_room_ttl_secs: 6 * 60 * 60,
            playback_policy: PlaybackPolicy::HostOnly,
            host_leave_policy: HostLeavePolicy::GracePeriod,
            max_chat_length: 500,
        }
    }
}

impl RoomConfig {
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    #[must_use]
    pub const fn idle_room_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_room_ttl_secs)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    ///
    /// Nested keys use a double underscore, e.g.
    /// `WATCHPARTY_ROOM__GRACE_PERIOD_SECS=45`.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            } else {
                tracing::warn!(path, "Config file not found, using defaults");
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("WATCHPARTY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Check values the types alone cannot rule out.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.outbound_buffer == 0 {
            errors.push("server.outbound_buffer must be at least 1".to_string());
        }
        if self.server.ws_ping_interval_secs == 0 {
            errors.push("server.ws_ping_interval_secs must be non-zero".to_string());
        }
        if self.server.ws_idle_timeout_secs <= self.server.ws_ping_interval_secs {
            errors.push(
                "server.ws_idle_timeout_secs must exceed server.ws_ping_interval_secs".to_string(),
            );
        }
        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            errors.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }
        if self.room.grace_period_secs == 0 {
            errors.push("room.grace_period_secs must be non-zero".to_string());
        }
        if !(4..=12).contains(&self.room.code_length) {
            errors.push("room.code_length must be between 4 and 12".to_string());
        }
        if self.room.max_members < 2 {
            errors.push("room.max_members must be at least 2".to_string());
        }
        if self.room.max_chat_length == 0 {
            errors.push("room.max_chat_length must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}
