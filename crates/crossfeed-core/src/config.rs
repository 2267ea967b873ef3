//! Crossfeed configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub relay: RelaySettings,
}

impl RelayConfig {
    /// Load config from the default path (~/.crossfeed/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::RelayError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::RelayError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::RelayError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".crossfeed")
            .join("config.toml")
    }

    /// Get the Crossfeed home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".crossfeed")
    }
}

/// Telegram side — the source channel and the operator chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Public username of the watched channel (leading '@' is tolerated).
    #[serde(default)]
    pub channel: String,
    /// Chat id of the operator; the only sender allowed to issue commands.
    #[serde(default)]
    pub admin_chat_id: i64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel: String::new(),
            admin_chat_id: 0,
            poll_interval: default_poll_interval(),
        }
    }
}

impl TelegramConfig {
    /// Channel username with any leading '@' stripped.
    pub fn channel_username(&self) -> &str {
        self.channel.trim_start_matches('@')
    }
}

/// X (Twitter) OAuth 1.0a credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_secret: String,
}

/// Relay pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Scheduler tick period in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Delay before the first scheduler tick.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Album debounce quiet period in milliseconds.
    #[serde(default = "default_album_settle_ms")]
    pub album_settle_ms: u64,
    /// Photo attachment limit of the posting platform.
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
    /// Pacing delay between platform calls in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Requeue delay after a transient posting failure, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: i64,
    /// Requeue delay after a rate-limit rejection, in seconds.
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: i64,
    /// Attempts after which a failing entry is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pending approvals older than this are swept, in seconds.
    #[serde(default = "default_approval_ttl_secs")]
    pub approval_ttl_secs: i64,
    /// How many entries /queue lists.
    #[serde(default = "default_queue_preview")]
    pub queue_preview: usize,
    /// Where the queue db, hash ledger, and last-post record live.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Where downloaded media waits to be posted.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,
    /// Caption substituted for captionless media posts.
    #[serde(default = "default_caption")]
    pub default_caption: String,
}

fn default_tick_secs() -> u64 {
    60
}
fn default_initial_delay_secs() -> u64 {
    5
}
fn default_album_settle_ms() -> u64 {
    1800
}
fn default_max_photos() -> usize {
    4
}
fn default_pacing_ms() -> u64 {
    2000
}
fn default_retry_delay_secs() -> i64 {
    60
}
fn default_rate_limit_delay_secs() -> i64 {
    900
}
fn default_max_attempts() -> u32 {
    10
}
fn default_approval_ttl_secs() -> i64 {
    1800
}
fn default_queue_preview() -> usize {
    10
}
fn default_data_dir() -> String {
    "~/.crossfeed".into()
}
fn default_spool_dir() -> String {
    "~/.crossfeed/spool".into()
}
fn default_caption() -> String {
    "Sent from Telegram".into()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            album_settle_ms: default_album_settle_ms(),
            max_photos: default_max_photos(),
            pacing_ms: default_pacing_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
            max_attempts: default_max_attempts(),
            approval_ttl_secs: default_approval_ttl_secs(),
            queue_preview: default_queue_preview(),
            data_dir: default_data_dir(),
            spool_dir: default_spool_dir(),
            default_caption: default_caption(),
        }
    }
}

impl RelaySettings {
    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    /// Spool directory with `~` expanded.
    pub fn spool_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.spool_dir).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.relay.tick_secs, 60);
        assert_eq!(config.relay.max_photos, 4);
        assert_eq!(config.relay.album_settle_ms, 1800);
        assert_eq!(config.telegram.poll_interval, 1);
    }

    #[test]
    fn test_partial_toml() {
        let config: RelayConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "tok"
            channel = "@mychannel"
            admin_chat_id = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "tok");
        assert_eq!(config.telegram.channel_username(), "mychannel");
        assert_eq!(config.telegram.admin_chat_id, 42);
        assert_eq!(config.relay.retry_delay_secs, 60);
        assert_eq!(config.relay.rate_limit_delay_secs, 900);
    }
}
