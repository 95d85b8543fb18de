//! Dormwatt configuration system.
//!
//! Built once at process start from TOML (optional) plus environment
//! overrides, then passed by reference to every component. Presence of a
//! section's required fields is what enables that channel or the account.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DormwattError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DormwattConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl DormwattConfig {
    /// Load config from the default path (~/.dormwatt/config.toml).
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
        let content = std::fs::read_to_string(path)
            .map_err(|e| DormwattError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Dormwatt home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dormwatt")
    }

    /// Apply process environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    ///
    /// Variable names are the ones the deployment has always used, including
    /// the lowercase room ids.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        set(&mut self.account.username, "ACCOUNT");
        set(&mut self.account.password, "PASSWORD");
        set(&mut self.account.lt_room, "lt_room");
        set(&mut self.account.ac_room, "ac_room");
        set(&mut self.channel.serverchan.keys, "SERVERCHAN_KEYS");
        set(&mut self.channel.email.address, "EMAIL");
        set(&mut self.channel.email.smtp_code, "SMTP_CODE");
        set(&mut self.channel.email.smtp_server, "SMTP_SERVER");
        set(&mut self.channel.telegram.bot_token, "TELEGRAM_BOT_TOKEN");
        set(&mut self.channel.telegram.chat_id, "TELEGRAM_CHAT_ID");
        set(&mut self.storage.root, "DORMWATT_DATA_DIR");
    }

    /// Local time zone used for period labels and record timestamps.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.monitor.utc_offset_hours * 3600).ok_or_else(|| {
            DormwattError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.monitor.utc_offset_hours
            ))
        })
    }
}

fn expand(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Time-series storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_recent_file")]
    pub recent_file: String,
}

fn default_storage_root() -> String { "./page/data".into() }
fn default_recent_window() -> usize { 30 }
fn default_index_file() -> String { "time.json".into() }
fn default_recent_file() -> String { "last_30_records.json".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            recent_window: default_recent_window(),
            index_file: default_index_file(),
            recent_file: default_recent_file(),
        }
    }
}

impl StorageConfig {
    pub fn root_path(&self) -> PathBuf {
        expand(&self.root)
    }
}

/// Run loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_utc_offset_hours() -> i32 { 8 }
fn default_interval_secs() -> u64 { 3600 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Upstream account used to obtain readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub lt_room: String,
    #[serde(default)]
    pub ac_room: String,
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

fn default_portal_url() -> String { "https://portal.example.edu/api".into() }
fn default_token_file() -> String { "~/.dormwatt/session.enc".into() }

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            lt_room: String::new(),
            ac_room: String::new(),
            portal_url: default_portal_url(),
            token_file: default_token_file(),
        }
    }
}

impl AccountConfig {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty()
            && !self.password.is_empty()
            && !self.lt_room.is_empty()
            && !self.ac_room.is_empty()
    }

    pub fn token_path(&self) -> PathBuf {
        expand(&self.token_file)
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub serverchan: ServerChanConfig,
    #[serde(default)]
    pub email: EmailChannelConfig,
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// ServerChan push relay: comma separated send keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerChanConfig {
    #[serde(default)]
    pub keys: String,
    #[serde(default = "default_serverchan_api")]
    pub api_base: String,
}

fn default_serverchan_api() -> String { "https://sctapi.ftqq.com".into() }

impl Default for ServerChanConfig {
    fn default() -> Self {
        Self {
            keys: String::new(),
            api_base: default_serverchan_api(),
        }
    }
}

impl ServerChanConfig {
    /// Trimmed, non-empty keys in configured order.
    pub fn key_list(&self) -> Vec<String> {
        self.keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn is_configured(&self) -> bool {
        !self.key_list().is_empty()
    }
}

/// SMTP email; the same address is sender and recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailChannelConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub smtp_code: String,
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_smtp_port() -> u16 { 465 }

impl Default for EmailChannelConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            smtp_code: String::new(),
            smtp_server: String::new(),
            smtp_port: default_smtp_port(),
        }
    }
}

impl EmailChannelConfig {
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.smtp_code.is_empty() && !self.smtp_server.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_telegram_api() -> String { "https://api.telegram.org".into() }

impl Default for TelegramChannelConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api(),
        }
    }
}

impl TelegramChannelConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}
