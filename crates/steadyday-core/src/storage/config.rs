//! Process configuration.
//!
//! Values come from three layers, later ones winning:
//! - built-in defaults
//! - an optional TOML file (`~/.config/steadyday/config.toml` or `--config`)
//! - environment variables (`BOT_TOKEN`, `ADMIN_USER_ID`, `DEFAULT_TIMEZONE`, ...)
//!
//! [`Config::validate`] runs once at startup and corrects the defaults a
//! user record may fall back to, so nothing downstream sees an invalid zone
//! or reminder time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::data_dir;
use crate::clock::{normalize_hhmm, TimezoneResolver};
use crate::error::{ConfigError, Result};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bot API credential. Required by anything that talks to the transport.
    #[serde(default)]
    pub bot_token: String,
    /// Privileged identity; 0 disables the admin surface.
    #[serde(default)]
    pub admin_user_id: i64,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_reminder_time")]
    pub default_reminder_time: String,
    /// SQLite file; defaults to `<data_dir>/steadyday.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    /// Minimum interval between two actions of the same user.
    #[serde(default = "default_antiflood_delay_ms")]
    pub antiflood_delay_ms: u64,
    /// Pause between consecutive reminder sends inside one tick.
    #[serde(default = "default_send_pacing_ms")]
    pub send_pacing_ms: u64,
    /// Pause between consecutive broadcast sends.
    #[serde(default = "default_broadcast_pacing_ms")]
    pub broadcast_pacing_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

// Default functions
fn default_timezone() -> String {
    "Europe/Moscow".into()
}
fn default_reminder_time() -> String {
    "21:00".into()
}
fn default_tick_seconds() -> u64 {
    60
}
fn default_antiflood_delay_ms() -> u64 {
    300
}
fn default_send_pacing_ms() -> u64 {
    50
}
fn default_broadcast_pacing_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".into()
}
fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_user_id: 0,
            default_timezone: default_timezone(),
            default_reminder_time: default_reminder_time(),
            db_path: None,
            tick_seconds: default_tick_seconds(),
            antiflood_delay_ms: default_antiflood_delay_ms(),
            send_pacing_ms: default_send_pacing_ms(),
            broadcast_pacing_ms: default_broadcast_pacing_ms(),
            log_level: default_log_level(),
            api_base: default_api_base(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply the environment.
    ///
    /// A missing file is not an error; a malformed one is.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// an environment variable holds an unparsable number.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        let mut cfg = Self::from_file(&path)?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::ParseFailed(format!("{}: {e}", path.display())).into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for numeric variables that do not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("cannot parse '{raw}'"),
            })
        }

        if let Some(v) = lookup("BOT_TOKEN") {
            self.bot_token = v;
        }
        if let Some(v) = lookup("ADMIN_USER_ID") {
            self.admin_user_id = parse("ADMIN_USER_ID", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_TIMEZONE") {
            self.default_timezone = v;
        }
        if let Some(v) = lookup("DEFAULT_REMINDER_TIME") {
            self.default_reminder_time = v;
        }
        if let Some(v) = lookup("DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SCHEDULER_TICK_SECONDS") {
            self.tick_seconds = parse("SCHEDULER_TICK_SECONDS", &v)?;
        }
        if let Some(v) = lookup("ANTIFLOOD_DELAY_MS") {
            self.antiflood_delay_ms = parse("ANTIFLOOD_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("SEND_PACING_MS") {
            self.send_pacing_ms = parse("SEND_PACING_MS", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("TELEGRAM_API_BASE") {
            self.api_base = v;
        }
        Ok(())
    }

    /// Startup validation. Bad defaults are corrected with a warning.
    ///
    /// # Errors
    /// Returns an error only for values that cannot be corrected (a zero tick).
    pub fn validate(mut self) -> Result<Self> {
        if !TimezoneResolver::is_valid(&self.default_timezone) {
            warn!(
                timezone = %self.default_timezone,
                "invalid DEFAULT_TIMEZONE, falling back to UTC"
            );
            self.default_timezone = "UTC".into();
        }
        match normalize_hhmm(&self.default_reminder_time) {
            Some(t) => self.default_reminder_time = t,
            None => {
                warn!(
                    reminder_time = %self.default_reminder_time,
                    "invalid DEFAULT_REMINDER_TIME, falling back to 21:00"
                );
                self.default_reminder_time = default_reminder_time();
            }
        }
        if self.tick_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tick_seconds".into(),
                message: "must be at least 1".into(),
            }
            .into());
        }
        if self.admin_user_id < 0 {
            warn!(admin_user_id = self.admin_user_id, "negative ADMIN_USER_ID, admin disabled");
            self.admin_user_id = 0;
        }
        Ok(self)
    }

    /// The bot credential, or an error naming the missing variable.
    pub fn require_token(&self) -> Result<&str> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingKey("BOT_TOKEN".into()).into());
        }
        Ok(&self.bot_token)
    }

    /// Resolved database location.
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join("steadyday.db")),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_id != 0 && user_id == self.admin_user_id
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    pub fn antiflood_delay(&self) -> Duration {
        Duration::from_millis(self.antiflood_delay_ms)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Copy safe to print: the credential is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.bot_token.is_empty() {
            copy.bot_token = "***".into();
        }
        copy
    }
}
