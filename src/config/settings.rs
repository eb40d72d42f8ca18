//! Application settings.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path to the predictions text file.
    #[serde(default = "default_predictions_path")]
    pub predictions_path: PathBuf,

    /// Path to the per-user quota record.
    #[serde(default = "default_limits_path")]
    pub limits_path: PathBuf,

    /// Path to the per-user history record.
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Draws granted to every user each UTC day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Draws credited per purchase.
    #[serde(default = "default_credit_amount")]
    pub credit_amount: u32,

    /// Invoice price of one purchase, in Telegram Stars.
    #[serde(default = "default_price_stars")]
    pub price_stars: u32,

    /// Command prefix for bot commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Bind address of the keep-alive endpoint.
    #[serde(default = "default_health_addr")]
    pub health_addr: SocketAddr,
}

fn default_predictions_path() -> PathBuf {
    PathBuf::from("predictions.txt")
}

fn default_limits_path() -> PathBuf {
    PathBuf::from("user_limits.json")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("user_history.json")
}

const fn default_daily_limit() -> u32 {
    5
}

const fn default_credit_amount() -> u32 {
    5
}

const fn default_price_stars() -> u32 {
    1
}

fn default_command_prefix() -> String {
    "/".to_owned()
}

fn default_health_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            predictions_path: default_predictions_path(),
            limits_path: default_limits_path(),
            history_path: default_history_path(),
            daily_limit: default_daily_limit(),
            credit_amount: default_credit_amount(),
            price_stars: default_price_stars(),
            command_prefix: default_command_prefix(),
            health_addr: default_health_addr(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    ///
    /// Unset variables fall back to defaults; set but malformed ones are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or address variable cannot be parsed,
    /// or if the daily limit or credit amount is zero.
    pub fn from_env_with_defaults() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = Self {
            predictions_path: lookup("PREDICTIONS_PATH")
                .map_or_else(default_predictions_path, PathBuf::from),
            limits_path: lookup("LIMITS_PATH").map_or_else(default_limits_path, PathBuf::from),
            history_path: lookup("HISTORY_PATH").map_or_else(default_history_path, PathBuf::from),
            daily_limit: parse_var(&lookup, "DAILY_LIMIT")?.unwrap_or_else(default_daily_limit),
            credit_amount: parse_var(&lookup, "CREDIT_AMOUNT")?
                .unwrap_or_else(default_credit_amount),
            price_stars: parse_var(&lookup, "PRICE_STARS")?.unwrap_or_else(default_price_stars),
            command_prefix: lookup("COMMAND_PREFIX").unwrap_or_else(default_command_prefix),
            health_addr: parse_var(&lookup, "HEALTH_ADDR")?.unwrap_or_else(default_health_addr),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Checks the invariants the quota core relies on.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_limit == 0 {
            return Err(ConfigError::ZeroValue("DAILY_LIMIT"));
        }
        if self.credit_amount == 0 {
            return Err(ConfigError::ZeroValue("CREDIT_AMOUNT"));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Command prefix cannot be empty")]
    EmptyPrefix,
}
