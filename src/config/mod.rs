//! Configuration module for the prediction bot.
//!
//! Handles loading of the content pool and the bot settings
//! (quota parameters, record paths, command prefix).

mod pool;
mod settings;

pub use pool::{ContentPool, PoolError};
pub use settings::{BotSettings, ConfigError};
