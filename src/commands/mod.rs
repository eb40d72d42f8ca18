//! Command handling module.
//!
//! Turns user messages, inline queries, and payment events into calls on
//! the quota service and renders the replies. Transport-agnostic: the
//! caller delivers `CommandResult` messages however its platform requires.

mod handler;
mod types;

pub use handler::{CommandHandler, PURCHASE_PAYLOAD};
pub use types::{BotCommand, CommandResult, Invoice};
