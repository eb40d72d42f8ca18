//! Command types and definitions.

use std::fmt;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Greet the user.
    Start,

    /// Show help information.
    Help,

    /// Draw a prediction, consuming one draw.
    Random,

    /// Show remaining draws.
    Profile,

    /// Request an invoice for extra draws.
    Buy,

    /// Show information about the bot.
    About,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Accepts Telegram-style `@botname` suffixes (`/random@my_bot`).
    /// Returns `None` if the message is not a valid command.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let text = text.trim();

        let after_prefix = text.strip_prefix(prefix)?.trim_start();

        let cmd = after_prefix
            .split_whitespace()
            .next()?
            .split('@')
            .next()?
            .to_lowercase();

        match cmd.as_str() {
            "start" => Some(Self::Start),
            "help" | "h" | "?" => Some(Self::Help),
            "random" | "draw" | "predict" | "r" => Some(Self::Random),
            "profile" | "me" | "balance" => Some(Self::Profile),
            "buy" => Some(Self::Buy),
            "about" | "info" => Some(Self::About),
            _ => None,
        }
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Random => "random",
            Self::Profile => "profile",
            Self::Buy => "buy",
            Self::About => "about",
        }
    }

    /// Returns all available commands with their aliases and descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("start", "", "Start the bot"),
            ("random", "(draw, predict, r)", "Get a prediction"),
            ("profile", "(me, balance)", "Show draws left today"),
            ("buy", "", "Buy extra draws"),
            ("about", "(info)", "About this bot"),
            ("help", "(h, ?)", "Show this help message"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An invoice the transport should present to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,

    /// Opaque payload echoed back on payment confirmation.
    pub payload: String,

    /// ISO 4217 code, or `XTR` for Telegram Stars.
    pub currency: String,

    /// Price in the smallest currency unit.
    pub amount: u32,

    /// Draws credited once the payment succeeds.
    pub credits: u32,
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,

    /// Invoice to send after the message, if any.
    pub invoice: Option<Invoice>,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            invoice: None,
        }
    }

    /// Creates a successful result that carries an invoice.
    #[must_use]
    pub fn success_with_invoice(message: impl Into<String>, invoice: Invoice) -> Self {
        Self {
            success: true,
            message: message.into(),
            invoice: Some(invoice),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            invoice: None,
        }
    }
}
