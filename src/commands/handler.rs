//! Command handler implementation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::types::{BotCommand, CommandResult, Invoice};
use crate::service::{DrawOutcome, QuotaError, QuotaService};

/// Payload attached to draw-purchase invoices.
pub const PURCHASE_PAYLOAD: &str = "buy_generations";

/// Currency code for Telegram Stars.
const STARS_CURRENCY: &str = "XTR";

const OUT_OF_DRAWS: &str = "You have no draws left for today.\n\
                            Buy more in your profile or come back tomorrow (limits reset at 00:00 UTC).";

const STORAGE_FAILURE: &str = "Something went wrong, please try again later.";

/// Handles bot commands on behalf of a transport adapter.
pub struct CommandHandler {
    /// Command prefix (e.g., "/").
    prefix: String,

    /// Quota and draw service.
    service: Arc<QuotaService>,

    /// Invoice price of one purchase.
    price_stars: u32,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(prefix: String, service: Arc<QuotaService>, price_stars: u32) -> Self {
        Self {
            prefix,
            service,
            price_stars,
        }
    }

    /// Tries to parse and execute a command from a message sent by `user`.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn try_handle(&self, user: &str, message_text: &str) -> Option<CommandResult> {
        let command = BotCommand::parse(message_text, &self.prefix)?;

        debug!("Handling command {} from {}", command, user);
        let result = self.execute(user, command).await;
        info!(
            "Command {} from {}: success={}",
            command, user, result.success
        );

        Some(result)
    }

    /// Executes a parsed command.
    async fn execute(&self, user: &str, command: BotCommand) -> CommandResult {
        match command {
            BotCommand::Start => self.handle_start(),
            BotCommand::Help => self.handle_help(),
            BotCommand::Random => self.handle_random(user).await,
            BotCommand::Profile => self.handle_profile(user).await,
            BotCommand::Buy => self.handle_buy(),
            BotCommand::About => self.handle_about(),
        }
    }

    fn handle_start(&self) -> CommandResult {
        CommandResult::success(format!(
            "Hi! I'm a crypto prediction bot.\n\
             Send {}random for a prediction, or use me inline.",
            self.prefix
        ))
    }

    fn handle_help(&self) -> CommandResult {
        let mut lines = vec![
            format!("Prediction Bot Commands (prefix: {})", self.prefix),
            String::new(),
        ];

        for (cmd, aliases, desc) in BotCommand::all_commands() {
            let alias_str = if aliases.is_empty() {
                String::new()
            } else {
                format!(" {aliases}")
            };
            lines.push(format!("  {cmd}{alias_str} - {desc}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "You get {} draws per day; the limit resets at 00:00 UTC.",
            self.service.daily_limit()
        ));

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_random(&self, user: &str) -> CommandResult {
        match self.service.try_consume_and_draw(user).await {
            Ok(DrawOutcome::Drawn(draw)) => {
                CommandResult::success(format_prediction(&draw.item, draw.remaining))
            }
            Ok(DrawOutcome::Denied) => CommandResult::error(OUT_OF_DRAWS),
            Err(e) => storage_failure(user, &e),
        }
    }

    async fn handle_profile(&self, user: &str) -> CommandResult {
        match self.service.remaining(user).await {
            Ok(left) => CommandResult::success(format!(
                "Your profile\n\n\
                 Draws left: {left}\n\
                 The limit resets every day at 00:00 UTC.\n\n\
                 Want more? Use {}buy to get {} extra draws.",
                self.prefix,
                self.service.credit_amount()
            )),
            Err(e) => storage_failure(user, &e),
        }
    }

    fn handle_buy(&self) -> CommandResult {
        let credits = self.service.credit_amount();
        let invoice = Invoice {
            title: "Extra draws".to_owned(),
            description: format!("{credits} extra predictions"),
            payload: PURCHASE_PAYLOAD.to_owned(),
            currency: STARS_CURRENCY.to_owned(),
            amount: self.price_stars,
            credits,
        };

        CommandResult::success_with_invoice(
            format!(
                "{credits} draws for {} Star(s). Complete the payment to receive them.",
                self.price_stars
            ),
            invoice,
        )
    }

    #[allow(clippy::unused_self)]
    fn handle_about(&self) -> CommandResult {
        let version = env!("CARGO_PKG_VERSION");
        CommandResult::success(format!(
            "Prediction Bot v{version}\n\
             Crypto predictions for the TON community.\n\
             Each prediction is shown once before the deck reshuffles."
        ))
    }

    /// Answers an inline query with a prediction, consuming one draw.
    ///
    /// When the user is out of draws the result carries the out-of-draws text
    /// instead, so the transport can still show something.
    pub async fn inline_query(&self, user: &str) -> CommandResult {
        debug!("Inline query from {}", user);
        self.handle_random(user).await
    }

    /// Decides whether a pending payment may proceed.
    #[allow(clippy::unused_self)]
    pub fn pre_checkout(&self, payload: &str) -> bool {
        let ok = payload == PURCHASE_PAYLOAD;
        if !ok {
            warn!("Rejecting checkout with unknown payload {:?}", payload);
        }
        ok
    }

    /// Credits a purchase after the payment provider confirmed it.
    pub async fn confirm_payment(&self, user: &str, payload: &str) -> CommandResult {
        if payload != PURCHASE_PAYLOAD {
            warn!("Ignoring payment from {} with unknown payload {:?}", user, payload);
            return CommandResult::error("Unknown purchase. Please contact support.");
        }

        match self.service.credit_purchase(user).await {
            Ok(left) => CommandResult::success(format!(
                "Thanks for your purchase! {} draws added.\nDraws left: {left}",
                self.service.credit_amount()
            )),
            Err(e) => storage_failure(user, &e),
        }
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("prefix", &self.prefix)
            .field("price_stars", &self.price_stars)
            .finish_non_exhaustive()
    }
}

/// Formats a served prediction with the remaining count.
fn format_prediction(item: &str, remaining: u32) -> String {
    format!("🔮 Prediction:\n\n{item}\n\nDraws left: {remaining}")
}

fn storage_failure(user: &str, err: &QuotaError) -> CommandResult {
    error!("Quota operation failed for {}: {}", user, err);
    CommandResult::error(STORAGE_FAILURE)
}
