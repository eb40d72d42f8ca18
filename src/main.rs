//! Prediction Bot - Main Entry Point
//!
//! Runs the quota core behind a line-based console adapter and the
//! keep-alive endpoint. Each stdin line is `<user> <message>`; the special
//! message `@inline` issues an inline query for that user.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use prediction_bot::commands::{CommandHandler, CommandResult};
use prediction_bot::config::{BotSettings, ContentPool};
use prediction_bot::health;
use prediction_bot::service::{QuotaService, SelectionService};
use prediction_bot::storage::{HistoryStore, QuotaStore, SystemClock};

/// Daily-quota prediction bot.
#[derive(Parser, Debug)]
#[command(name = "prediction_bot")]
#[command(about = "Serve non-repeating predictions under a daily quota")]
#[command(version)]
struct Args {
    /// Path to the predictions file (overrides PREDICTIONS_PATH).
    #[arg(short, long)]
    pool: Option<String>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example predictions file and exit.
    #[arg(long)]
    generate_pool: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    if args.generate_pool {
        return generate_example_pool();
    }

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings = BotSettings::from_env_with_defaults()
        .context("Failed to load bot settings from environment")?;
    if let Some(pool) = args.pool {
        settings.predictions_path = pool.into();
    }

    let pool = ContentPool::load(&settings.predictions_path).with_context(|| {
        format!(
            "Failed to load predictions from {}",
            settings.predictions_path.display()
        )
    })?;

    info!(
        "Loaded {} predictions (daily limit: {}, credit per purchase: {})",
        pool.len(),
        settings.daily_limit,
        settings.credit_amount
    );

    let clock = Arc::new(SystemClock);
    let quota = Arc::new(
        QuotaStore::open(&settings.limits_path, settings.daily_limit, clock)
            .context("Failed to open quota store")?,
    );
    let history =
        Arc::new(HistoryStore::open(&settings.history_path).context("Failed to open history store")?);

    let selection = Arc::new(SelectionService::new(Arc::new(pool), history));
    let service = Arc::new(QuotaService::new(quota, selection, settings.credit_amount));
    let handler = CommandHandler::new(
        settings.command_prefix.clone(),
        Arc::clone(&service),
        settings.price_stars,
    );

    // Spawn keep-alive endpoint
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let health_addr = settings.health_addr;
    let health_handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = health::serve(health_addr, shutdown).await {
            error!("Health endpoint failed: {}", e);
        }
    });

    info!("Bot is running. Send `<user> <message>` lines, Ctrl+C to stop.");

    tokio::select! {
        result = run_console(&handler) => {
            result.context("Console adapter failed")?;
            info!("Input closed, shutting down...");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    // Cleanup
    let _ = shutdown_tx.send(());
    let _ = health_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Generates an example predictions file.
fn generate_example_pool() -> Result<()> {
    let example = ContentPool::example();
    example.save_to_file("predictions.example.txt")?;

    println!("✓ Example predictions written to: predictions.example.txt");
    println!("\nTo use this bot:");
    println!("1. Copy predictions.example.txt to predictions.txt");
    println!("2. Put one prediction per line");
    println!("3. Optionally set DAILY_LIMIT and CREDIT_AMOUNT in .env");
    println!("4. Run: prediction_bot");

    Ok(())
}

/// Reads `<user> <message>` lines from stdin until EOF.
async fn run_console(handler: &CommandHandler) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((user, text)) = line.split_once(char::is_whitespace) else {
            warn!("Expected `<user> <message>`, got {:?}", line);
            continue;
        };
        let text = text.trim();

        if text == "@inline" {
            print_reply(user, &handler.inline_query(user).await);
            continue;
        }

        let Some(result) = handler.try_handle(user, text).await else {
            debug!("Ignoring non-command message from {}", user);
            continue;
        };
        print_reply(user, &result);

        // No payment provider here: settle invoices on the spot.
        if let Some(invoice) = &result.invoice
            && handler.pre_checkout(&invoice.payload)
        {
            let receipt = handler.confirm_payment(user, &invoice.payload).await;
            print_reply(user, &receipt);
        }
    }

    Ok(())
}

fn print_reply(user: &str, result: &CommandResult) {
    let marker = if result.success { "✓" } else { "✗" };
    println!("[{user}] {marker} {}", result.message);
    if let Some(invoice) = &result.invoice {
        println!(
            "[{user}] invoice: {} ({} {}, +{} draws)",
            invoice.title, invoice.amount, invoice.currency, invoice.credits
        );
    }
}
