//! Krash Order CLI - migrations, admins, webhook and reports.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! ko-cli migrate
//!
//! # Manage stored admins
//! ko-cli admin add 123456789
//! ko-cli admin remove 123456789
//! ko-cli admin list
//!
//! # Register the Telegram webhook
//! ko-cli webhook set --drop-pending
//!
//! # Export the order report for March 2025
//! ko-cli report export --period 03.2025
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin` - Add, remove or list admins
//! - `webhook set` - Register the webhook with Telegram
//! - `report export` - Write the order CSV report

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ko-cli")]
#[command(author, version, about = "Krash Order CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admins
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage the Telegram webhook
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// Order reports
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin rights to a Telegram user
    Add {
        /// Telegram user id
        user_id: String,
    },
    /// Revoke admin rights from a Telegram user
    Remove {
        /// Telegram user id
        user_id: String,
    },
    /// List stored admins
    List,
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Register `WEBHOOK_URL` with Telegram
    Set {
        /// Discard updates queued while no webhook was set
        #[arg(long)]
        drop_pending: bool,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// Export active orders as CSV
    Export {
        /// `DD.MM` for a day of the current year, `MM.YYYY` for a month
        #[arg(short, long)]
        period: Option<String>,

        /// Output file (default: `orders_<start>_<end>.csv`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Add { user_id } => commands::admin::add(&user_id).await?,
            AdminAction::Remove { user_id } => commands::admin::remove(&user_id).await?,
            AdminAction::List => {
                commands::admin::list().await?;
            }
        },
        Commands::Webhook { action } => match action {
            WebhookAction::Set { drop_pending } => commands::webhook::set(drop_pending).await?,
        },
        Commands::Report { action } => match action {
            ReportAction::Export { period, output } => {
                commands::report::export(period.as_deref(), output.as_deref()).await?;
            }
        },
    }
    Ok(())
}
