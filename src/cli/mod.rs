pub mod checks;
pub mod classify;
pub mod import;
pub mod init;
pub mod rules;
pub mod stats;
pub mod vendors;

use clap::{Parser, Subcommand};

use crate::db::Store;
use crate::error::{Result, TallyError};
use crate::settings::load_settings;

/// Opens the configured database, or explains how to create one.
pub(crate) fn open_store() -> Result<Store> {
    let db_path = load_settings().db_path();
    if !db_path.exists() {
        return Err(TallyError::Settings(format!(
            "No database found at {}\nRun `tally init` to set up.",
            db_path.display()
        )));
    }
    Store::open(&db_path)
}

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Classify bank transactions with rules, history and an optional local model."
)]
pub struct Cli {
    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a CSV export (date,description,merchant,amount,type[,check_number]).
    Import {
        /// Path to the CSV file
        file: String,
        /// Account the rows belong to
        #[arg(long)]
        account: String,
    },
    /// Classify pending transactions, asking when a suggestion is uncertain.
    Classify {
        /// Confirm every transaction, even confident ones
        #[arg(long = "review-all")]
        review_all: bool,
    },
    /// Manage merchant pattern rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage paper-check patterns.
    Checks {
        #[command(subcommand)]
        command: ChecksCommands,
    },
    /// Inspect learned merchant-to-category rules.
    Vendors {
        #[command(subcommand)]
        command: VendorsCommands,
    },
    /// Show classification counts by status.
    Stats,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a pattern rule.
    Add {
        /// Rule name shown in listings
        name: String,
        /// Merchant text to match (exact, case-insensitive)
        #[arg(long)]
        merchant: String,
        /// Treat --merchant as a regular expression
        #[arg(long)]
        regex: bool,
        /// Category to assign
        #[arg(long)]
        category: String,
        /// Amount condition: lt:N, gt:N, eq:N or MIN-MAX
        #[arg(long)]
        amount: Option<String>,
        /// Only match this direction: income, expense, transfer
        #[arg(long)]
        direction: Option<String>,
        /// Confidence percent (0-100)
        #[arg(long, default_value = "90")]
        confidence: u8,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i32,
    },
    /// List pattern rules.
    List,
}

#[derive(Subcommand)]
pub enum ChecksCommands {
    /// Add a check pattern.
    Add {
        /// Pattern name shown in listings
        name: String,
        /// Category to assign
        #[arg(long)]
        category: String,
        /// Amount: N, N,N,... or MIN-MAX
        #[arg(long)]
        amount: String,
        /// Day-of-month window: D or FIRST-LAST
        #[arg(long)]
        days: Option<String>,
    },
    /// List check patterns.
    List,
}

#[derive(Subcommand)]
pub enum VendorsCommands {
    /// List vendor rules.
    List,
}
