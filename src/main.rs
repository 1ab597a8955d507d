mod ai;
mod batch;
mod cli;
mod db;
mod error;
mod fmt;
mod history;
mod importer;
mod interrupt;
mod matcher;
mod models;
mod prompt;
mod resolver;
mod session;
mod settings;
mod stats;

use clap::Parser;
use tracing_subscriber::{fmt as log_fmt, prelude::*, EnvFilter};

use cli::{ChecksCommands, Cli, Commands, RulesCommands, VendorsCommands};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG > --verbose > warnings only. Logs stay on stderr.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            log_fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, account } => cli::import::run(&file, &account),
        Commands::Classify { review_all } => cli::classify::run(review_all),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                name,
                merchant,
                regex,
                category,
                amount,
                direction,
                confidence,
                priority,
            } => cli::rules::add(
                &name,
                &merchant,
                regex,
                &category,
                amount.as_deref(),
                direction.as_deref(),
                confidence,
                priority,
            ),
            RulesCommands::List => cli::rules::list(),
        },
        Commands::Checks { command } => match command {
            ChecksCommands::Add {
                name,
                category,
                amount,
                days,
            } => cli::checks::add(&name, &category, &amount, days.as_deref()),
            ChecksCommands::List => cli::checks::list(),
        },
        Commands::Vendors { command } => match command {
            VendorsCommands::List => cli::vendors::list(),
        },
        Commands::Stats => cli::stats::run(),
    };

    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => std::process::exit(130),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
