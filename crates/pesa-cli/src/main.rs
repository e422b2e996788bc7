//! # pesa CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pesa_cli::daraja::{run_push, run_query, PushArgs, QueryArgs};
use pesa_cli::inspect::{
    run_amount, run_callback, run_normalize, run_password, AmountArgs, CallbackArgs,
    NormalizeArgs, PasswordArgs,
};

/// M-Pesa STK-Push operator tooling.
#[derive(Parser, Debug)]
#[command(name = "pesa", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Canonicalize a phone number.
    Normalize(NormalizeArgs),

    /// Validate an amount and show what would be pushed.
    Amount(AmountArgs),

    /// Parse a saved settlement webhook body.
    Callback(CallbackArgs),

    /// Derive the STK password and timestamp.
    Password(PasswordArgs),

    /// Send an STK push.
    Push(PushArgs),

    /// Query the status of an earlier push.
    Query(QueryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Normalize(args) => run_normalize(&args),
        Commands::Amount(args) => run_amount(&args),
        Commands::Callback(args) => run_callback(&args),
        Commands::Password(args) => run_password(&args),
        Commands::Push(args) => run_push(&args),
        Commands::Query(args) => run_query(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
