//! # Offline Checks
//!
//! Subcommands that need no network access: phone normalization, amount
//! validation, callback parsing and password derivation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use pesa_client::{parse_callback, password};
use pesa_core::{normalize_phone, validate_amount, whole_units};

/// Arguments for `pesa normalize`.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Phone number in local or international form.
    pub phone: String,
}

/// Arguments for `pesa amount`.
#[derive(Args, Debug)]
pub struct AmountArgs {
    /// Amount as typed into a checkout form.
    pub amount: String,
}

/// Arguments for `pesa callback`.
#[derive(Args, Debug)]
pub struct CallbackArgs {
    /// Saved webhook body, or `-` for standard input.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Arguments for `pesa password`.
#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Business short code.
    #[arg(long)]
    pub short_code: String,

    /// Lipa Na M-Pesa passkey. Falls back to `MPESA_PASSKEY`.
    #[arg(long)]
    pub passkey: Option<String>,

    /// Instant to derive for (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

/// Execute `pesa normalize`. Exit code 1 when the number is invalid.
pub fn run_normalize(args: &NormalizeArgs) -> Result<u8> {
    match normalize_phone(&args.phone) {
        Ok(phone) => {
            println!("{phone}");
            Ok(0)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(1)
        }
    }
}

/// Execute `pesa amount`. Exit code 1 when the amount is rejected.
pub fn run_amount(args: &AmountArgs) -> Result<u8> {
    match describe_amount(&args.amount) {
        Ok(line) => {
            println!("{line}");
            Ok(0)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(1)
        }
    }
}

/// The validated amount and what would actually be pushed.
pub fn describe_amount(raw: &str) -> Result<String, pesa_core::ValidationError> {
    let amount = validate_amount(raw)?;
    let pushed = whole_units(amount)
        .map(|u| u.to_string())
        .unwrap_or_else(|| "none".to_string());
    Ok(format!("amount={amount} pushed={pushed}"))
}

/// Execute `pesa callback`. Prints the parsed result as JSON; exit code 1
/// when the body would be recorded but not applied.
pub fn run_callback(args: &CallbackArgs) -> Result<u8> {
    let text = crate::read_input(&args.path)?;
    let body: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("not JSON: {e}");
            return Ok(1);
        }
    };

    match parse_callback(&body) {
        Ok(result) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("serializing callback result")?
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(1)
        }
    }
}

/// Execute `pesa password`.
pub fn run_password(args: &PasswordArgs) -> Result<u8> {
    let passkey = match &args.passkey {
        Some(p) => p.clone(),
        None => std::env::var("MPESA_PASSKEY")
            .context("no --passkey given and MPESA_PASSKEY is not set")?,
    };
    let at = args.at.unwrap_or_else(Utc::now);
    let derived = password::generate(&args.short_code, &passkey, at);
    println!("timestamp={}", derived.timestamp);
    println!("password={}", derived.password.as_str());
    Ok(0)
}
