//! # Network Subcommands
//!
//! `pesa push` and `pesa query` against the environment configured through
//! `MPESA_*` variables. Useful for checking credentials and chasing a
//! stuck checkout by hand.

use anyhow::{Context, Result};
use clap::Args;

use pesa_client::retry::{retry_idempotent, DEFAULT_MAX_RETRIES, MAX_RETRIES_CAP};
use pesa_client::{DarajaClient, DarajaConfig};
use pesa_core::{normalize_phone, validate_amount, CheckoutRequestId};

/// Arguments for `pesa push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Payer phone number.
    #[arg(long)]
    pub phone: String,

    /// Amount to request.
    #[arg(long)]
    pub amount: String,

    /// Account reference shown on the prompt.
    #[arg(long)]
    pub reference: String,

    /// Transaction description.
    #[arg(long, default_value = "Payment")]
    pub description: String,
}

/// Arguments for `pesa query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// `CheckoutRequestID` returned by the push.
    pub checkout_request_id: String,

    /// Retries for transient failures.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_RETRIES,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_RETRIES_CAP))
    )]
    pub retries: u32,
}

fn client() -> Result<DarajaClient> {
    let config = DarajaConfig::from_env().context("loading MPESA_* configuration")?;
    tracing::info!(environment = %config.environment, "using Daraja environment");
    DarajaClient::new(config).context("building Daraja client")
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

/// Execute `pesa push`.
pub fn run_push(args: &PushArgs) -> Result<u8> {
    let phone = normalize_phone(&args.phone)?;
    let amount = validate_amount(&args.amount)?;
    let client = client()?;

    let ack = runtime()?.block_on(client.initiate_push(
        &phone,
        amount,
        &args.reference,
        &args.description,
    ))?;
    println!("{}", serde_json::to_string_pretty(&ack)?);
    Ok(0)
}

/// Execute `pesa query`. Exit code 1 when the payer did not complete.
pub fn run_query(args: &QueryArgs) -> Result<u8> {
    let client = client()?;
    let checkout_request_id = CheckoutRequestId::new(args.checkout_request_id.as_str());

    let result = runtime()?.block_on(retry_idempotent("stk_query", args.retries, || {
        client.query_status(&checkout_request_id)
    }))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.is_success() { 0 } else { 1 })
}
