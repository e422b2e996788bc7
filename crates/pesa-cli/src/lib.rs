//! # pesa-cli: Operator Tooling for the M-Pesa Stack
//!
//! Provides the `pesa` command-line interface.
//!
//! ## Subcommands
//!
//! - `pesa normalize` / `pesa amount`: run the input checks a checkout runs.
//! - `pesa callback`: parse a saved webhook body the way the service does.
//! - `pesa password`: derive the STK password and timestamp for a moment.
//! - `pesa push` / `pesa query`: talk to Daraja with `MPESA_*` credentials.
//!
//! ```bash
//! pesa normalize 0712345678
//! pesa callback captured/ws_CO_191220191020363925.json
//! pesa query ws_CO_191220191020363925
//! ```

pub mod daraja;
pub mod inspect;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a file, or standard input when the path is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading standard input")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}
