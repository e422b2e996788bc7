//! # API Route Modules
//!
//! - `payments`: checkout, lookup, reconciliation and cancellation of
//!   payment attempts.
//! - `callbacks`: the M-Pesa settlement webhook.
//! - `services`: the service catalog and catalog-priced checkout.

pub mod callbacks;
pub mod payments;
pub mod services;
