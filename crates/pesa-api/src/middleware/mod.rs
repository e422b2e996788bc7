//! # Middleware Stack
//!
//! - [`metrics`]: request metrics and payment domain counters, exported in
//!   Prometheus format through the `metrics` facade.

pub mod metrics;
