//! # pesa-client: Daraja STK-Push Client
//!
//! Typed async client for the Safaricom Daraja API, covering the three
//! exchanges of a Lipa Na M-Pesa Online payment:
//!
//! | Exchange | Endpoint | Entry point |
//! |----------|----------|-------------|
//! | OAuth token | `GET /oauth/v1/generate` | [`DarajaClient::access_token`] |
//! | STK push | `POST /mpesa/stkpush/v1/processrequest` | [`DarajaClient::initiate_push`] |
//! | STK query | `POST /mpesa/stkpushquery/v1/query` | [`DarajaClient::query_status`] |
//!
//! plus the pure webhook parser [`process_callback`].
//!
//! ## Architecture
//!
//! - Configuration is explicit ([`DarajaConfig`]) and passed to the
//!   constructor. There is no global settings lookup.
//! - The rest of the stack depends on the [`StkGateway`] trait, not on the
//!   concrete client.
//! - The client never retries. Callers wrap idempotent status queries in
//!   [`retry::retry_idempotent`].

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod password;
pub mod retry;
pub mod token;
pub(crate) mod wire;

pub use callback::{parse_callback, process_callback, CallbackResult};
pub use client::{Clock, DarajaClient};
pub use config::{ConfigError, DarajaConfig, Environment};
pub use error::{AuthError, CallbackError, PaymentError};
pub use gateway::{PushAck, QueryResult, StkGateway};
pub use token::AccessToken;
pub use wire::TRANSACTION_TYPE_PAYBILL;
