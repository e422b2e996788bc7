//! # Daraja HTTP Client
//!
//! Async implementation of [`StkGateway`] against the Safaricom Daraja API.
//!
//! Each call is an independent request/response exchange: a token fetch
//! (or cache hit), then one POST carrying a password freshly derived from
//! the current instant. The client holds no per-request mutable state, so
//! one instance can be shared via `Arc` across tasks.
//!
//! ## Timeout & Retry
//!
//! Every request uses the configured timeout (default 30s). Retries are NOT
//! built into the client; callers choose a policy via [`crate::retry`], and
//! only ever for status queries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pesa_core::{whole_units, CanonicalPhone, CheckoutRequestId, MerchantRequestId};

use crate::config::DarajaConfig;
use crate::error::{body_excerpt, AuthError, PaymentError};
use crate::gateway::{PushAck, QueryResult, StkGateway};
use crate::password;
use crate::token::{self, AccessToken, TokenCache};
use crate::wire::{
    StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse, TRANSACTION_TYPE_PAYBILL,
};

/// Source of the instant a request password is derived from.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Daraja STK-Push client.
pub struct DarajaClient {
    http: reqwest::Client,
    config: DarajaConfig,
    token_cache: Option<TokenCache>,
    clock: Clock,
}

impl std::fmt::Debug for DarajaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaClient")
            .field("config", &self.config)
            .field("token_cache", &self.token_cache.is_some())
            .finish()
    }
}

/// Which endpoint a POST went to, for error mapping.
#[derive(Clone, Copy)]
enum Call {
    Push,
    Query,
}

impl Call {
    fn name(self) -> &'static str {
        match self {
            Self::Push => "stk_push",
            Self::Query => "stk_query",
        }
    }

    fn fail(self, reason: String) -> PaymentError {
        match self {
            Self::Push => PaymentError::PushInitiationFailed { reason },
            Self::Query => PaymentError::StatusQueryFailed { reason },
        }
    }
}

impl DarajaClient {
    /// Build a client from configuration.
    pub fn new(config: DarajaConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| PaymentError::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let token_cache = config.token_cache.then(TokenCache::default);
        Ok(Self {
            http,
            config,
            token_cache,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the clock used for request timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    /// Obtain a bearer token, from the cache when enabled.
    pub async fn access_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(cache) = &self.token_cache {
            if let Some(token) = cache.get(&self.config.consumer_key) {
                tracing::debug!("using cached M-Pesa access token");
                return Ok(token);
            }
        }

        let token = token::fetch(&self.http, &self.config).await.map_err(|e| {
            tracing::error!(error = %e, "M-Pesa access token acquisition failed");
            e
        })?;

        if let Some(cache) = &self.token_cache {
            cache.put(&self.config.consumer_key, &token);
        }
        Ok(token)
    }

    /// Send an STK push prompting `phone` to pay `amount`.
    ///
    /// The amount is truncated to whole shillings on the wire.
    pub async fn initiate_push(
        &self,
        phone: &CanonicalPhone,
        amount: Decimal,
        account_reference: &str,
        description: &str,
    ) -> Result<PushAck, PaymentError> {
        let units = match whole_units(amount) {
            Some(units) if units >= 1 => units,
            _ => {
                return Err(PaymentError::PushInitiationFailed {
                    reason: format!("amount {amount} does not truncate to a payable whole unit"),
                })
            }
        };

        let token = self.access_token().await?;
        let url = self.endpoint(Call::Push)?;
        let generated = password::generate(
            &self.config.business_short_code,
            &self.config.passkey,
            (self.clock)(),
        );

        let request = StkPushRequest {
            business_short_code: &self.config.business_short_code,
            password: &generated.password,
            timestamp: &generated.timestamp,
            transaction_type: TRANSACTION_TYPE_PAYBILL,
            amount: units,
            party_a: phone.as_str(),
            party_b: &self.config.business_short_code,
            phone_number: phone.as_str(),
            call_back_url: self.config.callback_url.as_str(),
            account_reference,
            transaction_desc: description,
        };

        let resp: StkPushResponse = self.post_json(Call::Push, url, &token, &request).await?;

        if resp.response_code != "0" || resp.checkout_request_id.is_empty() {
            tracing::error!(
                response_code = %resp.response_code,
                merchant_request_id = %resp.merchant_request_id,
                "STK push not accepted"
            );
            return Err(PaymentError::PushInitiationFailed {
                reason: format!(
                    "push not accepted: response code {} ({})",
                    resp.response_code, resp.response_description
                ),
            });
        }

        let ack = PushAck {
            checkout_request_id: CheckoutRequestId::new(resp.checkout_request_id),
            merchant_request_id: MerchantRequestId::new(resp.merchant_request_id),
            response_code: resp.response_code,
            response_description: resp.response_description,
            customer_message: resp.customer_message,
        };
        tracing::info!(
            checkout_request_id = %ack.checkout_request_id,
            merchant_request_id = %ack.merchant_request_id,
            "STK push accepted"
        );
        Ok(ack)
    }

    /// Query the outcome of an earlier push. Does not mutate anything.
    pub async fn query_status(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<QueryResult, PaymentError> {
        let token = self.access_token().await?;
        let url = self.endpoint(Call::Query)?;
        let generated = password::generate(
            &self.config.business_short_code,
            &self.config.passkey,
            (self.clock)(),
        );

        let request = StkQueryRequest {
            business_short_code: &self.config.business_short_code,
            password: &generated.password,
            timestamp: &generated.timestamp,
            checkout_request_id: checkout_request_id.as_str(),
        };

        let resp: StkQueryResponse = self.post_json(Call::Query, url, &token, &request).await?;

        let result = QueryResult {
            checkout_request_id: if resp.checkout_request_id.is_empty() {
                checkout_request_id.clone()
            } else {
                CheckoutRequestId::new(resp.checkout_request_id)
            },
            merchant_request_id: MerchantRequestId::new(resp.merchant_request_id),
            response_code: resp.response_code,
            response_description: resp.response_description,
            result_code: resp.result_code,
            result_description: resp.result_desc,
        };
        tracing::info!(
            checkout_request_id = %result.checkout_request_id,
            result_code = %result.result_code,
            "STK status query answered"
        );
        Ok(result)
    }

    fn endpoint(&self, call: Call) -> Result<url::Url, PaymentError> {
        let url = match call {
            Call::Push => self.config.push_url(),
            Call::Query => self.config.query_url(),
        };
        url.map_err(|e| PaymentError::NotConfigured {
            reason: e.to_string(),
        })
    }

    /// POST `body` with the bearer token and decode a 2xx JSON response.
    async fn post_json<B, T>(
        &self,
        call: Call,
        url: url::Url,
        token: &AccessToken,
        body: &B,
    ) -> Result<T, PaymentError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let operation = call.name();
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(operation, timeout = e.is_timeout(), error = %e, "M-Pesa request failed");
                call.fail(format!("{operation}: transport error: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt = body_excerpt(&body);
            tracing::error!(operation, status = status.as_u16(), body = %excerpt, "M-Pesa returned an error status");
            return Err(call.fail(format!("{operation}: HTTP {status}: {excerpt}")));
        }

        resp.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "M-Pesa response could not be decoded");
            call.fail(format!("{operation}: response deserialization failed: {e}"))
        })
    }
}

#[async_trait]
impl StkGateway for DarajaClient {
    async fn initiate_push(
        &self,
        phone: &CanonicalPhone,
        amount: Decimal,
        account_reference: &str,
        description: &str,
    ) -> Result<PushAck, PaymentError> {
        DarajaClient::initiate_push(self, phone, amount, account_reference, description).await
    }

    async fn query_status(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<QueryResult, PaymentError> {
        DarajaClient::query_status(self, checkout_request_id).await
    }
}
