//! # M-Pesa Settlement Webhook
//!
//! **POST `/v1/mpesa/callback`**: receives the asynchronous STK result.
//!
//! The body is read as raw bytes so malformed or non-JSON deliveries are
//! still recorded. Deliveries larger than [`WEBHOOK_BODY_LIMIT`] keep only
//! their leading bytes. The response is always 200 with the acknowledgment
//! the network expects; a non-200 would only trigger redelivery of a body
//! we already hold.

use axum::body::{Body, Bytes};
use axum::extract::State;
use http_body_util::BodyExt;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::orchestration;
use crate::state::AppState;

/// Acknowledgment returned to the network.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

/// Bytes of a delivery kept for recording and parsing.
pub const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/mpesa/callback", post(mpesa_callback))
}

/// POST /v1/mpesa/callback
async fn mpesa_callback(State(state): State<AppState>, body: Body) -> Json<CallbackAck> {
    let body = read_bounded(body, WEBHOOK_BODY_LIMIT).await;
    orchestration::ingest_callback(&state, &body).await;
    Json(CallbackAck::accepted())
}

/// Collect at most `limit` bytes of `body`, draining and discarding the rest.
///
/// A transport error mid-stream keeps whatever arrived before it.
async fn read_bounded(mut body: Body, limit: usize) -> Bytes {
    let mut kept: Vec<u8> = Vec::new();
    let mut total = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(received = total, "callback body read failed: {e}");
                break;
            }
        };
        let Ok(chunk) = frame.into_data() else {
            continue;
        };
        total = total.saturating_add(chunk.len());
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    if total > limit {
        tracing::warn!(
            received = total,
            kept = limit,
            "oversized callback body truncated"
        );
    }
    Bytes::from(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_bodies_kept_whole() {
        let body = read_bounded(Body::from("{\"Body\":{}}"), 64).await;
        assert_eq!(&body[..], b"{\"Body\":{}}");
    }

    #[tokio::test]
    async fn oversized_bodies_keep_prefix() {
        let body = read_bounded(Body::from(vec![b'x'; 100]), 10).await;
        assert_eq!(body.len(), 10);
    }
}
