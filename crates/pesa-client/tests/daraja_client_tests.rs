//! Contract tests for DarajaClient against wiremock mock servers.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET | `/oauth/v1/generate` | `token_*` |
//! | POST | `/mpesa/stkpush/v1/processrequest` | `push_*` |
//! | POST | `/mpesa/stkpushquery/v1/query` | `query_*` |

use chrono::{TimeZone, Utc};
use pesa_client::{password, AuthError, DarajaClient, DarajaConfig, PaymentError};
use pesa_core::{normalize_phone, CheckoutRequestId};
use rust_decimal::Decimal;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "SGWcJPtNtYNPGm6uSYR9yPYrAI3Bm";

fn fixed_instant() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 10, 15, 7, 30, 0).unwrap()
}

fn test_config(server: &MockServer) -> DarajaConfig {
    DarajaConfig::local_mock(&server.uri()).unwrap()
}

fn test_client(server: &MockServer) -> DarajaClient {
    DarajaClient::new(test_config(server))
        .unwrap()
        .with_clock(fixed_instant)
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .and(query_param("grant_type", "client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": "3599"
        })))
        .mount(server)
        .await;
}

fn accepted_push() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    }))
}

// ── GET /oauth/v1/generate ───────────────────────────────────────────

#[tokio::test]
async fn token_uses_basic_auth_over_consumer_credentials() {
    let server = MockServer::start().await;

    // base64("test-consumer-key:test-consumer-secret")
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .and(header(
            "Authorization",
            "Basic dGVzdC1jb25zdW1lci1rZXk6dGVzdC1jb25zdW1lci1zZWNyZXQ=",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": "3599"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = test_client(&server).access_token().await.unwrap();
    assert_eq!(token.as_str(), TOKEN);
    assert_eq!(token.expires_in(), Some(3599));
}

#[tokio::test]
async fn token_rejected_credentials_fail() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request - Invalid Credentials"))
        .mount(&server)
        .await;

    let err = test_client(&server).access_token().await.unwrap_err();
    let AuthError::TokenAcquisitionFailed { reason } = err;
    assert!(reason.contains("400"));
    assert!(reason.contains("Invalid Credentials"));
}

#[tokio::test]
async fn token_malformed_json_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = test_client(&server).access_token().await;
    assert!(matches!(result, Err(AuthError::TokenAcquisitionFailed { .. })));
}

#[tokio::test]
async fn token_fetched_per_call_without_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": "3599"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client.access_token().await.unwrap();
    client.access_token().await.unwrap();
}

#[tokio::test]
async fn token_reused_with_cache_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": "3599"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.token_cache = true;
    let client = DarajaClient::new(config).unwrap();
    client.access_token().await.unwrap();
    let second = client.access_token().await.unwrap();
    assert_eq!(second.as_str(), TOKEN);
}

// ── POST /mpesa/stkpush/v1/processrequest ────────────────────────────

#[tokio::test]
async fn push_sends_network_payload_and_returns_ack() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let config = test_config(&server);
    let expected = password::generate(
        &config.business_short_code,
        &config.passkey,
        fixed_instant(),
    );

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_partial_json(serde_json::json!({
            "BusinessShortCode": "174379",
            "Password": expected.password.as_str(),
            "Timestamp": "20231015103000",
            "TransactionType": "CustomerPayBillOnline",
            "Amount": 499,
            "PartyA": "254712345678",
            "PartyB": "174379",
            "PhoneNumber": "254712345678",
            "CallBackURL": "https://example.com/v1/mpesa/callback",
            "AccountReference": "Air Freight",
            "TransactionDesc": "Deposit"
        })))
        .respond_with(accepted_push())
        .expect(1)
        .mount(&server)
        .await;

    let phone = normalize_phone("0712 345 678").unwrap();
    let ack = test_client(&server)
        .initiate_push(&phone, Decimal::new(49975, 2), "Air Freight", "Deposit")
        .await
        .unwrap();

    assert_eq!(ack.checkout_request_id.as_str(), "ws_CO_191220191020363925");
    assert_eq!(ack.merchant_request_id.as_str(), "29115-34620561-1");
    assert_eq!(ack.response_code, "0");
    assert!(ack.customer_message.starts_with("Success"));
}

#[tokio::test]
async fn push_without_token_never_reaches_push_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(accepted_push())
        .expect(0)
        .mount(&server)
        .await;

    let phone = normalize_phone("0712345678").unwrap();
    let result = test_client(&server)
        .initiate_push(&phone, Decimal::from(100), "Ref", "Desc")
        .await;
    assert!(matches!(
        result,
        Err(PaymentError::AuthenticationUnavailable { .. })
    ));
}

#[tokio::test]
async fn push_error_status_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "requestId": "1234-5678",
            "errorCode": "400.002.02",
            "errorMessage": "Bad Request - Invalid PhoneNumber"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let phone = normalize_phone("0712345678").unwrap();
    let err = test_client(&server)
        .initiate_push(&phone, Decimal::from(100), "Ref", "Desc")
        .await
        .unwrap_err();

    match err {
        PaymentError::PushInitiationFailed { reason } => {
            assert!(reason.contains("400"));
            assert!(reason.contains("Invalid PhoneNumber"));
            assert!(!reason.contains(TOKEN));
        }
        other => panic!("expected PushInitiationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn push_non_zero_response_code_fails() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "",
            "ResponseCode": "1",
            "ResponseDescription": "Rejected",
            "CustomerMessage": "Rejected"
        })))
        .mount(&server)
        .await;

    let phone = normalize_phone("0712345678").unwrap();
    let result = test_client(&server)
        .initiate_push(&phone, Decimal::from(100), "Ref", "Desc")
        .await;
    assert!(matches!(result, Err(PaymentError::PushInitiationFailed { .. })));
}

#[tokio::test]
async fn push_sub_unit_amount_rejected_locally() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(accepted_push())
        .expect(0)
        .mount(&server)
        .await;

    let phone = normalize_phone("0712345678").unwrap();
    let result = test_client(&server)
        .initiate_push(&phone, Decimal::new(5, 1), "Ref", "Desc")
        .await;
    assert!(matches!(result, Err(PaymentError::PushInitiationFailed { .. })));
}

#[tokio::test]
async fn concurrent_pushes_in_same_second_share_password() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(accepted_push())
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let first = normalize_phone("0712345678").unwrap();
    let second = normalize_phone("0722000111").unwrap();
    let (a, b) = tokio::join!(
        client.initiate_push(&first, Decimal::from(100), "Ref A", "First"),
        client.initiate_push(&second, Decimal::from(200), "Ref B", "Second"),
    );
    a.unwrap();
    b.unwrap();

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.url.path() == "/mpesa/stkpush/v1/processrequest")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["Password"], bodies[1]["Password"]);
    assert_eq!(bodies[0]["Timestamp"], bodies[1]["Timestamp"]);
    assert_ne!(bodies[0]["PhoneNumber"], bodies[1]["PhoneNumber"]);
}

// ── POST /mpesa/stkpushquery/v1/query ────────────────────────────────

#[tokio::test]
async fn query_returns_result_code() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpushquery/v1/query"))
        .and(body_partial_json(serde_json::json!({
            "BusinessShortCode": "174379",
            "Timestamp": "20231015103000",
            "CheckoutRequestID": "ws_CO_191220191020363925"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ResponseCode": "0",
            "ResponseDescription": "The service request has been accepted successsfully",
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResultCode": "1032",
            "ResultDesc": "Request cancelled by user"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server)
        .query_status(&CheckoutRequestId::new("ws_CO_191220191020363925"))
        .await
        .unwrap();

    assert_eq!(result.result_code, "1032");
    assert_eq!(result.result_description, "Request cancelled by user");
    assert!(!result.is_success());
}

#[tokio::test]
async fn query_still_processing_is_failure() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/mpesa/stkpushquery/v1/query"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "requestId": "1234-5678",
            "errorCode": "500.001.1001",
            "errorMessage": "The transaction is being processed"
        })))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .query_status(&CheckoutRequestId::new("ws_CO_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::StatusQueryFailed { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn query_unreachable_server_fails() {
    let mut config = DarajaConfig::local_mock("http://127.0.0.1:1").unwrap();
    config.timeout_secs = 1;
    let client = DarajaClient::new(config).unwrap();

    let err = client
        .query_status(&CheckoutRequestId::new("ws_CO_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::AuthenticationUnavailable { .. }));
}
