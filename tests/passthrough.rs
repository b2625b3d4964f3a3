//! Requests that do not need signing are relayed unchanged.

mod common;

use common::{
    client, proxy_config, MockUpstream, TestProxy, API_KEY, ARTIFACT, FIRST_CHUNK, TEST_ACCOUNT,
};
use serde_json::Value;
use signing_proxy::blockchain::LedgerName;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_account_defaulted_and_api_key_attached() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let response = client()
        .get(proxy.url("/balances?chain=home&token=nct"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["path"], "/balances");
    assert_eq!(body["result"]["query"]["account"], TEST_ACCOUNT);
    assert_eq!(body["result"]["query"]["token"], "nct");

    let call = &upstream.api_calls()[0];
    assert_eq!(call.method, "GET");
    assert_eq!(
        call.authorization.as_deref(),
        Some(format!("Bearer {API_KEY}").as_str())
    );
    assert!(!call.query.contains_key("base_nonce"));
}

#[tokio::test]
async fn test_caller_account_preserved() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    client()
        .get(proxy.url("/balances?account=0x0000000000000000000000000000000000000001"))
        .send()
        .await
        .unwrap();

    let call = &upstream.api_calls()[0];
    assert_eq!(
        call.query["account"],
        "0x0000000000000000000000000000000000000001"
    );
}

#[tokio::test]
async fn test_non_json_body_relayed_byte_for_byte() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let response = client()
        .get(proxy.url("/artifacts/raw"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/octet-stream"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), ARTIFACT);
}

#[tokio::test]
async fn test_error_envelope_relayed_with_status() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let response = client()
        .post(proxy.url("/bounties?chain=home"))
        .json(&serde_json::json!({"amount": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["errors"][0], "amount too low");

    let call = &upstream.api_calls()[0];
    assert_eq!(call.method, "POST");
    let forwarded: Value = serde_json::from_slice(&call.body).unwrap();
    assert_eq!(forwarded["amount"], "1");
}

#[tokio::test]
async fn test_passthrough_does_not_touch_nonces() {
    let upstream = MockUpstream::start(4, 6).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    for path in ["/staking/withdrawal?chain=home", "/bounties/42?chain=side", "/"] {
        let response = client().post(proxy.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 200, "{path}");
    }

    assert_eq!(proxy.components.nonces.snapshot(LedgerName::Home).issued_nonce, 4);
    assert_eq!(proxy.components.nonces.snapshot(LedgerName::Side).issued_nonce, 6);
    assert!(upstream.api_calls().iter().all(|c| !c.query.contains_key("base_nonce")));
}

#[tokio::test]
async fn test_request_id_generated_and_propagated() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let response = client().get(proxy.url("/balances")).send().await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let response = client()
        .get(proxy.url("/balances"))
        .header("x-request-id", "caller-supplied")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "caller-supplied");
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let response = client().get(proxy.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");
    assert_eq!(proxy.components.client.available_slots(), 32);
}

#[tokio::test]
async fn test_stream_forwards_early_bytes_then_fails_at_deadline() {
    let upstream = MockUpstream::start(0, 0).await;
    let proxy = TestProxy::start(proxy_config(&upstream)).await.unwrap();

    let start = Instant::now();
    let mut response = client().get(proxy.url("/trickle")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let first = response.chunk().await.unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(first.as_ref(), FIRST_CHUNK);

    let mut rest = Vec::new();
    let outcome = loop {
        match response.chunk().await {
            Ok(Some(chunk)) => rest.extend_from_slice(&chunk),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    assert!(outcome.is_err(), "truncated body ended cleanly");
    assert!(rest.is_empty());
    assert!(start.elapsed() < Duration::from_secs(3));

    // The call task releases its slot right after aborting the stream.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(proxy.components.client.available_slots(), 32);
}
