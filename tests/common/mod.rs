//! Shared utilities for integration testing: a programmable upstream API and
//! a proxy wired to it.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use signing_proxy::blockchain::Signer;
use signing_proxy::config::ProxyConfig;
use signing_proxy::lifecycle::{bootstrap_with_signer, Components, StartupError};
use signing_proxy::{HttpServer, Shutdown};

// Anvil's first account
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const API_KEY: &str = "test-api-key";

/// Bytes served by `/artifacts/raw`; deliberately not valid UTF-8 or JSON.
pub const ARTIFACT: &[u8] = b"\x00\x01binary\xff\xfe artifact";

/// First chunk of `/trickle`, which then stalls for longer than the proxy's
/// deadline.
pub const FIRST_CHUNK: &[u8] = b"first chunk\n";

/// One request seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<RecordedCall>>,
    nonces: Mutex<HashMap<String, u64>>,
    nonce_down: Mutex<bool>,
}

/// A fake upstream API.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start(home_nonce: u64, side_nonce: u64) -> Self {
        let state = Arc::new(MockState::default());
        {
            let mut nonces = state.nonces.lock().unwrap();
            nonces.insert("home".into(), home_nonce);
            nonces.insert("side".into(), side_nonce);
        }

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Calls other than nonce queries.
    pub fn api_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path != "/nonce").collect()
    }

    pub fn set_nonce(&self, chain: &str, nonce: u64) {
        self.state.nonces.lock().unwrap().insert(chain.into(), nonce);
    }

    pub fn set_nonce_down(&self, down: bool) {
        *self.state.nonce_down.lock().unwrap() = down;
    }
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response {
    (status, axum::Json(value)).into_response()
}

/// Unsigned transactions starting at `base_nonce`.
fn unsigned(base_nonce: u64, count: u64, chain_id: u64) -> serde_json::Value {
    let txs: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "chainId": chain_id,
                "data": "0x5592d6870000000000000000000000000000000031880eb58681425a93a6c777d15b636e",
                "gas": 5000000,
                "gasPrice": 0,
                "value": "0",
                "nonce": base_nonce + i,
                "to": "0x2048eDA0128dFE81332aeA4e877d3b3E61D898E9"
            })
        })
        .collect();
    json!({"status": "OK", "result": {"transactions": txs}})
}

async fn handle(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();
    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let path = parts.uri.path().to_string();

    state.calls.lock().unwrap().push(RecordedCall {
        method: parts.method.to_string(),
        path: path.clone(),
        query: query.clone(),
        authorization: parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let base_nonce = query
        .get("base_nonce")
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    let chain = query.get("chain").cloned().unwrap_or_default();
    let chain_id = if chain == "side" { 1338 } else { 1337 };

    match path.as_str() {
        "/nonce" => {
            if *state.nonce_down.lock().unwrap() {
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"status": "FAIL", "errors": ["nonce service down"]}),
                );
            }
            match state.nonces.lock().unwrap().get(&chain) {
                Some(n) => json_response(StatusCode::OK, json!({"status": "OK", "result": n})),
                None => json_response(
                    StatusCode::BAD_REQUEST,
                    json!({"status": "FAIL", "errors": ["unknown chain"]}),
                ),
            }
        }
        "/staking/deposit" => json_response(StatusCode::OK, unsigned(base_nonce, 2, chain_id)),
        "/relay/deposit" | "/relay/withdrawal" => {
            json_response(StatusCode::OK, unsigned(base_nonce, 1, chain_id))
        }
        "/bounties/missing/vote" => json_response(
            StatusCode::NOT_FOUND,
            json!({"status": "FAIL", "errors": ["no such bounty"]}),
        ),
        "/bounties/garbled/settle" => {
            json_response(StatusCode::OK, json!({"status": "OK", "result": {"transactions": 7}}))
        }
        "/bounties/badhex/vote" => {
            let mut body = unsigned(base_nonce, 1, chain_id);
            body["result"]["transactions"][0]["data"] = json!("0xnothex");
            json_response(StatusCode::OK, body)
        }
        p if p.starts_with("/bounties/") && (p.ends_with("/vote") || p.ends_with("/settle")) => {
            json_response(StatusCode::OK, unsigned(base_nonce, 1, chain_id))
        }
        "/transactions" => {
            let submitted: serde_json::Value =
                serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
            json_response(
                StatusCode::OK,
                json!({"status": "OK", "result": {"submitted": submitted["transactions"]}}),
            )
        }
        "/artifacts/raw" => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(ARTIFACT))
            .unwrap(),
        "/bounties" => json_response(
            StatusCode::BAD_REQUEST,
            json!({"status": "FAIL", "errors": ["amount too low"]}),
        ),
        "/trickle" => {
            let chunks = futures_util::stream::unfold(0u8, |step| async move {
                match step {
                    0 => Some((Ok::<_, std::io::Error>(Bytes::from_static(FIRST_CHUNK)), 1)),
                    1 => {
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        Some((Ok(Bytes::from_static(b"late chunk\n")), 2))
                    }
                    _ => None,
                }
            });
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from_stream(chunks))
                .unwrap()
        }
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            json_response(StatusCode::OK, json!({"status": "OK", "result": null}))
        }
        _ => json_response(
            StatusCode::OK,
            json!({"status": "OK", "result": {"path": path, "query": query}}),
        ),
    }
}

pub fn proxy_config(upstream: &MockUpstream) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = upstream.url();
    config.upstream.api_key = API_KEY.into();
    config.upstream.timeout_secs = 1;
    config
}

/// A running proxy in front of a mock upstream.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub components: Components,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Result<Self, StartupError> {
        let signer = Arc::new(Signer::from_private_key(TEST_PRIVATE_KEY)?);
        let components = bootstrap_with_signer(&config, signer).await?;

        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        let addr = listener.local_addr()?;
        let shutdown = Shutdown::new();
        let server = HttpServer::new(&config, components.orchestrator());
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        Ok(Self {
            addr,
            components,
            shutdown,
        })
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
