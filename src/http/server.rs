//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router; every method and path goes to the proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::pipeline::Orchestrator;
use crate::http::request::{request_id, MakeRequestUuid, PendingRequest, X_REQUEST_ID};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub max_body_size: usize,
}

/// HTTP server for the signing proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, orchestrator: Orchestrator) -> Self {
        let state = AppState {
            orchestrator,
            max_body_size: config.security.max_body_size,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(x_request_id)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy every request, signing where the path demands it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();

    let mut pending = match PendingRequest::from_request(request, state.max_body_size).await {
        Ok(pending) => pending,
        Err(e) => return failed(e, &method, "passthrough", start),
    };

    let plan = match state.orchestrator.classify(&mut pending) {
        Ok(plan) => plan,
        Err(e) => return failed(e, &method, "signing", start),
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %pending.path,
        plan = ?plan,
        "Proxying request"
    );

    match state.orchestrator.execute(pending, plan).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), plan.kind(), start);
            response
        }
        Err(e) => failed(e, &method, plan.kind(), start),
    }
}

fn failed(
    error: crate::http::response::ProxyError,
    method: &str,
    kind: &'static str,
    start: Instant,
) -> Response {
    let response = error.into_response();
    metrics::record_request(method, response.status().as_u16(), kind, start);
    response
}
