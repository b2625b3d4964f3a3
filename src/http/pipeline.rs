//! The per-request signing pipeline.
//!
//! ```text
//! PendingRequest → classify → Plan
//!   PassThrough: stream upstream response to caller
//!   Sign:        allocate nonce → fetch unsigned (buffered)
//!                → sign → submit signed (streamed to caller)
//! ```
//!
//! A failure at any stage ends the request. Allocated nonces are not
//! returned; the periodic reconciler recovers them.

use axum::response::Response;
use std::sync::Arc;

use crate::blockchain::{
    LedgerName, SignedTransactions, Signer, TransactionDescriptor, UnsignedTransactions,
};
use crate::http::classify::sign_weight;
use crate::http::request::PendingRequest;
use crate::http::response::{forward, ProxyError};
use crate::nonce::NonceBook;
use crate::upstream::{
    response_channel, Deadline, Delivery, QueryParams, UpstreamClient, UpstreamEnvelope,
    UpstreamError, UpstreamRequest,
};

/// What a request needs from the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    PassThrough,
    Sign { ledger: LedgerName, weight: u64 },
}

impl Plan {
    /// Label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Plan::PassThrough => "passthrough",
            Plan::Sign { .. } => "signing",
        }
    }
}

/// A signing request after its nonce was reserved.
#[derive(Debug)]
struct Allocated {
    request: PendingRequest,
    ledger: LedgerName,
    base_nonce: u64,
}

/// Drives requests through the upstream client and the signer.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: Arc<UpstreamClient>,
    signer: Arc<Signer>,
    nonces: Arc<NonceBook>,
}

impl Orchestrator {
    pub fn new(client: Arc<UpstreamClient>, signer: Arc<Signer>, nonces: Arc<NonceBook>) -> Self {
        Self {
            client,
            signer,
            nonces,
        }
    }

    pub fn nonces(&self) -> &Arc<NonceBook> {
        &self.nonces
    }

    pub fn client(&self) -> &Arc<UpstreamClient> {
        &self.client
    }

    /// Default `account` and decide what the request needs.
    ///
    /// Rejects signing requests without a valid `chain` before anything
    /// else happens.
    pub fn classify(&self, request: &mut PendingRequest) -> Result<Plan, ProxyError> {
        request.query.set_default("account", self.signer.account());

        let weight = sign_weight(&request.path);
        if weight == 0 {
            return Ok(Plan::PassThrough);
        }

        let chain = request.query.get("chain");
        let ledger = chain
            .and_then(|c| c.parse::<LedgerName>().ok())
            .ok_or_else(|| ProxyError::InvalidChain(chain.map(str::to_string)))?;

        Ok(Plan::Sign { ledger, weight })
    }

    /// Run a classified request to completion.
    pub async fn execute(&self, request: PendingRequest, plan: Plan) -> Result<Response, ProxyError> {
        match plan {
            Plan::PassThrough => self.stream_to_caller(first_call(&request)).await,
            Plan::Sign { ledger, weight } => {
                let allocated = self.allocate(request, ledger, weight);
                self.sign_and_submit(allocated).await
            }
        }
    }

    fn allocate(&self, mut request: PendingRequest, ledger: LedgerName, weight: u64) -> Allocated {
        let base_nonce = self.nonces.allocate(ledger, weight);
        request.query.set("base_nonce", base_nonce.to_string());
        Allocated {
            request,
            ledger,
            base_nonce,
        }
    }

    async fn sign_and_submit(&self, allocated: Allocated) -> Result<Response, ProxyError> {
        let unsigned = self
            .client
            .call(first_call(&allocated.request), Delivery::Buffer)
            .await?;

        // A well-formed API error is the caller's answer, not ours.
        if !unsigned.status_code.is_success() && unsigned.has_errors() {
            tracing::warn!(
                ledger = %allocated.ledger,
                base_nonce = allocated.base_nonce,
                error = %unsigned.describe(),
                "Upstream refused to build transactions"
            );
            return Ok(forward(unsigned));
        }

        let descriptors = decode_unsigned(&unsigned)?;
        tracing::debug!(
            ledger = %allocated.ledger,
            base_nonce = allocated.base_nonce,
            count = descriptors.len(),
            "Signing transactions"
        );

        let signed = self.signer.sign(&descriptors)?;

        let submit = UpstreamRequest::post("/transactions")
            .query(
                QueryParams::new()
                    .with("account", self.signer.account())
                    .with("chain", allocated.ledger.as_str()),
            )
            .deadline(Deadline::Submit)
            .json(&SignedTransactions {
                transactions: signed,
            })?;

        self.stream_to_caller(submit).await
    }

    /// Issue `request` with its body streamed straight to the caller.
    async fn stream_to_caller(&self, request: UpstreamRequest) -> Result<Response, ProxyError> {
        let (sink, mut pending) = response_channel();
        let client = self.client.clone();
        let call = tokio::spawn(async move { client.call(request, Delivery::Stream(sink)).await });

        match pending.head().await {
            Some(head) => {
                // The call keeps running while the caller reads the body.
                tokio::spawn(async move {
                    if let Err(e) = call.await {
                        tracing::error!(error = %e, "Streaming task failed");
                    }
                });
                Ok(pending.into_response(head))
            }
            None => match call.await {
                Ok(Ok(envelope)) => Ok(forward(envelope)),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(ProxyError::Internal(e.to_string())),
            },
        }
    }
}

/// The caller's request, as sent upstream.
fn first_call(request: &PendingRequest) -> UpstreamRequest {
    UpstreamRequest::new(request.method.clone(), request.path.clone())
        .query(request.query.clone())
        .body(request.content_type.clone(), request.body.clone())
}

/// Unsigned transactions from the first call's `result`.
///
/// Accepts `{"transactions": [...]}` or a bare array.
fn decode_unsigned(envelope: &UpstreamEnvelope) -> Result<Vec<TransactionDescriptor>, ProxyError> {
    match envelope.result::<UnsignedTransactions>() {
        Ok(unsigned) => Ok(unsigned.transactions),
        Err(UpstreamError::Decode(first)) => envelope
            .result::<Vec<TransactionDescriptor>>()
            .map_err(|_| ProxyError::UnsignedTransactions(first)),
        Err(e) => Err(e.into()),
    }
}
