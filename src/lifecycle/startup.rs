//! Startup orchestration.
//!
//! Order: signer → upstream client → nonce book → initial sync. Any failure
//! is fatal; the proxy never serves with an unknown nonce baseline.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::blockchain::{LedgerName, Signer, SigningError};
use crate::config::{ConfigError, ProxyConfig};
use crate::http::Orchestrator;
use crate::nonce::{sync_once, NonceBook, NonceSynchronizer, SyncError};
use crate::upstream::{UpstreamClient, UpstreamError};

/// Errors that stop the proxy from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("signer: {0}")]
    Signer(#[from] SigningError),

    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("could not sync nonce: {0}")]
    InitialSync(#[from] SyncError),

    #[error("could not bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Everything the server and background tasks share.
#[derive(Debug, Clone)]
pub struct Components {
    pub signer: Arc<Signer>,
    pub client: Arc<UpstreamClient>,
    pub nonces: Arc<NonceBook>,
    pub sync_interval: Duration,
}

impl Components {
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.client.clone(), self.signer.clone(), self.nonces.clone())
    }

    pub fn synchronizer(&self) -> NonceSynchronizer {
        NonceSynchronizer::new(self.client.clone(), self.nonces.clone(), self.sync_interval)
    }
}

/// Build every subsystem and run the mandatory first nonce sync.
pub async fn bootstrap(config: &ProxyConfig) -> Result<Components, StartupError> {
    let signer = Arc::new(Signer::from_env_or(&config.signer.private_key)?);
    tracing::info!(address = %signer.account(), "Signing account");

    bootstrap_with_signer(config, signer).await
}

/// Like [`bootstrap`], with an already loaded key.
pub async fn bootstrap_with_signer(
    config: &ProxyConfig,
    signer: Arc<Signer>,
) -> Result<Components, StartupError> {
    let client = Arc::new(UpstreamClient::new(&config.upstream, signer.account())?);
    let nonces = Arc::new(NonceBook::new(config.nonce.stuck_poll_threshold));

    sync_once(&client, &nonces).await?;
    for ledger in LedgerName::ALL {
        tracing::info!(
            ledger = %ledger,
            nonce = nonces.snapshot(ledger).issued_nonce,
            "Synced nonce"
        );
    }

    Ok(Components {
        signer,
        client,
        nonces,
        sync_interval: Duration::from_secs(config.nonce.sync_interval_secs),
    })
}
