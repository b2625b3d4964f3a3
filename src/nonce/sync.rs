//! Reconciling tracked nonces against the upstream's mined nonces.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::blockchain::LedgerName;
use crate::nonce::book::NonceBook;
use crate::observability::metrics;
use crate::upstream::{UpstreamClient, UpstreamError};

/// One or more ledgers could not be queried.
#[derive(Debug, Error)]
#[error("nonce sync failed: {}", describe(.failures))]
pub struct SyncError {
    pub failures: Vec<(LedgerName, UpstreamError)>,
}

fn describe(failures: &[(LedgerName, UpstreamError)]) -> String {
    failures
        .iter()
        .map(|(ledger, e)| format!("{ledger}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query both ledgers, then reconcile the ones that answered.
///
/// Queries run without the nonce lock held.
pub async fn sync_once(client: &UpstreamClient, book: &NonceBook) -> Result<(), SyncError> {
    let (home, side) = tokio::join!(
        client.nonce(LedgerName::Home),
        client.nonce(LedgerName::Side)
    );

    let mut failures = Vec::new();
    for (ledger, observed) in [(LedgerName::Home, home), (LedgerName::Side, side)] {
        match observed {
            Ok(mined) => {
                book.reconcile(ledger, mined);
            }
            Err(e) => failures.push((ledger, e)),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(SyncError { failures })
    }
}

/// Background task re-syncing nonces on a fixed interval.
pub struct NonceSynchronizer {
    client: Arc<UpstreamClient>,
    book: Arc<NonceBook>,
    interval: Duration,
}

impl NonceSynchronizer {
    pub fn new(client: Arc<UpstreamClient>, book: Arc<NonceBook>, interval: Duration) -> Self {
        Self {
            client,
            book,
            interval,
        }
    }

    /// Run until shutdown. Failures are logged and never end the loop.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Nonce synchronizer starting");

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = sync_once(&self.client, &self.book).await {
                        metrics::record_sync_failure();
                        tracing::warn!(error = %e, "Periodic nonce sync failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Nonce synchronizer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
