//! Transaction-signing reverse proxy.
//!
//! ```text
//!   caller ──▶ axum handler ──▶ classify path
//!                                 │
//!            pass-through ◀───────┴───────▶ signing
//!                 │                            │ allocate nonce (home/side)
//!                 │                            │ fetch unsigned txs
//!                 │                            │ sign (EIP-155)
//!                 ▼                            ▼ submit signed txs
//!            upstream API ──── streamed response ───▶ caller
//!
//!   background: NonceSynchronizer reconciles both ledgers every interval
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

use signing_proxy::config::load_config;
use signing_proxy::lifecycle::{bootstrap, StartupError};
use signing_proxy::observability::{logging, metrics};
use signing_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "signing-proxy")]
#[command(about = "Reverse proxy that signs upstream transactions with a held key", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "signing-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("signing-proxy: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        upstream = %config.upstream.url,
        "signing-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = bootstrap(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let synchronizer = components.synchronizer();
    let sync_shutdown = shutdown.subscribe();
    let sync_task = tokio::spawn(synchronizer.run(sync_shutdown));

    let server = HttpServer::new(&config, components.orchestrator());
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    let _ = sync_task.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
