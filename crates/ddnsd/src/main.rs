// # ddnsd - DDNS Daemon
//
// This is a thin integration layer: all reconciliation logic lives in
// ddns-core, and the resolver and provider live in their own crates.
//
// The ddnsd daemon is responsible for:
// 1. Loading `.env`, the YAML config file and environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP resolver and Cloudflare provider into the engine
// 4. Running the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// See `config.rs` for the full list. The required variables are:
//
// - `DDNS_EMAIL`: Cloudflare account email
// - `DDNS_API_TOKEN`: Cloudflare API token (Zone:DNS:Edit)
// - `DDNS_DOMAIN`: Zone name
// - `DDNS_HOSTS`: Comma-separated host labels (`@` for the zone apex)
// - `DDNS_IP_STACK`: `ipv4`, `ipv6` or `dual`
//
// ## Example
//
// ```bash
// export DDNS_EMAIL=ops@example.com
// export DDNS_API_TOKEN=your_token
// export DDNS_DOMAIN=example.com
// export DDNS_HOSTS=home,nas
// export DDNS_IP_STACK=dual
// export DDNS_MODE=dry-run
//
// ddnsd
// ```

mod config;

use anyhow::Result;
use config::{DaemonConfig, Mode};
use ddns_core::{ReconciliationEngine, Scheduler};
use ddns_ip_http::HttpAddressResolver;
use ddns_provider_cloudflare::{ClientOptions, CloudflareFactory};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for stopping the scheduler after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // A missing .env is fine; a malformed one is not
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Configuration error: failed to load .env: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match DaemonConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");
    info!(
        domain = %config.reconciliation.domain,
        hosts = config.reconciliation.hosts.len(),
        mode = %config.reconciliation.addressing_mode,
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let resolver = HttpAddressResolver::with_config(config.resolver.clone())?;

    if config.mode == Mode::DryRun {
        warn!("DRY-RUN mode: records will be read but never written");
    }
    let factory = CloudflareFactory::new(ClientOptions {
        timeout: config.resolver.timeout,
        dry_run: config.mode == Mode::DryRun,
        ..ClientOptions::default()
    });

    let engine = ReconciliationEngine::new(Box::new(resolver), Box::new(factory));

    for host in &config.reconciliation.hosts {
        info!("Managing host: {}", host.fqdn(&config.reconciliation.domain));
    }

    let handle = Scheduler::new(
        Arc::new(engine),
        Arc::new(config.reconciliation),
        config.schedule,
    )
    .start();

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await;

    match &signal {
        Ok(name) => info!("Received shutdown signal: {}", name),
        Err(e) => error!("Signal handling failed, shutting down: {}", e),
    }

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.stop())
        .await
        .is_err()
    {
        anyhow::bail!("Scheduler did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }

    info!("Shutting down daemon");
    signal.map(|_| ())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
