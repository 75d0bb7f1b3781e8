//! Trellis service binary.
//!
//! Runs the reward engine with an in-memory store, a JSON-RPC server,
//! and the scheduled reconciler. Member state and tree roots arrive
//! through the RPC directory methods (or `--seed-root` at startup).

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use trellis_core::constants::{
    DEFAULT_BATCH_LIMIT, DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_RPC_PORT,
};
use trellis_core::types::WalletAddress;
use trellis_service_lib::{ServiceConfig, TrellisService, spawn_reconciler, start_rpc_server};

/// Trellis reward engine — matrix placement and layer reward settlement.
#[derive(Parser, Debug)]
#[command(
    name = "trellis-service",
    version,
    about = "Trellis reward engine with JSON-RPC server and scheduled reconciler"
)]
struct Args {
    /// RPC server bind address
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind: String,

    /// RPC server port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Seconds between scheduled reconciler cycles
    #[arg(long, default_value_t = DEFAULT_RECONCILE_INTERVAL_SECS)]
    reconcile_interval_secs: u64,

    /// Pending rewards loaded per reconciler cycle
    #[arg(long, default_value_t = DEFAULT_BATCH_LIMIT)]
    batch_limit: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Register this wallet as a tree root at startup
    #[arg(long)]
    seed_root: Option<String>,
}

impl Args {
    fn into_config(self) -> (ServiceConfig, String, Option<String>) {
        let config = ServiceConfig {
            rpc_bind: self.rpc_bind,
            rpc_port: self.rpc_port,
            reconcile_interval_secs: self.reconcile_interval_secs,
            batch_limit: self.batch_limit,
            log_level: self.log_level,
        };
        (config, self.log_format, self.seed_root)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format, seed_root) = args.into_config();

    init_logging(&config.log_level, &log_format);

    info!("Trellis service v{}", env!("CARGO_PKG_VERSION"));
    info!("rpc_addr: {}", config.rpc_addr());
    info!("reconcile_interval_secs: {}", config.reconcile_interval_secs);
    info!("batch_limit: {}", config.batch_limit);

    let service = TrellisService::new(&config);

    // Optional bootstrap: register the company seed wallet.
    if let Some(root) = seed_root {
        let wallet = match root.parse::<WalletAddress>() {
            Ok(w) => w,
            Err(e) => {
                error!("invalid --seed-root: {}", e);
                process::exit(1);
            }
        };
        if let Err(e) = service.register_root(wallet.clone()) {
            error!("failed to register seed root: {}", e);
            process::exit(1);
        }
        info!("seed root registered: {}", wallet);
    }

    // Start RPC server.
    let rpc_handle = match start_rpc_server(&config.rpc_addr(), Arc::clone(&service)).await {
        Ok(handle) => {
            info!("RPC server listening on {}", config.rpc_addr());
            handle
        }
        Err(e) => {
            error!("failed to start RPC server: {}", e);
            process::exit(1);
        }
    };

    // Start the scheduled reconciler.
    let scheduler = spawn_reconciler(
        Arc::clone(&service),
        Duration::from_secs(config.reconcile_interval_secs),
    );
    info!("Trellis service running (Ctrl+C to stop)");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("received Ctrl+C, shutting down...");

    scheduler.abort();
    rpc_handle.stop().ok();
    info!("Trellis service shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
