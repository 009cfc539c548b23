//! httpkv Server Binary
//!
//! Starts the HTTP server for httpkv.

use std::time::Duration;

use clap::Parser;
use httpkv::network::shutdown_signal;
use httpkv::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// httpkv Server
#[derive(Parser, Debug)]
#[command(name = "httpkv-server")]
#[command(about = "Durable key-value store over HTTP")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./httpkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// Shared secret required on every call
    #[arg(long, env = "AUTHKEY", hide_env_values = true, default_value = "")]
    auth_key: String,

    /// Seconds in-flight requests may run after a shutdown signal
    #[arg(long, default_value = "5")]
    shutdown_grace_secs: u64,

    /// Largest accepted value in MB
    #[arg(long, default_value = "16")]
    max_value_mb: usize,

    /// WAL size in MB that triggers a checkpoint
    #[arg(long, default_value = "64")]
    checkpoint_mb: u64,

    /// Keep data in memory only (nothing is persisted)
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,httpkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("httpkv Server v{}", httpkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .auth_key(args.auth_key)
        .shutdown_grace(Duration::from_secs(args.shutdown_grace_secs))
        .max_value_size(args.max_value_mb * 1024 * 1024)
        .checkpoint_threshold(args.checkpoint_mb * 1024 * 1024)
        .build();

    let started = if args.in_memory {
        Server::start_in_memory(config).await
    } else {
        Server::start(config).await
    };

    let server = match started {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
