//! wvbridge host binary.
//!
//! Loads `wvbridge.yaml` (or the path given as the first argument) and runs
//! the sample application over the configured transport.

use tracing_subscriber::{fmt, EnvFilter};

use wvbridge_host::{config, demo};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wvbridge.yaml".to_string());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, code = e.code().as_str(), error = %e, "config load failed");
            std::process::exit(1);
        }
    };

    tracing::info!(transport = ?cfg.transport.kind, "wvbridge-host starting");
    if let Err(e) = demo::run(&cfg).await {
        tracing::error!(code = e.code().as_str(), error = %e, "wvbridge-host failed");
        std::process::exit(1);
    }
}
