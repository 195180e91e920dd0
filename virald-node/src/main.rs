//! # virald Node Daemon
//!
//! Runs on each host, provisions VMs through the best available provider
//! (UTM on macOS, otherwise docker) and announces itself to the control plane.
//!
//! ## Usage
//! ```bash
//! virald-node --config /etc/virald/node.yaml
//! API_URL=http://cp:8080 NODE_ADDRESS=10.0.0.5:9090 virald-node
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use virald_node::cli::Args;
use virald_node::config::{Config, DEFAULT_CONFIG_PATH};
use virald_node::server;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.log_json {
        virald_common::init_logging_json(&args.log_level)?;
    } else {
        virald_common::init_logging(&args.log_level)?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting virald Node Daemon"
    );

    let config = match &args.config {
        Some(config_path) => match Config::load(config_path) {
            Ok(cfg) => {
                info!(config_path = %config_path, "Configuration loaded");
                cfg.with_cli_overrides(&args)
            }
            Err(e) => {
                error!(error = %e, path = %config_path, "Failed to load configuration");
                return Err(e);
            }
        },
        None => match Config::load(DEFAULT_CONFIG_PATH) {
            Ok(cfg) => {
                info!(config_path = %DEFAULT_CONFIG_PATH, "Configuration loaded from default location");
                cfg.with_cli_overrides(&args)
            }
            Err(_) => {
                info!("No config file found, using CLI arguments and defaults");
                Config::default_with_cli(&args)
            }
        },
    };

    info!(
        listen = %config.server.listen_address,
        api_url = %config.control_plane.api_url,
        "Node daemon configured"
    );

    if let Err(e) = server::run(config).await {
        error!(error = %e, "Server failed");
        return Err(e);
    }

    Ok(())
}
