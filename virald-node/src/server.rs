//! Daemon setup and lifecycle.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use virald_provider::VmManager;

use crate::config::Config;
use crate::http_server;
use crate::registration::RegistrationClient;

/// Run the node daemon until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let settings = config.providers.settings();
    info!(data_dir = %settings.data_dir.display(), "Discovering VM providers");

    let manager = Arc::new(VmManager::with_default_providers(&settings).await);

    info!(
        available = ?manager.available_providers(),
        active = ?manager.active_provider(),
        "VM providers ready"
    );

    if let Some(preferred) = &config.providers.preferred {
        if let Err(e) = manager.set_provider(preferred) {
            warn!(provider = %preferred, error = %e, "Requested provider unavailable, keeping default");
        }
    }

    // Registration runs in the background and never blocks startup
    if config.control_plane.registration_enabled {
        let registration_client = RegistrationClient::new(&config);
        tokio::spawn(async move {
            registration_client.run().await;
        });
    } else {
        info!("Control plane registration disabled");
    }

    let addr: std::net::SocketAddr = config
        .server
        .listen_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    http_server::run_http_server(addr, manager, shutdown_signal()).await?;

    info!("Node daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
