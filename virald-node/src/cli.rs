//! Command-line argument parsing.

use clap::Parser;

/// virald Node Daemon - provisions VMs through docker or UTM
#[derive(Parser, Debug, Default)]
#[command(name = "virald-node")]
#[command(about = "virald Node Daemon - provisions VMs through docker or UTM")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Listen address for the HTTP API (e.g. 0.0.0.0:9090)
    #[arg(long)]
    pub listen: Option<String>,

    /// Listen port on all interfaces; ignored when --listen is given
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Control plane API base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Address announced to the control plane (host:port)
    #[arg(long, env = "NODE_ADDRESS")]
    pub node_address: Option<String>,

    /// Directory for docker compose files and VM storage
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Provider to activate instead of the default choice (utm, docker)
    #[arg(long)]
    pub provider: Option<String>,

    /// Explicit path to utmctl
    #[arg(long)]
    pub utmctl: Option<String>,

    /// Skip registration with the control plane
    #[arg(long)]
    pub no_register: bool,
}
