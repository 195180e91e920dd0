//! Configuration management for the Node Daemon.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use virald_provider::docker::{DockerProvider, DOCKER_BASE_PORT};
use virald_provider::utm::UTM_BASE_PORT;
use virald_provider::ProviderSettings;

use crate::cli::Args;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/virald/node.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API server configuration
    pub server: ServerConfig,
    /// Control plane registration
    pub control_plane: ControlPlaneConfig,
    /// VM provider configuration
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Defaults with CLI overrides applied.
    pub fn default_with_cli(args: &Args) -> Self {
        Self::default().with_cli_overrides(args)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref listen) = args.listen {
            self.server.listen_address = listen.clone();
        } else if let Some(port) = args.port {
            self.server.listen_address = format!("0.0.0.0:{}", port);
        }

        if let Some(ref api_url) = args.api_url {
            self.control_plane.api_url = api_url.clone();
        }

        if let Some(ref node_address) = args.node_address {
            self.control_plane.node_address = node_address.clone();
        }

        if args.no_register {
            self.control_plane.registration_enabled = false;
        }

        if let Some(ref data_dir) = args.data_dir {
            self.providers.data_dir = Some(data_dir.clone());
        }

        if let Some(ref provider) = args.provider {
            self.providers.preferred = Some(provider.clone());
        }

        if let Some(ref utmctl) = args.utmctl {
            self.providers.utmctl_path = Some(utmctl.clone());
        }

        self
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on for the HTTP API
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Control plane registration configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Control plane API base URL
    pub api_url: String,
    /// Address announced at registration
    pub node_address: String,
    /// Register at startup
    pub registration_enabled: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            node_address: "127.0.0.1:9090".to_string(),
            registration_enabled: true,
        }
    }
}

/// VM provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Docker data directory (defaults to ./vm-data)
    pub data_dir: Option<String>,
    /// First host port for docker VMs
    pub docker_base_port: u16,
    /// First host port for UTM VMs
    pub utm_base_port: u16,
    /// Explicit utmctl path
    pub utmctl_path: Option<String>,
    /// Provider to activate instead of the default choice
    pub preferred: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            docker_base_port: DOCKER_BASE_PORT,
            utm_base_port: UTM_BASE_PORT,
            utmctl_path: None,
            preferred: None,
        }
    }
}

impl ProvidersConfig {
    /// Settings for building the provider set.
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            data_dir: self
                .data_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(DockerProvider::default_data_dir),
            docker_base_port: self.docker_base_port,
            utm_base_port: self.utm_base_port,
            utmctl_path: self.utmctl_path.clone(),
        }
    }
}
