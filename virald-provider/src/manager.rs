//! Provider discovery and selection.
//!
//! The manager owns no VM state. It only decides which provider's registry
//! answers lifecycle calls:
//!
//! ```text
//!   discover() ──► probe every candidate ──► register available ones
//!                                         └► pick first of [utm, docker]
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use tracing::{info, warn};

use crate::docker::{DockerProvider, DOCKER_BASE_PORT};
use crate::error::{ProviderError, Result};
use crate::traits::VmProvider;
use crate::types::{VmConfig, VmInfo};
use crate::utm::{UtmProvider, UTM_BASE_PORT};

/// Known provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Utm,
    Docker,
}

impl ProviderKind {
    /// Selection preference: UTM (macOS hosts) before docker.
    pub const PREFERENCE: [ProviderKind; 2] = [ProviderKind::Utm, ProviderKind::Docker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utm => "utm",
            Self::Docker => "docker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "utm" => Some(Self::Utm),
            "docker" => Some(Self::Docker),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for the built-in providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Directory for docker compose files and VM storage
    pub data_dir: PathBuf,
    pub docker_base_port: u16,
    pub utm_base_port: u16,
    /// Explicit utmctl location, skipping PATH discovery
    pub utmctl_path: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            data_dir: DockerProvider::default_data_dir(),
            docker_base_port: DOCKER_BASE_PORT,
            utm_base_port: UTM_BASE_PORT,
            utmctl_path: None,
        }
    }
}

/// Delegates VM lifecycle calls to the active provider.
pub struct VmManager {
    /// Registered providers in registration order
    providers: Vec<(ProviderKind, Arc<dyn VmProvider>)>,
    active: RwLock<Option<ProviderKind>>,
}

impl VmManager {
    /// Probe the built-in providers and select one.
    pub async fn with_default_providers(settings: &ProviderSettings) -> Self {
        let docker = DockerProvider::with_runner(
            settings.data_dir.clone(),
            settings.docker_base_port,
            Arc::new(crate::command::SystemCommandRunner),
        );

        let mut utm = UtmProvider::with_runner(
            settings.utm_base_port,
            Arc::new(crate::command::SystemCommandRunner),
        );
        if let Some(path) = &settings.utmctl_path {
            utm = utm.with_utmctl_path(path.clone());
        }

        Self::discover(vec![
            (ProviderKind::Docker, Arc::new(docker) as Arc<dyn VmProvider>),
            (ProviderKind::Utm, Arc::new(utm) as Arc<dyn VmProvider>),
        ])
        .await
    }

    /// Probe `candidates` concurrently and register the available ones.
    ///
    /// Registered providers are reconciled once; a failed reconcile is logged
    /// and the provider stays registered.
    pub async fn discover(candidates: Vec<(ProviderKind, Arc<dyn VmProvider>)>) -> Self {
        let probes = join_all(candidates.iter().map(|(_, provider)| provider.is_available())).await;

        let mut providers = Vec::new();
        for ((kind, provider), available) in candidates.into_iter().zip(probes) {
            if !available {
                info!(provider = %kind, "Provider not available");
                continue;
            }

            if let Err(e) = provider.reconcile().await {
                warn!(provider = %kind, error = %e, "Failed to reconcile provider state");
            }

            info!(provider = %kind, "Provider available");
            providers.push((kind, provider));
        }

        let active = ProviderKind::PREFERENCE
            .into_iter()
            .find(|kind| providers.iter().any(|(k, _)| k == kind));

        match active {
            Some(kind) => info!(provider = %kind, "Selected active provider"),
            None => warn!("No VM provider available"),
        }

        Self {
            providers,
            active: RwLock::new(active),
        }
    }

    /// Switch the active provider. Never re-probes.
    pub fn set_provider(&self, name: &str) -> Result<()> {
        let kind = ProviderKind::from_name(name)
            .filter(|kind| self.providers.iter().any(|(k, _)| k == kind))
            .ok_or_else(|| ProviderError::ProviderNotFound(name.to_string()))?;

        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(kind);
        info!(provider = %kind, "Active provider switched");
        Ok(())
    }

    /// Names of registered providers in registration order.
    pub fn available_providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|(kind, _)| kind.as_str().to_string())
            .collect()
    }

    /// Name of the active provider, if any.
    pub fn active_provider(&self) -> Option<String> {
        self.active_kind().map(|kind| kind.as_str().to_string())
    }

    fn active_kind(&self) -> Option<ProviderKind> {
        *self.active.read().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_provider(&self) -> Result<Arc<dyn VmProvider>> {
        let kind = self.active_kind().ok_or(ProviderError::NoProviderAvailable)?;
        self.providers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, provider)| provider.clone())
            .ok_or(ProviderError::NoProviderAvailable)
    }

    pub async fn create_vm(&self, config: VmConfig) -> Result<VmInfo> {
        self.ensure_provider()?.create_vm(config).await
    }

    pub async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        self.ensure_provider()?.stop_vm(vm_id).await
    }

    pub async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        self.ensure_provider()?.delete_vm(vm_id).await
    }

    pub fn get_vm(&self, vm_id: &str) -> Result<Option<VmInfo>> {
        Ok(self.ensure_provider()?.get_vm(vm_id))
    }

    pub fn list_vms(&self) -> Result<Vec<VmInfo>> {
        Ok(self.ensure_provider()?.list_vms())
    }

    pub async fn get_vm_status(&self, vm_id: &str) -> Result<String> {
        self.ensure_provider()?.get_vm_status(vm_id).await
    }
}
