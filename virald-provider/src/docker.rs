//! Docker compose provider.
//!
//! Every VM is a `qemux/qemu-docker` container described by its own compose
//! file under the data directory:
//!
//! ```text
//! <data_dir>/
//!   vm-1a2b3c4d-compose.yml   # generated compose document
//!   vm-1a2b3c4d/              # mounted at /storage inside the container
//! ```
//!
//! The registry is populated only by `create_vm`; containers left over from a
//! previous process are not rediscovered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::command::{args, CommandRunner, SystemCommandRunner};
use crate::compose::ComposeFile;
use crate::error::{ProviderError, Result};
use crate::registry::SharedRegistry;
use crate::traits::VmProvider;
use crate::types::*;

/// First host port handed out (matches the in-container console port).
pub const DOCKER_BASE_PORT: u16 = 8006;

/// Docker CLI binary.
const DOCKER_BIN: &str = "docker";

/// Provider backed by `docker compose`.
pub struct DockerProvider {
    runner: Arc<dyn CommandRunner>,
    registry: SharedRegistry,
    data_dir: PathBuf,
}

impl DockerProvider {
    /// Create a provider storing compose files and VM disks under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(data_dir, DOCKER_BASE_PORT, Arc::new(SystemCommandRunner))
    }

    /// Create a provider with a custom base port and command runner.
    pub fn with_runner(
        data_dir: impl Into<PathBuf>,
        base_port: u16,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            runner,
            registry: SharedRegistry::new(base_port),
            data_dir: data_dir.into(),
        }
    }

    /// Default data directory: `vm-data` under the working directory.
    pub fn default_data_dir() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("vm-data")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the compose file for a VM.
    pub fn compose_path(&self, vm_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}-compose.yml", vm_id))
    }

    /// Host directory mounted as the VM's `/storage`.
    pub fn storage_dir(&self, vm_id: &str) -> PathBuf {
        self.data_dir.join(vm_id)
    }

    /// Run `docker compose -f <file> <action...>`.
    async fn compose(&self, vm_id: &str, action: &[&str]) -> Result<()> {
        let compose_path = self.compose_path(vm_id);
        let mut argv = args(["compose", "-f"]);
        argv.push(compose_path.display().to_string());
        argv.extend(args(action.iter().copied()));

        self.runner
            .run(DOCKER_BIN, &argv)
            .await?
            .into_stdout(&format!("docker compose {}", action.join(" ")))?;
        Ok(())
    }

    /// Read the container state (`running`, `exited`, ...) from docker.
    async fn inspect_status(&self, vm_id: &str) -> Result<String> {
        let stdout = self
            .runner
            .run(
                DOCKER_BIN,
                &args(["inspect", "--format", "{{.State.Status}}", vm_id]),
            )
            .await?
            .into_stdout("docker inspect")?;

        let status = stdout.trim();
        if status.is_empty() {
            return Err(ProviderError::ExternalTool(
                "docker inspect returned no state".to_string(),
            ));
        }
        Ok(status.to_string())
    }

    fn ensure_known(&self, vm_id: &str) -> Result<()> {
        if self.registry.read().vms.contains(vm_id) {
            Ok(())
        } else {
            Err(ProviderError::VmNotFound(vm_id.to_string()))
        }
    }
}

/// Remove a file or directory tree, treating "already gone" as success.
async fn remove_if_exists(path: &Path, recursive: bool) -> Result<()> {
    let result = if recursive {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Already removed");
            Ok(())
        }
        Err(e) => Err(ProviderError::ExternalTool(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl VmProvider for DockerProvider {
    async fn is_available(&self) -> bool {
        match self
            .runner
            .run(DOCKER_BIN, &args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(output) if output.success() => {
                debug!(version = %output.stdout.trim(), "Docker daemon reachable");
                true
            }
            Ok(output) => {
                debug!(stderr = %output.stderr.trim(), "Docker daemon not reachable");
                false
            }
            Err(e) => {
                debug!(error = %e, "Docker CLI not usable");
                false
            }
        }
    }

    #[instrument(skip(self, config), fields(iso = %config.iso_url))]
    async fn create_vm(&self, config: VmConfig) -> Result<VmInfo> {
        tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            ProviderError::ExternalTool(format!(
                "Failed to create data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })?;

        let vm_id = generate_vm_id();
        let name = config.name.clone().unwrap_or_else(|| vm_id.clone());
        let port = self.registry.write().ports.allocate().ok_or_else(|| {
            ProviderError::CreationFailed("No free host ports left".to_string())
        })?;

        info!(vm_id = %vm_id, port = port, "Creating docker VM");

        let compose = ComposeFile::for_vm(&vm_id, &config, port, &self.storage_dir(&vm_id));
        let compose_path = self.compose_path(&vm_id);
        tokio::fs::write(&compose_path, compose.to_yaml()?).await.map_err(|e| {
            ProviderError::ExternalTool(format!(
                "Failed to write {}: {}",
                compose_path.display(),
                e
            ))
        })?;

        if let Err(e) = self.compose(&vm_id, &["up", "-d"]).await {
            if let Err(cleanup) = remove_if_exists(&compose_path, false).await {
                warn!(vm_id = %vm_id, error = %cleanup, "Failed to remove compose file");
            }
            return Err(e);
        }

        let mut vm = VmInfo {
            id: vm_id.clone(),
            name,
            status: STATUS_STARTING.to_string(),
            port,
            config,
            connection_url: format!("http://localhost:{}", port),
        };

        match self.inspect_status(&vm_id).await {
            Ok(status) => vm.status = status,
            Err(e) => error!(vm_id = %vm_id, error = %e, "Error inspecting container"),
        }

        self.registry.write().vms.insert(vm.clone());

        info!(vm_id = %vm_id, status = %vm.status, "Docker VM created");
        Ok(vm)
    }

    #[instrument(skip(self), fields(vm_id = %vm_id))]
    async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        self.ensure_known(vm_id)?;

        info!("Stopping docker VM");
        self.compose(vm_id, &["down"]).await?;

        self.registry.write().vms.set_status(vm_id, STATUS_STOPPED);

        info!("Docker VM stopped");
        Ok(())
    }

    #[instrument(skip(self), fields(vm_id = %vm_id))]
    async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        self.stop_vm(vm_id).await?;

        info!("Deleting docker VM");
        remove_if_exists(&self.storage_dir(vm_id), true).await?;
        remove_if_exists(&self.compose_path(vm_id), false).await?;

        self.registry.write().vms.remove(vm_id);

        info!("Docker VM deleted");
        Ok(())
    }

    fn get_vm(&self, vm_id: &str) -> Option<VmInfo> {
        self.registry.read().vms.get(vm_id).cloned()
    }

    fn list_vms(&self) -> Vec<VmInfo> {
        self.registry.read().vms.list()
    }

    #[instrument(skip(self), fields(vm_id = %vm_id))]
    async fn get_vm_status(&self, vm_id: &str) -> Result<String> {
        self.ensure_known(vm_id)?;

        match self.inspect_status(vm_id).await {
            Ok(status) => {
                self.registry.write().vms.set_status(vm_id, status.clone());
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, "Error getting VM status");
                Ok(STATUS_UNKNOWN.to_string())
            }
        }
    }
}
