//! UTM provider driven through the `utmctl` command-line tool.
//!
//! `utmctl` is authoritative: it can enumerate every VM on the host, so the
//! registry is rebuilt from `utmctl list` on reconcile rather than grown
//! incrementally. Status strings are stored exactly as the tool prints them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::command::{args, CommandRunner, SystemCommandRunner};
use crate::error::{ProviderError, Result};
use crate::registry::SharedRegistry;
use crate::traits::VmProvider;
use crate::types::*;

/// First host port handed out (conventional VNC port).
pub const UTM_BASE_PORT: u16 = 5900;

/// Install location of utmctl inside the UTM application bundle.
pub const UTMCTL_INSTALL_PATH: &str = "/Applications/UTM.app/Contents/MacOS/utmctl";

/// Binary name looked up on PATH.
const UTMCTL_BIN: &str = "utmctl";

/// Memory passed to `utmctl create` when the config has none (MiB).
const DEFAULT_UTM_MEMORY: &str = "1024";

/// Disk size passed to `utmctl create` when the config has none (MiB).
const DEFAULT_UTM_DISK: &str = "16384";

/// One VM as printed by `utmctl list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedVm {
    pub name: String,
    pub status: String,
    pub id: String,
}

/// Parse a `utmctl list` line of the form `<name> (<status>) [<id>]`.
///
/// Returns `None` for lines that do not follow the pattern. Text after the
/// closing bracket is ignored.
pub fn parse_list_line(line: &str) -> Option<ListedVm> {
    let line = line.trim_end();

    // Name is the shortest non-empty prefix followed by " ("
    let first = line.chars().next()?.len_utf8();
    let open = line[first..].find(" (")? + first;
    let name = &line[..open];
    let rest = &line[open + 2..];

    let (status, rest) = rest.split_once(") [")?;
    let (id, _) = rest.split_once(']')?;

    Some(ListedVm {
        name: name.to_string(),
        status: status.to_string(),
        id: id.to_string(),
    })
}

/// Extract the VM id from `utmctl create` output: the first `[...]` token.
pub fn parse_created_id(output: &str) -> Option<String> {
    let start = output.find('[')? + 1;
    let len = output[start..].find(']')?;
    let id = output[start..start + len].trim();

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Provider backed by UTM's `utmctl`.
pub struct UtmProvider {
    runner: Arc<dyn CommandRunner>,
    registry: SharedRegistry,
    /// Resolved utmctl path, cached for the provider's lifetime
    utmctl_path: RwLock<Option<String>>,
    /// Name probed on PATH
    search_name: String,
    /// Fallback location probed when PATH lookup fails
    install_path: PathBuf,
    /// Configured location; when set it is the only place probed
    explicit_path: Option<PathBuf>,
}

impl UtmProvider {
    /// Create a provider using the system utmctl.
    pub fn new() -> Self {
        Self::with_runner(UTM_BASE_PORT, Arc::new(SystemCommandRunner))
    }

    /// Create a provider with a custom base port and command runner.
    pub fn with_runner(base_port: u16, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            registry: SharedRegistry::new(base_port),
            utmctl_path: RwLock::new(None),
            search_name: UTMCTL_BIN.to_string(),
            install_path: PathBuf::from(UTMCTL_INSTALL_PATH),
            explicit_path: None,
        }
    }

    /// Override the binary name looked up on PATH and the fallback install path.
    pub fn with_locations(
        mut self,
        search_name: impl Into<String>,
        install_path: impl Into<PathBuf>,
    ) -> Self {
        self.search_name = search_name.into();
        self.install_path = install_path.into();
        self
    }

    /// Use a known utmctl path. Availability probes check only this file.
    pub fn with_utmctl_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.explicit_path = Some(PathBuf::from(&path));
        self.set_cached_path(Some(path));
        self
    }

    fn cached_path(&self) -> Option<String> {
        self.utmctl_path
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_cached_path(&self, path: Option<String>) {
        *self.utmctl_path.write().unwrap_or_else(|e| e.into_inner()) = path;
    }

    /// Locate utmctl: the configured path alone if there is one, otherwise
    /// PATH first, then the application bundle.
    async fn locate_utmctl(&self) -> Option<String> {
        if let Some(explicit) = &self.explicit_path {
            return existing_file(explicit).await;
        }

        if let Ok(path) = which::which(&self.search_name) {
            return Some(path.display().to_string());
        }

        existing_file(&self.install_path).await
    }

    /// Return the cached utmctl path, probing once more if none is cached.
    async fn ensure_utmctl(&self) -> Result<String> {
        if let Some(path) = self.cached_path() {
            return Ok(path);
        }

        if !self.is_available().await {
            return Err(ProviderError::BackendUnavailable(
                "UTM is not available".to_string(),
            ));
        }

        self.cached_path().ok_or_else(|| {
            ProviderError::BackendUnavailable("Failed to locate utmctl".to_string())
        })
    }

    /// Run a utmctl subcommand and return its stdout.
    async fn utmctl(&self, argv: Vec<String>) -> Result<String> {
        let utmctl = self.ensure_utmctl().await?;
        let context = format!("utmctl {}", argv.first().map(String::as_str).unwrap_or(""));
        self.runner.run(&utmctl, &argv).await?.into_stdout(&context)
    }

    /// Clear the registry and rebuild it from `utmctl list`.
    ///
    /// Ports are reassigned from the base port in listing order.
    #[instrument(skip(self))]
    pub async fn sync_registry(&self) -> Result<usize> {
        let stdout = self.utmctl(args(["list"])).await?;

        let listed: Vec<ListedVm> = stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let parsed = parse_list_line(line);
                if parsed.is_none() {
                    debug!(line = %line, "Skipping unrecognized utmctl list line");
                }
                parsed
            })
            .collect();

        let mut state = self.registry.write();
        state.vms.clear();
        state.ports.reset(0);

        for entry in listed {
            let Some(port) = state.ports.allocate() else {
                warn!(vm_id = %entry.id, "No free VNC ports left, skipping remaining VMs");
                break;
            };
            state.vms.insert(VmInfo {
                id: entry.id,
                name: entry.name,
                status: entry.status,
                port,
                // utmctl does not expose the boot source
                config: VmConfig::new(""),
                connection_url: format!("vnc://localhost:{}", port),
            });
        }

        let count = state.vms.len();
        info!(count = count, "UTM registry rebuilt");
        Ok(count)
    }

    fn ensure_known(&self, vm_id: &str) -> Result<VmInfo> {
        self.registry
            .read()
            .vms
            .get(vm_id)
            .cloned()
            .ok_or_else(|| ProviderError::VmNotFound(vm_id.to_string()))
    }
}

async fn existing_file(path: &Path) -> Option<String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(path.display().to_string()),
        _ => None,
    }
}

impl Default for UtmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VmProvider for UtmProvider {
    async fn is_available(&self) -> bool {
        match self.locate_utmctl().await {
            Some(path) => {
                debug!(utmctl = %path, "utmctl located");
                self.set_cached_path(Some(path));
                true
            }
            None => false,
        }
    }

    async fn reconcile(&self) -> Result<()> {
        self.sync_registry().await.map(|_| ())
    }

    #[instrument(skip(self, config), fields(iso = %config.iso_url))]
    async fn create_vm(&self, config: VmConfig) -> Result<VmInfo> {
        let name = config.name.clone().unwrap_or_else(generate_vm_id);

        info!(vm_name = %name, "Creating UTM VM");

        let mut argv = args(["create", "--name"]);
        argv.push(name.clone());
        // UTM names architectures like Rust does (aarch64), not like uname (arm64)
        argv.extend(args(["--arch", std::env::consts::ARCH, "--memory"]));
        argv.push(
            config
                .memory_size
                .clone()
                .unwrap_or_else(|| DEFAULT_UTM_MEMORY.to_string()),
        );
        argv.push("--disk-size".to_string());
        argv.push(
            config
                .disk_size
                .clone()
                .unwrap_or_else(|| DEFAULT_UTM_DISK.to_string()),
        );
        argv.push("--iso".to_string());
        argv.push(config.iso_url.clone());

        let stdout = self.utmctl(argv).await?;

        let vm_id = parse_created_id(&stdout).ok_or_else(|| {
            ProviderError::CreationFailed("Could not get VM ID".to_string())
        })?;

        let vm = {
            let mut state = self.registry.write();
            let port = state.ports.allocate().ok_or_else(|| {
                ProviderError::CreationFailed(format!(
                    "VM {} created but no free VNC port is left",
                    vm_id
                ))
            })?;
            let vm = VmInfo {
                id: vm_id.clone(),
                name,
                status: STATUS_STOPPED.to_string(),
                port,
                config,
                connection_url: format!("vnc://localhost:{}", port),
            };
            state.vms.insert(vm.clone());
            vm
        };

        info!(vm_id = %vm_id, port = vm.port, "UTM VM created");
        Ok(vm)
    }

    #[instrument(skip(self), fields(vm_id = %vm_id))]
    async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        self.ensure_known(vm_id)?;

        info!("Stopping UTM VM");
        self.utmctl(args(["stop", vm_id])).await?;

        self.registry.write().vms.set_status(vm_id, STATUS_STOPPED);
        Ok(())
    }

    #[instrument(skip(self), fields(vm_id = %vm_id))]
    async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        let vm = self.ensure_known(vm_id)?;

        if vm.status == STATUS_RUNNING {
            self.stop_vm(vm_id).await?;
        }

        info!("Deleting UTM VM");
        self.utmctl(args(["delete", vm_id])).await?;

        self.registry.write().vms.remove(vm_id);

        info!("UTM VM deleted");
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

        match self.utmctl(args(["status", vm_id])).await {
            Ok(stdout) => {
                let status = stdout.trim().to_string();
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
