//! Type definitions for VM configuration and records.

use serde::{Deserialize, Serialize};

/// Default guest memory passed to backends that take a size string.
pub const DEFAULT_MEMORY_SIZE: &str = "1G";
/// Default vCPU count.
pub const DEFAULT_CPU_CORES: &str = "1";
/// Default disk size.
pub const DEFAULT_DISK_SIZE: &str = "16G";

/// Status reported when a backend query fails.
pub const STATUS_UNKNOWN: &str = "unknown";
/// Status after a successful stop.
pub const STATUS_STOPPED: &str = "stopped";
/// Status of a freshly provisioned container VM before inspection.
pub const STATUS_STARTING: &str = "starting";
/// Status reported by backends for a live VM.
pub const STATUS_RUNNING: &str = "running";

// =============================================================================
// VM CONFIGURATION
// =============================================================================

/// Caller-supplied VM configuration.
///
/// Only `iso_url` is required. Size and core values are opaque strings whose
/// format is enforced by the external tool, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfig {
    /// Display label; backends synthesize one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Boot source reference
    pub iso_url: String,
    /// Guest memory, e.g. "1G"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<String>,
    /// vCPU count, e.g. "2"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<String>,
    /// Disk size, e.g. "32G"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<String>,
}

impl VmConfig {
    /// Create a configuration booting from `iso_url` with all defaults.
    pub fn new(iso_url: impl Into<String>) -> Self {
        Self {
            name: None,
            iso_url: iso_url.into(),
            memory_size: None,
            cpu_cores: None,
            disk_size: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the memory size.
    pub fn with_memory(mut self, memory_size: impl Into<String>) -> Self {
        self.memory_size = Some(memory_size.into());
        self
    }

    /// Set the vCPU count.
    pub fn with_cpu(mut self, cpu_cores: impl Into<String>) -> Self {
        self.cpu_cores = Some(cpu_cores.into());
        self
    }

    /// Set the disk size.
    pub fn with_disk(mut self, disk_size: impl Into<String>) -> Self {
        self.disk_size = Some(disk_size.into());
        self
    }

    pub fn memory_or_default(&self) -> &str {
        self.memory_size.as_deref().unwrap_or(DEFAULT_MEMORY_SIZE)
    }

    pub fn cpu_or_default(&self) -> &str {
        self.cpu_cores.as_deref().unwrap_or(DEFAULT_CPU_CORES)
    }

    pub fn disk_or_default(&self) -> &str {
        self.disk_size.as_deref().unwrap_or(DEFAULT_DISK_SIZE)
    }
}

// =============================================================================
// VM RECORD
// =============================================================================

/// Local record of a provisioned VM, owned by the provider that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmInfo {
    /// Backend-assigned or backend-namespaced identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-form status in the backend's own vocabulary
    pub status: String,
    /// Locally allocated host port
    pub port: u16,
    /// Originating configuration, never modified after creation
    pub config: VmConfig,
    /// Access URL (http:// for docker, vnc:// for utm)
    pub connection_url: String,
}

/// Generate a short VM identifier of the form `vm-xxxxxxxx`.
pub fn generate_vm_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("vm-{}", &uuid[..8])
}
