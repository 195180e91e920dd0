//! Compose file generation for the docker provider.
//!
//! Each VM gets its own single-service compose document running the
//! `qemux/qemu-docker` image, which boots the configured ISO under QEMU/KVM
//! and serves a web console on port 8006 inside the container.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::VmConfig;

/// Container image that wraps QEMU.
pub const QEMU_IMAGE: &str = "qemux/qemu-docker";

/// Web console port inside the container.
pub const CONTAINER_CONSOLE_PORT: u16 = 8006;

/// Grace period before the container is killed on `down`.
pub const STOP_GRACE_PERIOD: &str = "2m";

/// Top-level compose document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: BTreeMap<String, ComposeService>,
}

/// The single VM service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    pub container_name: String,
    pub image: String,
    pub environment: QemuEnvironment,
    pub devices: Vec<String>,
    pub cap_add: Vec<String>,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub stop_grace_period: String,
}

/// Environment understood by the QEMU image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QemuEnvironment {
    #[serde(rename = "BOOT")]
    pub boot: String,
    #[serde(rename = "RAM_SIZE")]
    pub ram_size: String,
    #[serde(rename = "CPU_CORES")]
    pub cpu_cores: String,
    #[serde(rename = "DISK_SIZE")]
    pub disk_size: String,
}

impl ComposeFile {
    /// Build the compose document for one VM.
    ///
    /// `storage_dir` is the host directory mounted at `/storage`.
    pub fn for_vm(vm_id: &str, config: &VmConfig, host_port: u16, storage_dir: &Path) -> Self {
        let service = ComposeService {
            container_name: vm_id.to_string(),
            image: QEMU_IMAGE.to_string(),
            environment: QemuEnvironment {
                boot: config.iso_url.clone(),
                ram_size: config.memory_or_default().to_string(),
                cpu_cores: config.cpu_or_default().to_string(),
                disk_size: config.disk_or_default().to_string(),
            },
            devices: vec!["/dev/kvm".to_string(), "/dev/net/tun".to_string()],
            cap_add: vec!["NET_ADMIN".to_string()],
            ports: vec![format!("{}:{}", host_port, CONTAINER_CONSOLE_PORT)],
            volumes: vec![format!("{}:/storage", storage_dir.display())],
            stop_grace_period: STOP_GRACE_PERIOD.to_string(),
        };

        let mut services = BTreeMap::new();
        services.insert(vm_id.to_string(), service);

        Self {
            version: "3".to_string(),
            services,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_compose_layout() {
        let config = VmConfig::new("https://example/image.iso").with_cpu("4");
        let compose = ComposeFile::for_vm(
            "vm-1234abcd",
            &config,
            8007,
            &PathBuf::from("/data/vm-1234abcd"),
        );

        let service = &compose.services["vm-1234abcd"];
        assert_eq!(service.container_name, "vm-1234abcd");
        assert_eq!(service.image, "qemux/qemu-docker");
        assert_eq!(service.environment.boot, "https://example/image.iso");
        assert_eq!(service.environment.ram_size, "1G");
        assert_eq!(service.environment.cpu_cores, "4");
        assert_eq!(service.environment.disk_size, "16G");
        assert_eq!(service.ports, vec!["8007:8006"]);
        assert_eq!(service.volumes, vec!["/data/vm-1234abcd:/storage"]);
        assert_eq!(service.devices, vec!["/dev/kvm", "/dev/net/tun"]);
        assert_eq!(service.cap_add, vec!["NET_ADMIN"]);
        assert_eq!(service.stop_grace_period, "2m");
    }

    #[test]
    fn test_compose_yaml_keys() {
        let config = VmConfig::new("https://example/image.iso");
        let yaml = ComposeFile::for_vm("vm-a", &config, 8006, &PathBuf::from("/d/vm-a"))
            .to_yaml()
            .unwrap();

        assert!(yaml.contains("services:"));
        assert!(yaml.contains("BOOT:"));
        assert!(yaml.contains("RAM_SIZE: 1G"));
        assert!(yaml.contains("stop_grace_period: 2m"));

        let parsed: ComposeFile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.services["vm-a"].ports, vec!["8006:8006"]);
        assert_eq!(parsed.services["vm-a"].environment.boot, "https://example/image.iso");
    }
}
