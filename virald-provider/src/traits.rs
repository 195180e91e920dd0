//! Core provider abstraction trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{VmConfig, VmInfo};

/// Capability contract every VM backend implements.
///
/// Each provider owns its own registry of [`VmInfo`] records. Records are
/// never shared or migrated between providers.
#[async_trait]
pub trait VmProvider: Send + Sync {
    // =========================================================================
    // Availability
    // =========================================================================

    /// Probe whether the backend is usable on this host.
    ///
    /// Never fails: any probe error collapses to `false`.
    async fn is_available(&self) -> bool;

    /// Rebuild local state from the backend's authoritative listing.
    ///
    /// Backends that cannot enumerate pre-existing VMs keep the default.
    async fn reconcile(&self) -> Result<()> {
        Ok(())
    }

    // =========================================================================
    // VM Lifecycle
    // =========================================================================

    /// Provision a VM. The returned record has its id, port and connection
    /// URL assigned; its status may still be provisional.
    async fn create_vm(&self, config: VmConfig) -> Result<VmInfo>;

    /// Stop a VM.
    async fn stop_vm(&self, vm_id: &str) -> Result<()>;

    /// Delete a VM and every backend-side artifact, then drop the record.
    async fn delete_vm(&self, vm_id: &str) -> Result<()>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Local lookup, no backend I/O.
    fn get_vm(&self, vm_id: &str) -> Option<VmInfo>;

    /// Snapshot of every known record in insertion order, no backend I/O.
    fn list_vms(&self) -> Vec<VmInfo>;

    /// Query the backend for the VM's current status and store it.
    ///
    /// Fails only for unknown ids; backend query failures yield `"unknown"`.
    async fn get_vm_status(&self, vm_id: &str) -> Result<String>;
}
