//! Backend-private VM registry and host port allocation.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::VmInfo;

/// Insertion-ordered table of VM records keyed by id.
#[derive(Debug, Default)]
pub struct VmRegistry {
    entries: Vec<VmInfo>,
}

impl VmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing record with the same id in place.
    pub fn insert(&mut self, vm: VmInfo) {
        match self.position(&vm.id) {
            Some(idx) => self.entries[idx] = vm,
            None => self.entries.push(vm),
        }
    }

    pub fn get(&self, vm_id: &str) -> Option<&VmInfo> {
        self.entries.iter().find(|vm| vm.id == vm_id)
    }

    pub fn contains(&self, vm_id: &str) -> bool {
        self.position(vm_id).is_some()
    }

    /// Update the status of a record. Returns false when the id is unknown.
    pub fn set_status(&mut self, vm_id: &str, status: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|vm| vm.id == vm_id) {
            Some(vm) => {
                vm.status = status.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, vm_id: &str) -> Option<VmInfo> {
        self.position(vm_id).map(|idx| self.entries.remove(idx))
    }

    pub fn list(&self) -> Vec<VmInfo> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, vm_id: &str) -> Option<usize> {
        self.entries.iter().position(|vm| vm.id == vm_id)
    }
}

/// Registry plus port allocator behind a lock.
///
/// Guards are never held across an await point. Poisoning is ignored: the
/// registry holds plain data and stays consistent after a panicking writer.
#[derive(Debug)]
pub struct SharedRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Debug)]
pub struct RegistryState {
    pub vms: VmRegistry,
    pub ports: PortAllocator,
}

impl SharedRegistry {
    pub fn new(base_port: u16) -> Self {
        Self {
            inner: RwLock::new(RegistryState {
                vms: VmRegistry::new(),
                ports: PortAllocator::new(base_port),
            }),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Monotonic host port allocator: `base + n` for the n-th allocation.
///
/// Ports are never reclaimed after a VM is deleted. Collisions are possible
/// only across process restarts, when containers from a previous run still
/// hold ports the fresh allocator hands out again.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    base: u16,
    allocated: u32,
}

impl PortAllocator {
    pub fn new(base: u16) -> Self {
        Self { base, allocated: 0 }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// Hand out the next port, or `None` once the range above `base` is used up.
    pub fn allocate(&mut self) -> Option<u16> {
        let port = u16::try_from(u32::from(self.base) + self.allocated).ok()?;
        self.allocated += 1;
        Some(port)
    }

    /// Restart numbering after a full registry rebuild of `count` records.
    pub fn reset(&mut self, count: u16) {
        self.allocated = u32::from(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VmConfig;

    fn record(id: &str, port: u16) -> VmInfo {
        VmInfo {
            id: id.to_string(),
            name: id.to_string(),
            status: "running".to_string(),
            port,
            config: VmConfig::new("iso"),
            connection_url: format!("http://localhost:{}", port),
        }
    }

    #[test]
    fn test_registry_keeps_insertion_order() {
        let mut registry = VmRegistry::new();
        registry.insert(record("b", 1));
        registry.insert(record("a", 2));
        registry.insert(record("c", 3));

        let ids: Vec<String> = registry.list().into_iter().map(|vm| vm.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        registry.remove("a");
        let ids: Vec<String> = registry.list().into_iter().map(|vm| vm.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_registry_set_status() {
        let mut registry = VmRegistry::new();
        registry.insert(record("a", 1));

        assert!(registry.set_status("a", "stopped"));
        assert_eq!(registry.get("a").unwrap().status, "stopped");
        assert!(!registry.set_status("missing", "stopped"));
    }

    #[test]
    fn test_port_allocator_never_reuses() {
        let mut ports = PortAllocator::new(8006);
        assert_eq!(ports.allocate(), Some(8006));
        assert_eq!(ports.allocate(), Some(8007));
        assert_eq!(ports.allocate(), Some(8008));

        ports.reset(1);
        assert_eq!(ports.allocate(), Some(8007));
    }

    #[test]
    fn test_port_allocator_exhaustion() {
        let mut ports = PortAllocator::new(u16::MAX - 1);
        assert_eq!(ports.allocate(), Some(u16::MAX - 1));
        assert_eq!(ports.allocate(), Some(u16::MAX));
        assert_eq!(ports.allocate(), None);
        assert_eq!(ports.allocate(), None);

        let mut zero = PortAllocator::new(0);
        zero.reset(u16::MAX);
        assert_eq!(zero.allocate(), Some(u16::MAX));
        assert_eq!(zero.allocate(), None);
    }
}
