//! Inventory abstraction over the virtualization management platform.
//!
//! The provisioning core never talks to the platform directly. Every remote
//! call goes through the [`Inventory`] trait, so the same workflow runs
//! against a live endpoint or against [`SimulatedInventory`].
//!
//! Handles are resolved by name on each provisioning run and are never
//! cached across runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use vcbox_shared::errors::VcboxResult;

use crate::spec::{CloneSpec, ConfigSpec};

pub mod devices;
pub mod guest;
mod simulated;

pub use devices::{
    DiskBacking, DiskBackingState, GenericDevice, NicAdapter, NicBacking, VirtualDevice,
    VirtualDisk, VirtualEthernetCard,
};
pub use guest::{GuestNetworkSnapshot, GuestNic};
pub use simulated::{Fault, InventoryBuilder, InventoryState, SimulatedInventory};

/// Kind of object an [`InventoryHandle`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Datacenter,
    ComputeResource,
    ResourcePool,
    Folder,
    Network,
    VirtualMachine,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Datacenter => "datacenter",
            ObjectKind::ComputeResource => "compute resource",
            ObjectKind::ResourcePool => "resource pool",
            ObjectKind::Folder => "folder",
            ObjectKind::Network => "network",
            ObjectKind::VirtualMachine => "virtual machine",
        }
    }
}

/// Opaque reference to a named object in the platform's hierarchy.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryHandle {
    kind: ObjectKind,
    id: String,
    name: String,
}

impl InventoryHandle {
    pub fn new(kind: ObjectKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Platform-assigned managed object id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for InventoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.kind.as_str(), self.id, self.name)
    }
}

impl fmt::Display for InventoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.as_str(), self.name)
    }
}

/// A compute resource (host or cluster) and its root resource pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeResource {
    pub handle: InventoryHandle,
    pub root_pool: InventoryHandle,
}

/// How a network is attached to virtual NICs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkBacking {
    /// Standard port group, bound by network reference.
    Standard,
    /// Distributed switch port group, bound by switch UUID + port-group key.
    DistributedPortgroup {
        switch_uuid: String,
        portgroup_key: String,
    },
}

/// A network found in a datacenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkInfo {
    pub handle: InventoryHandle,
    pub backing: NetworkBacking,
}

/// Configuration of a virtual machine or template, as read from the platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmConfig {
    /// Durable BIOS UUID.
    pub uuid: String,
    pub num_cpus: u32,
    pub memory_mb: u64,
    pub devices: Vec<VirtualDevice>,
}

impl VmConfig {
    /// All virtual disks attached to the machine.
    pub fn disks(&self) -> impl Iterator<Item = &VirtualDisk> {
        self.devices.iter().filter_map(|d| match d {
            VirtualDevice::Disk(disk) => Some(disk),
            _ => None,
        })
    }

    /// The first virtual NIC, if the machine has one.
    pub fn first_nic(&self) -> Option<&VirtualEthernetCard> {
        self.devices.iter().find_map(|d| match d {
            VirtualDevice::Ethernet(nic) => Some(nic),
            _ => None,
        })
    }
}

/// Reference to a long-running platform task.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

/// Terminal state of a platform task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Task completed. Clone tasks carry the new machine.
    Success(Option<InventoryHandle>),
    /// Task failed with the platform's diagnostic payload.
    Error(String),
}

/// Remote operations the provisioning core needs from the platform.
///
/// Lookups return `Ok(None)` when the named object is absent; transport
/// failures are `Err`. Reconfigure and clone only submit work and return a
/// [`TaskHandle`]; [`Inventory::wait_for_task`] blocks until the task reaches
/// a terminal state. Dropping that future abandons the wait but not the
/// remote task.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn find_datacenter(&self, name: &str) -> VcboxResult<Option<InventoryHandle>>;

    async fn find_compute_resource(
        &self,
        datacenter: &InventoryHandle,
        name: &str,
    ) -> VcboxResult<Option<ComputeResource>>;

    /// Direct child pools of `pool`.
    async fn child_resource_pools(&self, pool: &InventoryHandle)
    -> VcboxResult<Vec<InventoryHandle>>;

    async fn root_vm_folder(&self, datacenter: &InventoryHandle) -> VcboxResult<InventoryHandle>;

    /// Look up a `/`-separated folder path below `parent`.
    async fn find_folder(
        &self,
        parent: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<Option<InventoryHandle>>;

    /// Create a `/`-separated folder path below `parent`, including missing
    /// intermediate folders.
    ///
    /// Fails with `VcboxError::AlreadyExists` when the leaf folder exists.
    async fn create_folder(&self, parent: &InventoryHandle, path: &str)
    -> VcboxResult<InventoryHandle>;

    async fn find_network(
        &self,
        datacenter: &InventoryHandle,
        name: &str,
    ) -> VcboxResult<Option<NetworkInfo>>;

    /// Look up a VM or template by `folder/name` path inside the datacenter.
    async fn find_vm(
        &self,
        datacenter: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<Option<InventoryHandle>>;

    async fn find_vm_by_uuid(
        &self,
        datacenter: &InventoryHandle,
        uuid: &str,
    ) -> VcboxResult<Option<InventoryHandle>>;

    async fn vm_config(&self, vm: &InventoryHandle) -> VcboxResult<VmConfig>;

    async fn reconfigure_vm(&self, vm: &InventoryHandle, spec: &ConfigSpec)
    -> VcboxResult<TaskHandle>;

    async fn clone_vm(
        &self,
        template: &InventoryHandle,
        folder: &InventoryHandle,
        name: &str,
        spec: &CloneSpec,
    ) -> VcboxResult<TaskHandle>;

    async fn wait_for_task(&self, task: &TaskHandle) -> VcboxResult<TaskOutcome>;

    /// Guest-reported network state of a running machine.
    async fn guest_snapshot(&self, vm: &InventoryHandle) -> VcboxResult<GuestNetworkSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let dc = InventoryHandle::new(ObjectKind::Datacenter, "datacenter-2", "DC1");
        assert_eq!(dc.to_string(), "datacenter 'DC1'");
        assert_eq!(format!("{:?}", dc), "datacenter(datacenter-2:DC1)");
    }

    #[test]
    fn test_network_backing_serialization() {
        let backing = NetworkBacking::DistributedPortgroup {
            switch_uuid: "50 2a".into(),
            portgroup_key: "dvportgroup-10".into(),
        };
        let json = serde_json::to_string(&backing).unwrap();
        assert!(json.contains("\"type\":\"distributed_portgroup\""));
        let back: NetworkBacking = serde_json::from_str(&json).unwrap();
        assert_eq!(back, backing);
    }
}
