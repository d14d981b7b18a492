//! In-process inventory backend.
//!
//! `SimulatedInventory` keeps a datacenter hierarchy in memory and applies
//! reconfigure and clone requests the way the platform does: device changes
//! are applied by key, linked clones share the template's parent backings, and
//! a child-most disk move is refused while a template disk is still monolithic.
//!
//! Tasks complete at submission; `wait_for_task` only returns the recorded
//! outcome. The state is serde-serializable so a CLI run can persist it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use vcbox_shared::errors::{VcboxError, VcboxResult};

use super::{
    ComputeResource, DiskBacking, GenericDevice, GuestNetworkSnapshot, Inventory, InventoryHandle,
    NetworkBacking, NetworkInfo, NicAdapter, NicBacking, ObjectKind, TaskHandle, TaskOutcome,
    VirtualDevice, VirtualDisk, VirtualEthernetCard, VmConfig,
};
use crate::spec::{CloneSpec, ConfigSpec, DeviceConfigSpec, DeviceOperation, DiskMoveType};

/// Name of every datacenter's root VM folder.
const ROOT_VM_FOLDER: &str = "vm";

/// First key handed out to devices added without one.
const FIRST_DEVICE_KEY: i32 = 2000;

/// One-shot failures for exercising error paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Another writer creates the folder just before this one does.
    FolderCreateRace,
    /// The next reconfigure task fails with this diagnostic.
    ReconfigureTask(String),
    /// The next clone task fails with this diagnostic.
    CloneTask(String),
    /// The next clone succeeds but the machine never shows up in lookups.
    HideClonedVm,
}

// ============================================================================
// STATE
// ============================================================================

/// Persisted inventory contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InventoryState {
    #[serde(default)]
    datacenters: Vec<DatacenterState>,
    #[serde(default)]
    next_id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DatacenterState {
    id: String,
    name: String,
    #[serde(default)]
    folders: Vec<FolderState>,
    #[serde(default)]
    compute_resources: Vec<ComputeResourceState>,
    #[serde(default)]
    networks: Vec<NetworkState>,
    #[serde(default)]
    vms: Vec<VmState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FolderState {
    id: String,
    /// Path below the root VM folder; the root itself is "".
    path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ComputeResourceState {
    id: String,
    name: String,
    root_pool: PoolState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PoolState {
    id: String,
    name: String,
    #[serde(default)]
    children: Vec<PoolState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NetworkState {
    id: String,
    name: String,
    backing: NetworkBacking,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct VmState {
    id: String,
    name: String,
    folder: String,
    uuid: String,
    num_cpus: u32,
    memory_mb: u64,
    #[serde(default)]
    devices: Vec<VirtualDevice>,
    #[serde(default)]
    guest: GuestNetworkSnapshot,
    #[serde(default)]
    pool: Option<String>,
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn join_path(parent: &str, child: &str) -> String {
    normalize_path(&format!("{}/{}", parent, child))
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl FolderState {
    fn handle(&self) -> InventoryHandle {
        let name = if self.path.is_empty() {
            ROOT_VM_FOLDER
        } else {
            leaf_name(&self.path)
        };
        InventoryHandle::new(ObjectKind::Folder, &self.id, name)
    }
}

impl PoolState {
    fn handle(&self) -> InventoryHandle {
        InventoryHandle::new(ObjectKind::ResourcePool, &self.id, &self.name)
    }

    fn find(&self, id: &str) -> Option<&PoolState> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

impl VmState {
    fn handle(&self) -> InventoryHandle {
        InventoryHandle::new(ObjectKind::VirtualMachine, &self.id, &self.name)
    }

    fn config(&self) -> VmConfig {
        VmConfig {
            uuid: self.uuid.clone(),
            num_cpus: self.num_cpus,
            memory_mb: self.memory_mb,
            devices: self.devices.clone(),
        }
    }
}

impl InventoryState {
    fn alloc(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn datacenter(&self, handle: &InventoryHandle) -> VcboxResult<&DatacenterState> {
        self.datacenters
            .iter()
            .find(|dc| dc.id == handle.id())
            .ok_or_else(|| stale(handle))
    }

    fn datacenter_of_folder(&self, folder_id: &str) -> Option<usize> {
        self.datacenters
            .iter()
            .position(|dc| dc.folders.iter().any(|f| f.id == folder_id))
    }

    fn folder(&self, handle: &InventoryHandle) -> VcboxResult<(usize, &FolderState)> {
        let dc = self
            .datacenter_of_folder(handle.id())
            .ok_or_else(|| stale(handle))?;
        let folder = self.datacenters[dc]
            .folders
            .iter()
            .find(|f| f.id == handle.id())
            .ok_or_else(|| stale(handle))?;
        Ok((dc, folder))
    }

    fn vm_position(&self, vm_id: &str) -> Option<(usize, usize)> {
        self.datacenters.iter().enumerate().find_map(|(d, dc)| {
            dc.vms
                .iter()
                .position(|vm| vm.id == vm_id)
                .map(|v| (d, v))
        })
    }

    fn vm(&self, handle: &InventoryHandle) -> VcboxResult<&VmState> {
        let (d, v) = self.vm_position(handle.id()).ok_or_else(|| stale(handle))?;
        Ok(&self.datacenters[d].vms[v])
    }

    fn pool(&self, handle: &InventoryHandle) -> VcboxResult<&PoolState> {
        self.datacenters
            .iter()
            .flat_map(|dc| dc.compute_resources.iter())
            .find_map(|cr| cr.root_pool.find(handle.id()))
            .ok_or_else(|| stale(handle))
    }
}

fn stale(handle: &InventoryHandle) -> VcboxError {
    VcboxError::Platform(format!("managed object {:?} has been deleted", handle))
}

// ============================================================================
// DEVICE CHANGES
// ============================================================================

fn next_device_key(devices: &[VirtualDevice]) -> i32 {
    devices
        .iter()
        .map(VirtualDevice::key)
        .max()
        .map_or(FIRST_DEVICE_KEY, |k| (k + 1).max(FIRST_DEVICE_KEY))
}

/// Apply device changes the way the platform does. Errors are task diagnostics.
fn apply_device_changes(
    devices: &mut Vec<VirtualDevice>,
    changes: &[DeviceConfigSpec],
    vm_name: &str,
) -> Result<(), String> {
    for change in changes {
        let key = change.device.key();
        match change.operation {
            DeviceOperation::Remove => {
                let before = devices.len();
                devices.retain(|d| d.key() != key);
                if devices.len() == before {
                    return Err(format!("device {} is not present on {}", key, vm_name));
                }
            }
            DeviceOperation::Edit => {
                let slot = devices
                    .iter_mut()
                    .find(|d| d.key() == key)
                    .ok_or_else(|| format!("device {} is not present on {}", key, vm_name))?;
                *slot = change.device.clone();
            }
            DeviceOperation::Add => {
                let mut device = change.device.clone();
                if key <= 0 || devices.iter().any(|d| d.key() == key) {
                    device.set_key(next_device_key(devices));
                }
                if let VirtualDevice::Disk(disk) = &mut device {
                    if change.file_operation.is_some() {
                        name_new_backing(&mut disk.backing, vm_name);
                    }
                }
                devices.push(device);
            }
        }
    }
    Ok(())
}

/// Fill in the file name of a backing created with a bare `[datastore]` path.
fn name_new_backing(backing: &mut DiskBacking, vm_name: &str) {
    if backing.file_name == format!("[{}]", backing.datastore) {
        let generation = backing.chain_len() - 1;
        backing.file_name = format!(
            "[{}] {}/{}-{:06}.vmdk",
            backing.datastore, vm_name, vm_name, generation
        );
    }
}

/// Disks of a fresh clone. Linked clones keep the template's parent chain and
/// get a new child-most file; full clones get an independent copy.
fn clone_disks(
    devices: &mut [VirtualDevice],
    move_type: Option<DiskMoveType>,
    name: &str,
) -> Result<(), String> {
    let disks = devices.iter_mut().filter_map(|d| match d {
        VirtualDevice::Disk(disk) => Some(disk),
        _ => None,
    });
    for (index, disk) in disks.enumerate() {
        let file_name = match index {
            0 => format!("[{}] {}/{}.vmdk", disk.backing.datastore, name, name),
            n => format!("[{}] {}/{}_{}.vmdk", disk.backing.datastore, name, name, n),
        };
        match move_type {
            Some(DiskMoveType::MoveChildMostDiskBacking) => {
                if disk.backing.parent.is_none() {
                    return Err(format!(
                        "disk move type {} requires delta disks, but '{}' has no parent backing",
                        DiskMoveType::MoveChildMostDiskBacking.as_str(),
                        disk.backing.file_name
                    ));
                }
                disk.backing.file_name = file_name;
            }
            None => {
                disk.backing.file_name = file_name;
                disk.backing.parent = None;
            }
        }
    }
    Ok(())
}

// ============================================================================
// SIMULATED INVENTORY
// ============================================================================

#[derive(Default)]
struct Inner {
    state: InventoryState,
    tasks: HashMap<String, TaskOutcome>,
    faults: VecDeque<Fault>,
    reconfigure_calls: usize,
    clone_calls: usize,
    last_clone_spec: Option<CloneSpec>,
}

impl Inner {
    fn take_fault(&mut self, pred: impl Fn(&Fault) -> bool) -> Option<Fault> {
        let pos = self.faults.iter().position(pred)?;
        self.faults.remove(pos)
    }

    fn record_task(&mut self, outcome: TaskOutcome) -> TaskHandle {
        let id = self.state.alloc("task");
        self.tasks.insert(id.clone(), outcome);
        TaskHandle(id)
    }
}

/// Inventory backed by in-memory state.
pub struct SimulatedInventory {
    inner: Mutex<Inner>,
}

impl SimulatedInventory {
    pub fn new(state: InventoryState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                ..Default::default()
            }),
        }
    }

    pub fn builder() -> InventoryBuilder {
        InventoryBuilder::new()
    }

    /// Load state from a JSON file.
    pub fn load(path: &Path) -> VcboxResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            VcboxError::Config(format!(
                "Failed to read inventory {}: {}",
                path.display(),
                e
            ))
        })?;
        let state: InventoryState = serde_json::from_str(&data).map_err(|e| {
            VcboxError::Config(format!(
                "Failed to parse inventory {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!(
            path = %path.display(),
            datacenters = state.datacenters.len(),
            "Loaded simulated inventory"
        );
        Ok(Self::new(state))
    }

    /// Write state to a JSON file.
    ///
    /// The file is replaced by rename so concurrent readers never see a
    /// partial write.
    pub fn save(&self, path: &Path) -> VcboxResult<()> {
        let json = serde_json::to_string_pretty(&self.state())?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| {
                VcboxError::Config(format!(
                    "Failed to write inventory {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    pub fn state(&self) -> InventoryState {
        self.inner.lock().state.clone()
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.inner.lock().faults.push_back(fault);
    }

    pub fn reconfigure_calls(&self) -> usize {
        self.inner.lock().reconfigure_calls
    }

    pub fn clone_calls(&self) -> usize {
        self.inner.lock().clone_calls
    }

    pub fn last_clone_spec(&self) -> Option<CloneSpec> {
        self.inner.lock().last_clone_spec.clone()
    }

    /// Replace the guest network snapshot of the machine with `uuid`.
    pub fn set_guest_snapshot(&self, uuid: &str, snapshot: GuestNetworkSnapshot) -> VcboxResult<()> {
        let mut inner = self.inner.lock();
        let vm = inner
            .state
            .datacenters
            .iter_mut()
            .flat_map(|dc| dc.vms.iter_mut())
            .find(|vm| vm.uuid == uuid)
            .ok_or_else(|| VcboxError::NotFound(format!("virtual machine with uuid {}", uuid)))?;
        vm.guest = snapshot;
        Ok(())
    }
}

#[async_trait]
impl Inventory for SimulatedInventory {
    async fn find_datacenter(&self, name: &str) -> VcboxResult<Option<InventoryHandle>> {
        let inner = self.inner.lock();
        Ok(inner
            .state
            .datacenters
            .iter()
            .find(|dc| dc.name == name)
            .map(|dc| InventoryHandle::new(ObjectKind::Datacenter, &dc.id, &dc.name)))
    }

    async fn find_compute_resource(
        &self,
        datacenter: &InventoryHandle,
        name: &str,
    ) -> VcboxResult<Option<ComputeResource>> {
        let inner = self.inner.lock();
        let dc = inner.state.datacenter(datacenter)?;
        Ok(dc
            .compute_resources
            .iter()
            .find(|cr| cr.name == name)
            .map(|cr| ComputeResource {
                handle: InventoryHandle::new(ObjectKind::ComputeResource, &cr.id, &cr.name),
                root_pool: cr.root_pool.handle(),
            }))
    }

    async fn child_resource_pools(
        &self,
        pool: &InventoryHandle,
    ) -> VcboxResult<Vec<InventoryHandle>> {
        let inner = self.inner.lock();
        let pool = inner.state.pool(pool)?;
        Ok(pool.children.iter().map(PoolState::handle).collect())
    }

    async fn root_vm_folder(&self, datacenter: &InventoryHandle) -> VcboxResult<InventoryHandle> {
        let inner = self.inner.lock();
        let dc = inner.state.datacenter(datacenter)?;
        dc.folders
            .iter()
            .find(|f| f.path.is_empty())
            .map(FolderState::handle)
            .ok_or_else(|| {
                VcboxError::Platform(format!("datacenter '{}' has no VM folder", dc.name))
            })
    }

    async fn find_folder(
        &self,
        parent: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<Option<InventoryHandle>> {
        let inner = self.inner.lock();
        let (dc, parent) = inner.state.folder(parent)?;
        let target = join_path(&parent.path, path);
        Ok(inner.state.datacenters[dc]
            .folders
            .iter()
            .find(|f| f.path == target)
            .map(FolderState::handle))
    }

    async fn create_folder(
        &self,
        parent: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<InventoryHandle> {
        let mut inner = self.inner.lock();
        let race = inner
            .take_fault(|f| matches!(f, Fault::FolderCreateRace))
            .is_some();

        let (dc, parent_path) = {
            let (dc, parent) = inner.state.folder(parent)?;
            (dc, parent.path.clone())
        };
        let target = join_path(&parent_path, path);

        if inner.state.datacenters[dc]
            .folders
            .iter()
            .any(|f| f.path == target)
        {
            return Err(VcboxError::AlreadyExists(format!("folder '{}'", target)));
        }

        let mut current = parent_path;
        let mut leaf = None;
        for component in normalize_path(path).split('/') {
            current = join_path(&current, component);
            let existing = inner.state.datacenters[dc]
                .folders
                .iter()
                .find(|f| f.path == current)
                .cloned();
            let folder = match existing {
                Some(folder) => folder,
                None => {
                    let folder = FolderState {
                        id: inner.state.alloc("group-v"),
                        path: current.clone(),
                    };
                    inner.state.datacenters[dc].folders.push(folder.clone());
                    folder
                }
            };
            leaf = Some(folder);
        }

        let leaf = leaf.ok_or_else(|| VcboxError::Platform("empty folder path".into()))?;
        if race {
            // The concurrent writer won; our create call sees its folder.
            return Err(VcboxError::AlreadyExists(format!("folder '{}'", target)));
        }
        Ok(leaf.handle())
    }

    async fn find_network(
        &self,
        datacenter: &InventoryHandle,
        name: &str,
    ) -> VcboxResult<Option<NetworkInfo>> {
        let inner = self.inner.lock();
        let dc = inner.state.datacenter(datacenter)?;
        Ok(dc.networks.iter().find(|n| n.name == name).map(|n| NetworkInfo {
            handle: InventoryHandle::new(ObjectKind::Network, &n.id, &n.name),
            backing: n.backing.clone(),
        }))
    }

    async fn find_vm(
        &self,
        datacenter: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<Option<InventoryHandle>> {
        let inner = self.inner.lock();
        let dc = inner.state.datacenter(datacenter)?;
        let path = normalize_path(path);
        let (folder, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
        Ok(dc
            .vms
            .iter()
            .find(|vm| vm.folder == folder && vm.name == name)
            .map(VmState::handle))
    }

    async fn find_vm_by_uuid(
        &self,
        datacenter: &InventoryHandle,
        uuid: &str,
    ) -> VcboxResult<Option<InventoryHandle>> {
        let inner = self.inner.lock();
        let dc = inner.state.datacenter(datacenter)?;
        Ok(dc.vms.iter().find(|vm| vm.uuid == uuid).map(VmState::handle))
    }

    async fn vm_config(&self, vm: &InventoryHandle) -> VcboxResult<VmConfig> {
        let inner = self.inner.lock();
        Ok(inner.state.vm(vm)?.config())
    }

    async fn reconfigure_vm(
        &self,
        vm: &InventoryHandle,
        spec: &ConfigSpec,
    ) -> VcboxResult<TaskHandle> {
        let mut inner = self.inner.lock();
        inner.reconfigure_calls += 1;

        let (d, v) = inner.state.vm_position(vm.id()).ok_or_else(|| stale(vm))?;
        if let Some(Fault::ReconfigureTask(msg)) =
            inner.take_fault(|f| matches!(f, Fault::ReconfigureTask(_)))
        {
            return Ok(inner.record_task(TaskOutcome::Error(msg)));
        }

        let target = &mut inner.state.datacenters[d].vms[v];
        let mut devices = target.devices.clone();
        let outcome = match apply_device_changes(&mut devices, &spec.device_change, &target.name) {
            Ok(()) => {
                target.devices = devices;
                if let Some(cpus) = spec.num_cpus {
                    target.num_cpus = cpus;
                }
                if let Some(memory) = spec.memory_mb {
                    target.memory_mb = memory;
                }
                TaskOutcome::Success(None)
            }
            Err(msg) => TaskOutcome::Error(msg),
        };
        Ok(inner.record_task(outcome))
    }

    async fn clone_vm(
        &self,
        template: &InventoryHandle,
        folder: &InventoryHandle,
        name: &str,
        spec: &CloneSpec,
    ) -> VcboxResult<TaskHandle> {
        let mut inner = self.inner.lock();
        inner.clone_calls += 1;
        inner.last_clone_spec = Some(spec.clone());

        let source = inner.state.vm(template)?.clone();
        let (dc, folder_path) = {
            let (dc, folder) = inner.state.folder(folder)?;
            (dc, folder.path.clone())
        };
        inner.state.pool(&spec.location.pool)?;

        if let Some(Fault::CloneTask(msg)) = inner.take_fault(|f| matches!(f, Fault::CloneTask(_)))
        {
            return Ok(inner.record_task(TaskOutcome::Error(msg)));
        }

        if inner.state.datacenters[dc]
            .vms
            .iter()
            .any(|vm| vm.folder == folder_path && vm.name == name)
        {
            let msg = format!("The name '{}' already exists.", name);
            return Ok(inner.record_task(TaskOutcome::Error(msg)));
        }

        let mut devices = source.devices.clone();
        let mut num_cpus = source.num_cpus;
        let mut memory_mb = source.memory_mb;
        let built = clone_disks(&mut devices, spec.location.disk_move_type, name).and_then(|()| {
            match &spec.config {
                Some(config) => {
                    num_cpus = config.num_cpus.unwrap_or(num_cpus);
                    memory_mb = config.memory_mb.unwrap_or(memory_mb);
                    apply_device_changes(&mut devices, &config.device_change, name)
                }
                None => Ok(()),
            }
        });
        if let Err(msg) = built {
            return Ok(inner.record_task(TaskOutcome::Error(msg)));
        }

        let vm = VmState {
            id: inner.state.alloc("vm"),
            name: name.to_string(),
            folder: folder_path,
            uuid: uuid::Uuid::new_v4().to_string(),
            num_cpus,
            memory_mb,
            devices,
            guest: GuestNetworkSnapshot::default(),
            pool: Some(spec.location.pool.id().to_string()),
        };
        let handle = vm.handle();

        if inner
            .take_fault(|f| matches!(f, Fault::HideClonedVm))
            .is_none()
        {
            inner.state.datacenters[dc].vms.push(vm);
        }
        Ok(inner.record_task(TaskOutcome::Success(Some(handle))))
    }

    async fn wait_for_task(&self, task: &TaskHandle) -> VcboxResult<TaskOutcome> {
        let mut inner = self.inner.lock();
        inner
            .tasks
            .remove(&task.0)
            .ok_or_else(|| VcboxError::Platform(format!("unknown task {}", task.0)))
    }

    async fn guest_snapshot(&self, vm: &InventoryHandle) -> VcboxResult<GuestNetworkSnapshot> {
        let inner = self.inner.lock();
        Ok(inner.state.vm(vm)?.guest.clone())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Fluent construction of simulated inventories.
///
/// Objects are added to the most recently declared datacenter (and, for
/// pools, the most recently declared compute resource).
///
/// # Example
///
/// ```
/// use vcbox::inventory::SimulatedInventory;
///
/// let inventory = SimulatedInventory::builder()
///     .datacenter("DC1")
///     .compute_resource("Cluster1")
///     .network("VM Network")
///     .template("templates/base", 2)
///     .build();
/// assert_eq!(inventory.clone_calls(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InventoryBuilder {
    state: InventoryState,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datacenter(mut self, name: &str) -> Self {
        let id = self.state.alloc("datacenter");
        let root = FolderState {
            id: self.state.alloc("group-v"),
            path: String::new(),
        };
        self.state.datacenters.push(DatacenterState {
            id,
            name: name.to_string(),
            folders: vec![root],
            compute_resources: Vec::new(),
            networks: Vec::new(),
            vms: Vec::new(),
        });
        self
    }

    pub fn compute_resource(mut self, name: &str) -> Self {
        let id = self.state.alloc("domain-c");
        let pool_id = self.state.alloc("resgroup");
        if let Some(dc) = self.state.datacenters.last_mut() {
            dc.compute_resources.push(ComputeResourceState {
                id,
                name: name.to_string(),
                root_pool: PoolState {
                    id: pool_id,
                    name: "Resources".to_string(),
                    children: Vec::new(),
                },
            });
        }
        self
    }

    /// Child pool of the last compute resource's root pool.
    pub fn resource_pool(mut self, name: &str) -> Self {
        let id = self.state.alloc("resgroup");
        if let Some(cr) = self
            .state
            .datacenters
            .last_mut()
            .and_then(|dc| dc.compute_resources.last_mut())
        {
            cr.root_pool.children.push(PoolState {
                id,
                name: name.to_string(),
                children: Vec::new(),
            });
        }
        self
    }

    /// Folder path below the root VM folder, with intermediate folders.
    pub fn folder(mut self, path: &str) -> Self {
        let mut current = String::new();
        for component in normalize_path(path).split('/').filter(|c| !c.is_empty()) {
            current = join_path(&current, component);
            let exists = self
                .state
                .datacenters
                .last()
                .is_some_and(|dc| dc.folders.iter().any(|f| f.path == current));
            if !exists {
                let id = self.state.alloc("group-v");
                if let Some(dc) = self.state.datacenters.last_mut() {
                    dc.folders.push(FolderState {
                        id,
                        path: current.clone(),
                    });
                }
            }
        }
        self
    }

    pub fn network(self, name: &str) -> Self {
        self.add_network(name, NetworkBacking::Standard)
    }

    pub fn distributed_network(self, name: &str, switch_uuid: &str, portgroup_key: &str) -> Self {
        self.add_network(
            name,
            NetworkBacking::DistributedPortgroup {
                switch_uuid: switch_uuid.to_string(),
                portgroup_key: portgroup_key.to_string(),
            },
        )
    }

    fn add_network(mut self, name: &str, backing: NetworkBacking) -> Self {
        let prefix = match backing {
            NetworkBacking::Standard => "network",
            NetworkBacking::DistributedPortgroup { .. } => "dvportgroup",
        };
        let id = self.state.alloc(prefix);
        if let Some(dc) = self.state.datacenters.last_mut() {
            dc.networks.push(NetworkState {
                id,
                name: name.to_string(),
                backing,
            });
        }
        self
    }

    /// Template at `folder/name` with `disks` monolithic disks, a SCSI
    /// controller, and one e1000 NIC on the datacenter's first network.
    pub fn template(self, path: &str, disks: usize) -> Self {
        let devices = self.template_devices(path, disks);
        self.machine(path, &uuid::Uuid::new_v4().to_string(), devices)
    }

    /// Running machine at `path` with a known UUID and guest snapshot.
    pub fn vm(self, path: &str, uuid: &str, guest: GuestNetworkSnapshot) -> Self {
        let mut builder = self.machine(path, uuid, Vec::new());
        if let Some(vm) = builder
            .state
            .datacenters
            .last_mut()
            .and_then(|dc| dc.vms.last_mut())
        {
            vm.guest = guest;
        }
        builder
    }

    fn template_devices(&self, path: &str, disks: usize) -> Vec<VirtualDevice> {
        let name = leaf_name(path);
        let mut devices = vec![VirtualDevice::Other(GenericDevice {
            key: 1000,
            label: "SCSI controller 0".to_string(),
        })];
        for i in 0..disks {
            let file = if i == 0 {
                format!("[datastore1] {}/{}.vmdk", name, name)
            } else {
                format!("[datastore1] {}/{}_{}.vmdk", name, name, i)
            };
            devices.push(VirtualDevice::Disk(VirtualDisk {
                key: 2000 + i as i32,
                label: format!("Hard disk {}", i + 1),
                controller_key: 1000,
                unit_number: Some(i as i32),
                capacity_kb: 16 * 1024 * 1024,
                backing: DiskBacking::new("datastore1", file),
            }));
        }
        let network = self
            .state
            .datacenters
            .last()
            .and_then(|dc| dc.networks.first());
        if let Some(net) = network {
            let backing = match &net.backing {
                NetworkBacking::Standard => NicBacking::Network {
                    network: InventoryHandle::new(ObjectKind::Network, &net.id, &net.name),
                    device_name: net.name.clone(),
                },
                NetworkBacking::DistributedPortgroup {
                    switch_uuid,
                    portgroup_key,
                } => NicBacking::DistributedPort {
                    switch_uuid: switch_uuid.clone(),
                    portgroup_key: portgroup_key.clone(),
                },
            };
            devices.push(VirtualDevice::Ethernet(VirtualEthernetCard {
                key: 4000,
                adapter: NicAdapter::E1000,
                label: "Network adapter 1".to_string(),
                summary: net.name.clone(),
                backing,
            }));
        }
        devices
    }

    fn machine(mut self, path: &str, uuid: &str, devices: Vec<VirtualDevice>) -> Self {
        let path = normalize_path(path);
        let (folder, name) = match path.rsplit_once('/') {
            Some((folder, name)) => (folder.to_string(), name.to_string()),
            None => (String::new(), path.clone()),
        };
        if !folder.is_empty() {
            self = self.folder(&folder);
        }
        let id = self.state.alloc("vm");
        if let Some(dc) = self.state.datacenters.last_mut() {
            dc.vms.push(VmState {
                id,
                name,
                folder,
                uuid: uuid.to_string(),
                num_cpus: 1,
                memory_mb: 1024,
                devices,
                guest: GuestNetworkSnapshot::default(),
                pool: None,
            });
        }
        self
    }

    pub fn build(self) -> SimulatedInventory {
        SimulatedInventory::new(self.state)
    }

    pub fn into_state(self) -> InventoryState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FileOperation, RelocateSpec};

    fn inventory() -> SimulatedInventory {
        SimulatedInventory::builder()
            .datacenter("DC1")
            .compute_resource("Cluster1")
            .resource_pool("Pool1")
            .network("VM Network")
            .template("templates/base", 2)
            .build()
    }

    async fn dc(inv: &SimulatedInventory) -> InventoryHandle {
        inv.find_datacenter("DC1").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_lookups() {
        let inv = inventory();
        let dc = dc(&inv).await;
        assert!(inv.find_datacenter("DC2").await.unwrap().is_none());

        let cr = inv
            .find_compute_resource(&dc, "Cluster1")
            .await
            .unwrap()
            .unwrap();
        let pools = inv.child_resource_pools(&cr.root_pool).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name(), "Pool1");

        let root = inv.root_vm_folder(&dc).await.unwrap();
        assert_eq!(root.name(), "vm");
        assert!(
            inv.find_folder(&root, "templates")
                .await
                .unwrap()
                .is_some()
        );
        assert!(inv.find_vm(&dc, "templates/base").await.unwrap().is_some());
        assert!(inv.find_vm(&dc, "base").await.unwrap().is_none());
        assert!(inv.find_network(&dc, "VM Network").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_folder_then_conflict() {
        let inv = inventory();
        let dc = dc(&inv).await;
        let root = inv.root_vm_folder(&dc).await.unwrap();

        let created = inv.create_folder(&root, "vagrant/team").await.unwrap();
        assert_eq!(created.name(), "team");
        assert!(inv.find_folder(&root, "vagrant").await.unwrap().is_some());

        let err = inv.create_folder(&root, "vagrant/team").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_folder_race_fault_creates_then_conflicts() {
        let inv = inventory();
        inv.inject_fault(Fault::FolderCreateRace);
        let dc = dc(&inv).await;
        let root = inv.root_vm_folder(&dc).await.unwrap();

        let err = inv.create_folder(&root, "raced").await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(inv.find_folder(&root, "raced").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reconfigure_creates_named_delta() {
        let inv = inventory();
        let dc = dc(&inv).await;
        let vm = inv.find_vm(&dc, "templates/base").await.unwrap().unwrap();
        let config = inv.vm_config(&vm).await.unwrap();
        let disk = config.disks().next().unwrap().clone();

        let mut child = disk.clone();
        child.backing = disk.backing.delta_child();
        let spec = ConfigSpec {
            device_change: vec![
                DeviceConfigSpec::remove(VirtualDevice::Disk(disk.clone())),
                DeviceConfigSpec::create(VirtualDevice::Disk(child)),
            ],
            ..Default::default()
        };
        assert_eq!(spec.device_change[1].file_operation, Some(FileOperation::Create));

        let task = inv.reconfigure_vm(&vm, &spec).await.unwrap();
        assert_eq!(
            inv.wait_for_task(&task).await.unwrap(),
            TaskOutcome::Success(None)
        );

        let config = inv.vm_config(&vm).await.unwrap();
        let converted = config.disks().find(|d| d.key == disk.key).unwrap();
        assert_eq!(
            converted.backing.file_name,
            "[datastore1] base/base-000001.vmdk"
        );
        assert_eq!(converted.backing.parent.as_deref(), Some(&disk.backing));
    }

    #[tokio::test]
    async fn test_linked_clone_of_monolithic_template_fails() {
        let inv = inventory();
        let dc = dc(&inv).await;
        let template = inv.find_vm(&dc, "templates/base").await.unwrap().unwrap();
        let root = inv.root_vm_folder(&dc).await.unwrap();
        let cr = inv
            .find_compute_resource(&dc, "Cluster1")
            .await
            .unwrap()
            .unwrap();

        let spec = CloneSpec {
            location: RelocateSpec {
                pool: cr.root_pool,
                disk_move_type: Some(DiskMoveType::MoveChildMostDiskBacking),
            },
            power_on: false,
            template: false,
            config: None,
            customization: None,
        };
        let task = inv.clone_vm(&template, &root, "web01", &spec).await.unwrap();
        let outcome = inv.wait_for_task(&task).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Error(msg) if msg.contains("requires delta disks")));
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let inv = inventory();
        let err = inv
            .wait_for_task(&TaskHandle("task-999".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, VcboxError::Platform(_)));
    }

    #[test]
    fn test_state_roundtrip() {
        let state = SimulatedInventory::builder()
            .datacenter("DC1")
            .compute_resource("Cluster1")
            .template("base", 1)
            .into_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: InventoryState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.datacenters.len(), 1);
        assert_eq!(back.datacenters[0].vms[0].name, "base");
        assert_eq!(back.next_id, state.next_id);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(normalize_path("/a//b/"), "a/b");
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b/c"), "a/b/c");
        assert_eq!(leaf_name("a/b/c"), "c");
    }
}
