//! Shared fixtures for vcbox integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use vcbox::inventory::{InventoryBuilder, InventoryState, SimulatedInventory};
use vcbox::provision::NamingContext;
use vcbox::types::PlacementNames;
use vcbox::{Provisioner, ProvisioningRequest};

pub const DATACENTER: &str = "DC1";
pub const COMPUTE_RESOURCE: &str = "Cluster1";
pub const POOL: &str = "Pool1";
pub const STANDARD_NETWORK: &str = "VM Network";
pub const PROD_NETWORK: &str = "eth-prod";
pub const DISTRIBUTED_NETWORK: &str = "dv-prod";
pub const SWITCH_UUID: &str = "50 1a 2b 3c";
pub const PORTGROUP_KEY: &str = "dvportgroup-31";

/// DC1 with one cluster, one child pool, three networks, a root-level
/// template `base` with two disks and `templates/org-base` with one.
pub fn inventory_builder() -> InventoryBuilder {
    SimulatedInventory::builder()
        .datacenter(DATACENTER)
        .compute_resource(COMPUTE_RESOURCE)
        .resource_pool(POOL)
        .network(STANDARD_NETWORK)
        .network(PROD_NETWORK)
        .distributed_network(DISTRIBUTED_NETWORK, SWITCH_UUID, PORTGROUP_KEY)
        .template("base", 2)
        .template("templates/org-base", 1)
}

pub fn inventory() -> Arc<SimulatedInventory> {
    Arc::new(inventory_builder().build())
}

pub fn placement() -> PlacementNames {
    PlacementNames {
        datacenter: DATACENTER.to_string(),
        compute_resource: COMPUTE_RESOURCE.to_string(),
        ..Default::default()
    }
}

/// Full clone of `template` named `machine`, no customization.
pub fn request(template: &str, machine: &str) -> ProvisioningRequest {
    ProvisioningRequest::new(template, machine, placement())
}

pub fn naming() -> NamingContext {
    NamingContext::new("tester", "Build-Host")
}

/// Provisioner over `inventory` with fixed naming inputs.
pub fn provisioner(inventory: &Arc<SimulatedInventory>) -> Provisioner {
    Provisioner::new(inventory.clone()).with_naming(naming())
}

/// Temporary directory holding an inventory state file and provider options.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(state: &InventoryState) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let json = serde_json::to_string_pretty(state).expect("Failed to serialize state");
        std::fs::write(dir.path().join("inventory.json"), json).expect("Failed to write state");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.dir.path().join("inventory.json")
    }

    /// Write provider options under `name` and return the path.
    pub fn write_options(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write options");
        path
    }

    /// Reload the state the CLI persisted.
    pub fn load_inventory(&self) -> SimulatedInventory {
        SimulatedInventory::load(&self.inventory_path()).expect("Failed to load state")
    }
}
