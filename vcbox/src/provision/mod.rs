//! Provisioning workflow.
//!
//! ## Architecture
//!
//! A provisioning run executes these stages once, in order:
//!
//! ```text
//! 1. Placement ──→ 2. Networks ──→ 3. Folder ──→ 4. DeltaDisks ──→ 5. CloneSpec ──→ 6. Clone
//!                                                (linked only)
//! ```
//!
//! Each stage is a function with typed input/output. Stages 1 and 2 only read
//! the inventory, and the customization block is checked right after them, so
//! a request that cannot be built fails before anything is created or
//! converted. Any error aborts the run; nothing is rolled back and nothing is
//! retried. Guest address
//! resolution is separate and runs whenever remote access info is asked for.

pub mod clone;
pub mod delta;
pub mod naming;
pub mod network;
pub mod placement;

pub use clone::{CloneExecutor, CloneTarget, machine_path};
pub use delta::{DeltaDiskPreparer, DeltaReport};
pub use naming::{NamingContext, target_name};
pub use network::resolve_networks;
pub use placement::{FolderOutcome, Placement, PlacementResolver, template_path};

use serde::Serialize;
use std::sync::Arc;
use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::guest::{GuestAddressResolver, PrimaryInterface};
use crate::inventory::Inventory;
use crate::spec::{CloneSpec, CloneSpecBuilder, ResolvedNetwork};
use crate::types::{CloneMode, CloneOutcome, MachineUuid, ProvisioningRequest, SshInfo};

/// What a run would do, computed without changing the inventory.
#[derive(Clone, Debug, Serialize)]
pub struct ProvisioningPlan {
    pub template_path: String,
    /// Destination folder path, `None` for the root VM folder.
    pub folder: Option<String>,
    /// Whether the destination folder has to be created.
    pub creates_folder: bool,
    /// Backing files of template disks that need a delta child first.
    pub disk_conversions: Vec<String>,
    /// Target name. Auto-generated names get a fresh suffix on the real run.
    pub target_name: String,
    pub clone_spec: CloneSpec,
}

/// Runs provisioning against an [`Inventory`].
pub struct Provisioner {
    inventory: Arc<dyn Inventory>,
    naming: NamingContext,
}

impl Provisioner {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self {
            inventory,
            naming: NamingContext::from_environment(),
        }
    }

    /// Use a fixed user/hostname for auto-generated names.
    pub fn with_naming(mut self, naming: NamingContext) -> Self {
        self.naming = naming;
        self
    }

    /// Clone the template described by `request` and return its identity.
    pub async fn provision(&self, request: &ProvisioningRequest) -> VcboxResult<CloneOutcome> {
        let inventory = self.inventory.as_ref();
        let resolver = PlacementResolver::new(inventory);

        // Stage 1: placement
        let placement = resolver.resolve(&request.placement, &request.template).await?;

        // Stage 2: networks
        let networks =
            resolve_networks(inventory, &placement.datacenter, &request.networks).await?;
        check_customization(request, &networks)?;

        // Stage 3: destination folder
        let folder = resolver
            .folder(&placement.datacenter, request.placement.folder.as_deref())
            .await?;

        // Stage 4: delta disks
        if request.clone_mode == CloneMode::Linked {
            let report = DeltaDiskPreparer::new(inventory)
                .prepare(&placement.template)
                .await?;
            tracing::info!(
                converted = report.converted.len(),
                already_delta = report.already_delta.len(),
                "Template disks prepared for linked clone"
            );
        }

        // Stage 5: spec
        let spec = self.clone_spec(request, &placement, &networks).await?;

        // Stage 6: clone
        let name = target_name(&self.naming, &request.machine_name, request.auto_name);
        let target = CloneTarget {
            datacenter: &placement.datacenter,
            folder: folder.handle(),
            folder_path: request.placement.folder.as_deref(),
            name: &name,
        };
        CloneExecutor::new(inventory)
            .execute(&placement.template, &target, &spec)
            .await
    }

    /// Resolve and build everything a run would submit, without side effects.
    pub async fn plan(&self, request: &ProvisioningRequest) -> VcboxResult<ProvisioningPlan> {
        let inventory = self.inventory.as_ref();
        let placement = PlacementResolver::new(inventory)
            .resolve(&request.placement, &request.template)
            .await?;

        let folder = request
            .placement
            .folder
            .as_deref()
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let creates_folder = match &folder {
            Some(path) => {
                let root = inventory.root_vm_folder(&placement.datacenter).await?;
                inventory.find_folder(&root, path).await?.is_none()
            }
            None => false,
        };

        let disk_conversions = if request.clone_mode == CloneMode::Linked {
            let config = inventory.vm_config(&placement.template).await?;
            delta::pending_disks(&config)
                .into_iter()
                .map(|d| d.backing.file_name.clone())
                .collect()
        } else {
            Vec::new()
        };

        let networks =
            resolve_networks(inventory, &placement.datacenter, &request.networks).await?;
        let clone_spec = self.clone_spec(request, &placement, &networks).await?;

        Ok(ProvisioningPlan {
            template_path: placement.template_path,
            folder,
            creates_folder,
            disk_conversions,
            target_name: target_name(&self.naming, &request.machine_name, request.auto_name),
            clone_spec,
        })
    }

    async fn clone_spec(
        &self,
        request: &ProvisioningRequest,
        placement: &Placement,
        networks: &[ResolvedNetwork],
    ) -> VcboxResult<CloneSpec> {
        let template_config = self.inventory.vm_config(&placement.template).await?;
        let spec = CloneSpecBuilder::new(placement.pool.clone())
            .relocation(request.clone_mode)
            .hardware(&request.hardware, template_config.first_nic(), networks)
            .customization(request.customization.as_ref(), networks)?
            .build();
        Ok(spec)
    }

    /// Remote access endpoint of the machine provisioned from `request`.
    ///
    /// `Ok(None)` when there is no id yet or the guest has not reported an
    /// address; callers poll.
    pub async fn read_ssh_info(
        &self,
        request: &ProvisioningRequest,
        uuid: Option<&MachineUuid>,
    ) -> VcboxResult<Option<SshInfo>> {
        let Some(uuid) = uuid else {
            return Ok(None);
        };
        let primary = PrimaryInterface::from_request(request);
        self.ssh_info(&request.placement.datacenter, &primary, uuid)
            .await
    }

    /// Remote access endpoint of machine `uuid` in `datacenter`.
    ///
    /// The datacenter is resolved again on each call.
    pub async fn ssh_info(
        &self,
        datacenter: &str,
        primary: &PrimaryInterface,
        uuid: &MachineUuid,
    ) -> VcboxResult<Option<SshInfo>> {
        let inventory = self.inventory.as_ref();
        let datacenter = PlacementResolver::new(inventory)
            .datacenter(datacenter)
            .await?;
        let vm = inventory
            .find_vm_by_uuid(&datacenter, uuid.as_str())
            .await?
            .ok_or_else(|| VcboxError::NotFound(format!("virtual machine with uuid {}", uuid)))?;

        let address = GuestAddressResolver::new(inventory)
            .resolve(&vm, primary)
            .await?;
        Ok(address.map(SshInfo::new))
    }
}

/// Build the customization block alone so invalid assignments or prep types
/// fail before the inventory is changed.
fn check_customization(
    request: &ProvisioningRequest,
    networks: &[ResolvedNetwork],
) -> VcboxResult<()> {
    if let Some(customization) = &request.customization {
        let names: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
        crate::spec::customization::build(customization, &names)?;
    }
    Ok(())
}
