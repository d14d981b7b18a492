//! Clone spec construction.
//!
//! The builder starts from a base spec (no power-on, not a template) and
//! applies three steps in a fixed order:
//!
//! ```text
//! relocation ──→ hardware ──→ customization
//! ```
//!
//! Each step is a pure function of its inputs. Anything that needs the
//! platform (pool lookup, network lookup, reading the template's NICs) is
//! resolved before the builder runs, so building never touches the inventory.

use vcbox_shared::constants::nic::NEW_DEVICE_KEY;
use vcbox_shared::errors::VcboxResult;

use super::{CloneSpec, ConfigSpec, DeviceConfigSpec, DiskMoveType, RelocateSpec, customization};
use crate::inventory::{
    InventoryHandle, NicAdapter, NicBacking, VirtualDevice, VirtualEthernetCard,
};
use crate::types::{CloneMode, CustomizationRequest, HardwareOverrides};

/// A requested network attachment after lookup in the datacenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub name: String,
    pub backing: NicBacking,
}

/// Builds a [`CloneSpec`] step by step.
///
/// # Example
///
/// ```ignore
/// let spec = CloneSpecBuilder::new(pool)
///     .relocation(CloneMode::Linked)
///     .hardware(&overrides, template_nic, &networks)
///     .customization(request.customization.as_ref(), &networks)?
///     .build();
/// ```
#[derive(Debug)]
pub struct CloneSpecBuilder {
    spec: CloneSpec,
}

impl CloneSpecBuilder {
    pub fn new(pool: InventoryHandle) -> Self {
        Self {
            spec: CloneSpec {
                location: RelocateSpec {
                    pool,
                    disk_move_type: None,
                },
                power_on: false,
                template: false,
                config: None,
                customization: None,
            },
        }
    }

    /// Step 1: relocation policy.
    pub fn relocation(mut self, mode: CloneMode) -> Self {
        self.spec.location = relocate_spec(self.spec.location.pool.clone(), mode);
        self
    }

    /// Step 2: hardware override block.
    pub fn hardware(
        mut self,
        overrides: &HardwareOverrides,
        template_nic: Option<&VirtualEthernetCard>,
        networks: &[ResolvedNetwork],
    ) -> Self {
        self.spec.config = config_spec(overrides, template_nic, networks);
        self
    }

    /// Step 3: guest customization block.
    pub fn customization(
        mut self,
        request: Option<&CustomizationRequest>,
        networks: &[ResolvedNetwork],
    ) -> VcboxResult<Self> {
        let names: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
        self.spec.customization = request
            .map(|req| customization::build(req, &names))
            .transpose()?;
        Ok(self)
    }

    pub fn build(self) -> CloneSpec {
        self.spec
    }
}

/// Linked clones share the template's base disks and move only the child-most
/// delta, which requires every template disk to already be delta-backed.
pub fn relocate_spec(pool: InventoryHandle, mode: CloneMode) -> RelocateSpec {
    let disk_move_type = match mode {
        CloneMode::Full => None,
        CloneMode::Linked => Some(DiskMoveType::MoveChildMostDiskBacking),
    };
    RelocateSpec {
        pool,
        disk_move_type,
    }
}

/// Hardware changes on top of the template, or `None` when nothing was asked.
///
/// Requested networks replace the template's first NIC: it is removed and one
/// vmxnet3 adapter per network is added.
pub fn config_spec(
    overrides: &HardwareOverrides,
    template_nic: Option<&VirtualEthernetCard>,
    networks: &[ResolvedNetwork],
) -> Option<ConfigSpec> {
    if overrides.num_cpus.is_none() && overrides.memory_mb.is_none() && networks.is_empty() {
        return None;
    }

    let mut device_change = Vec::new();
    if !networks.is_empty() {
        if let Some(nic) = template_nic {
            device_change.push(DeviceConfigSpec::remove(VirtualDevice::Ethernet(nic.clone())));
        }
        device_change.extend(
            networks
                .iter()
                .map(|net| DeviceConfigSpec::add(VirtualDevice::Ethernet(new_nic(net)))),
        );
    }

    Some(ConfigSpec {
        num_cpus: overrides.num_cpus,
        memory_mb: overrides.memory_mb,
        device_change,
    })
}

fn new_nic(network: &ResolvedNetwork) -> VirtualEthernetCard {
    VirtualEthernetCard {
        key: NEW_DEVICE_KEY,
        adapter: NicAdapter::Vmxnet3,
        label: network.name.clone(),
        summary: network.name.clone(),
        backing: network.backing.clone(),
    }
}
