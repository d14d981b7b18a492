//! Delta disk preparation for linked clones.
//!
//! A linked clone shares the template's disks read-only, so every template
//! disk must already sit on top of a parent backing. Monolithic disks are
//! converted in place, one reconfigure task per disk:
//!
//! ```text
//! [ds] base/base.vmdk            [ds] base/base.vmdk   (read-only parent)
//!                         ──→            ▲
//!                                [ds] base/base-000001.vmdk
//! ```
//!
//! Converted disks stay delta-backed, so a second run issues no tasks. There
//! is no rollback: a run that fails halfway leaves the converted disks in
//! place and the next run skips them. Two processes converting the same
//! template at once are not guarded against.

use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::inventory::{
    DiskBackingState, Inventory, InventoryHandle, TaskOutcome, VirtualDevice, VirtualDisk,
    VmConfig,
};
use crate::spec::{ConfigSpec, DeviceConfigSpec};

/// Disks touched by a preparation run, by device key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaReport {
    pub converted: Vec<i32>,
    pub already_delta: Vec<i32>,
}

/// Disks that still need a delta child.
pub fn pending_disks(config: &VmConfig) -> Vec<&VirtualDisk> {
    config
        .disks()
        .filter(|d| d.backing.state() == DiskBackingState::Monolithic)
        .collect()
}

/// Reconfiguration that swaps `disk` for a child whose parent is its backing.
pub fn conversion_spec(disk: &VirtualDisk) -> ConfigSpec {
    let mut child = disk.clone();
    child.backing = disk.backing.delta_child();
    ConfigSpec {
        device_change: vec![
            DeviceConfigSpec::remove(VirtualDevice::Disk(disk.clone())),
            DeviceConfigSpec::create(VirtualDevice::Disk(child)),
        ],
        ..Default::default()
    }
}

pub struct DeltaDiskPreparer<'a> {
    inventory: &'a dyn Inventory,
}

impl<'a> DeltaDiskPreparer<'a> {
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self { inventory }
    }

    /// Convert every monolithic disk of `template`, waiting for each task.
    pub async fn prepare(&self, template: &InventoryHandle) -> VcboxResult<DeltaReport> {
        let config = self.inventory.vm_config(template).await?;
        let mut report = DeltaReport::default();

        for disk in config.disks() {
            if disk.backing.state() == DiskBackingState::Delta {
                tracing::debug!(template = %template, disk_key = disk.key, "Disk already delta-backed");
                report.already_delta.push(disk.key);
                continue;
            }

            tracing::info!(
                template = %template,
                disk_key = disk.key,
                file = %disk.backing.file_name,
                "Converting template disk to delta backing"
            );

            let task = self
                .inventory
                .reconfigure_vm(template, &conversion_spec(disk))
                .await?;
            match self.inventory.wait_for_task(&task).await? {
                TaskOutcome::Success(_) => report.converted.push(disk.key),
                TaskOutcome::Error(diagnostic) => {
                    return Err(VcboxError::CloneFailed(format!(
                        "converting disk {} of {} to delta: {}",
                        disk.key, template, diagnostic
                    )));
                }
            }
        }

        Ok(report)
    }
}
