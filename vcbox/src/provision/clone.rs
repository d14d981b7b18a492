//! Clone submission and post-clone identity lookup.

use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::inventory::{Inventory, InventoryHandle, TaskOutcome};
use crate::spec::CloneSpec;
use crate::types::{CloneOutcome, MachineUuid};

/// Inventory path of a machine: `folder/name`, or `name` at the root.
pub fn machine_path(folder: Option<&str>, name: &str) -> String {
    match folder.map(|f| f.trim_matches('/')) {
        Some(folder) if !folder.is_empty() => format!("{}/{}", folder, name),
        _ => name.to_string(),
    }
}

/// Where the clone goes.
#[derive(Clone, Debug)]
pub struct CloneTarget<'a> {
    pub datacenter: &'a InventoryHandle,
    pub folder: &'a InventoryHandle,
    /// Folder path as configured, used to find the machine afterwards.
    pub folder_path: Option<&'a str>,
    pub name: &'a str,
}

pub struct CloneExecutor<'a> {
    inventory: &'a dyn Inventory,
}

impl<'a> CloneExecutor<'a> {
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self { inventory }
    }

    /// Submit the clone, wait for it, and read the new machine's UUID.
    ///
    /// Failures are not retried here; a blind retry could leave two machines.
    pub async fn execute(
        &self,
        template: &InventoryHandle,
        target: &CloneTarget<'_>,
        spec: &CloneSpec,
    ) -> VcboxResult<CloneOutcome> {
        tracing::info!(template = %template, name = %target.name, "Submitting clone");

        let task = self
            .inventory
            .clone_vm(template, target.folder, target.name, spec)
            .await?;
        if let TaskOutcome::Error(diagnostic) = self.inventory.wait_for_task(&task).await? {
            return Err(VcboxError::CloneFailed(format!(
                "cloning {} to '{}': {}",
                template, target.name, diagnostic
            )));
        }

        let path = machine_path(target.folder_path, target.name);
        let vm = self
            .inventory
            .find_vm(target.datacenter, &path)
            .await?
            .ok_or_else(|| {
                VcboxError::NotFound(format!(
                    "virtual machine '{}' after clone completed",
                    path
                ))
            })?;
        let config = self.inventory.vm_config(&vm).await?;

        tracing::info!(path = %path, uuid = %config.uuid, "Clone completed");

        Ok(CloneOutcome {
            uuid: MachineUuid::new(config.uuid),
            name: target.name.to_string(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_path() {
        assert_eq!(machine_path(None, "web01"), "web01");
        assert_eq!(machine_path(Some(""), "web01"), "web01");
        assert_eq!(machine_path(Some("vagrant/team"), "web01"), "vagrant/team/web01");
        assert_eq!(machine_path(Some("/vagrant/"), "web01"), "vagrant/web01");
    }
}
