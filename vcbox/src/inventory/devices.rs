//! Virtual hardware devices as seen in a machine's configuration.

use serde::{Deserialize, Serialize};

use super::InventoryHandle;

/// A device attached to a virtual machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device", rename_all = "snake_case")]
pub enum VirtualDevice {
    Disk(VirtualDisk),
    Ethernet(VirtualEthernetCard),
    /// Controllers, CD-ROMs and everything else the workflow leaves alone.
    Other(GenericDevice),
}

impl VirtualDevice {
    pub fn key(&self) -> i32 {
        match self {
            VirtualDevice::Disk(d) => d.key,
            VirtualDevice::Ethernet(n) => n.key,
            VirtualDevice::Other(o) => o.key,
        }
    }

    pub fn set_key(&mut self, key: i32) {
        match self {
            VirtualDevice::Disk(d) => d.key = key,
            VirtualDevice::Ethernet(n) => n.key = key,
            VirtualDevice::Other(o) => o.key = key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericDevice {
    pub key: i32,
    pub label: String,
}

/// A virtual disk and its backing file chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirtualDisk {
    pub key: i32,
    pub label: String,
    pub controller_key: i32,
    #[serde(default)]
    pub unit_number: Option<i32>,
    pub capacity_kb: u64,
    pub backing: DiskBacking,
}

/// Whether a disk has a parent backing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskBackingState {
    /// No parent; the disk holds all of its data.
    Monolithic,
    /// Child of a read-only parent backing.
    Delta,
}

/// Flat file backing of a virtual disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskBacking {
    /// Datastore path, e.g. `[datastore1] base/base.vmdk`. A bare `[datastore1]`
    /// asks the platform to pick the file name on creation.
    pub file_name: String,
    pub datastore: String,
    #[serde(default = "default_disk_mode")]
    pub disk_mode: String,
    #[serde(default)]
    pub thin_provisioned: bool,
    #[serde(default)]
    pub parent: Option<Box<DiskBacking>>,
}

fn default_disk_mode() -> String {
    "persistent".to_string()
}

impl DiskBacking {
    pub fn new(datastore: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            datastore: datastore.into(),
            disk_mode: default_disk_mode(),
            thin_provisioned: false,
            parent: None,
        }
    }

    pub fn state(&self) -> DiskBackingState {
        if self.parent.is_some() {
            DiskBackingState::Delta
        } else {
            DiskBackingState::Monolithic
        }
    }

    /// Backing for a new child disk in the same datastore whose parent is `self`.
    pub fn delta_child(&self) -> DiskBacking {
        DiskBacking {
            file_name: format!("[{}]", self.datastore),
            datastore: self.datastore.clone(),
            disk_mode: self.disk_mode.clone(),
            thin_provisioned: self.thin_provisioned,
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Number of backings in the chain, including `self`.
    pub fn chain_len(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.chain_len())
    }
}

/// Virtual NIC adapter model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NicAdapter {
    Vmxnet3,
    E1000,
    E1000e,
}

/// A virtual network adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirtualEthernetCard {
    pub key: i32,
    pub adapter: NicAdapter,
    pub label: String,
    pub summary: String,
    pub backing: NicBacking,
}

/// What a virtual NIC is plugged into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NicBacking {
    /// Direct reference to a standard network.
    Network {
        network: InventoryHandle,
        device_name: String,
    },
    /// Port on a distributed virtual switch.
    DistributedPort {
        switch_uuid: String,
        portgroup_key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_child_points_at_original() {
        let base = DiskBacking::new("datastore1", "[datastore1] base/base.vmdk");
        assert_eq!(base.state(), DiskBackingState::Monolithic);

        let child = base.delta_child();
        assert_eq!(child.state(), DiskBackingState::Delta);
        assert_eq!(child.file_name, "[datastore1]");
        assert_eq!(child.datastore, "datastore1");
        assert_eq!(child.parent.as_deref(), Some(&base));
        assert_eq!(child.chain_len(), 2);
    }

    #[test]
    fn test_device_key_roundtrip() {
        let mut dev = VirtualDevice::Other(GenericDevice {
            key: 1000,
            label: "SCSI controller 0".into(),
        });
        dev.set_key(1001);
        assert_eq!(dev.key(), 1001);
    }

    #[test]
    fn test_disk_mode_default_on_deserialize() {
        let json = r#"{"file_name":"[ds] a.vmdk","datastore":"ds"}"#;
        let backing: DiskBacking = serde_json::from_str(json).unwrap();
        assert_eq!(backing.disk_mode, "persistent");
        assert!(backing.parent.is_none());
    }
}
