//! Clone request payload.
//!
//! [`CloneSpec`] is the nested object submitted with a clone task: where the
//! new machine lands, which hardware changes apply on top of the template,
//! and how the guest OS is customized on first boot. The shape depends on
//! many optional inputs, so it is produced by [`CloneSpecBuilder`] through a
//! fixed sequence of pure steps (see [`builder`]).

use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryHandle, VirtualDevice};

pub mod builder;
pub mod customization;

pub use builder::{CloneSpecBuilder, ResolvedNetwork};

/// Complete clone request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloneSpec {
    pub location: RelocateSpec,
    pub power_on: bool,
    /// Whether the clone is marked as a template.
    pub template: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<CustomizationSpec>,
}

/// Placement and storage policy of the clone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelocateSpec {
    pub pool: InventoryHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_move_type: Option<DiskMoveType>,
}

/// How disk backings are handled when cloning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskMoveType {
    /// Share the parent backings, move only the child-most delta.
    #[serde(rename = "moveChildMostDiskBacking")]
    MoveChildMostDiskBacking,
}

impl DiskMoveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskMoveType::MoveChildMostDiskBacking => "moveChildMostDiskBacking",
        }
    }
}

/// Hardware changes, used both as the clone's config block and as a
/// standalone reconfigure request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_change: Vec<DeviceConfigSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfigSpec {
    pub operation: DeviceOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_operation: Option<FileOperation>,
    pub device: VirtualDevice,
}

impl DeviceConfigSpec {
    pub fn add(device: VirtualDevice) -> Self {
        Self {
            operation: DeviceOperation::Add,
            file_operation: None,
            device,
        }
    }

    pub fn remove(device: VirtualDevice) -> Self {
        Self {
            operation: DeviceOperation::Remove,
            file_operation: None,
            device,
        }
    }

    /// Add a device whose backing file the platform creates.
    pub fn create(device: VirtualDevice) -> Self {
        Self {
            operation: DeviceOperation::Add,
            file_operation: Some(FileOperation::Create),
            device,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOperation {
    Add,
    Remove,
    Edit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Destroy,
    Replace,
}

/// Guest customization applied on first boot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomizationSpec {
    pub global_ip_settings: GlobalIpSettings,
    pub identity: Identity,
    /// One mapping per virtual NIC, in device order.
    pub nic_setting_map: Vec<AdapterMapping>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalIpSettings {
    pub dns_server_list: Vec<String>,
    pub dns_suffix_list: Vec<String>,
}

/// OS-specific identity block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    Linux(LinuxPrep),
    Windows(Sysprep),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxPrep {
    pub domain: String,
    pub host_name: String,
}

/// Unattended Windows setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sysprep {
    pub gui_unattended: GuiUnattended,
    pub identification: Identification,
    pub user_data: UserData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuiUnattended {
    pub auto_logon: bool,
    pub auto_logon_count: i32,
    pub time_zone: i32,
}

/// Workgroup/domain membership. Empty means the platform defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_workgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_domain: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub computer_name: String,
    pub full_name: String,
    pub org_name: String,
    pub product_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMapping {
    pub adapter: IpSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSettings {
    pub ip: IpGenerator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateway: Vec<String>,
}

impl IpSettings {
    pub fn dhcp() -> Self {
        Self {
            ip: IpGenerator::Dhcp,
            subnet_mask: None,
            gateway: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpGenerator {
    Dhcp,
    Fixed { ip_address: String },
}
