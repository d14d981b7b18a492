//! Provisioning inputs and outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vcbox_shared::constants::ssh;
use vcbox_shared::errors::VcboxError;

// ============================================================================
// REQUEST
// ============================================================================

/// Full or linked clone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneMode {
    /// Independent copy of every template disk.
    #[default]
    Full,
    /// Private delta disks on top of the template's read-only base disks.
    Linked,
}

/// How a requested NIC binds to its network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Direct network reference.
    #[default]
    Standard,
    /// Port on a distributed virtual switch.
    DistributedPort,
}

/// A NIC to attach to the clone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    /// Network name in the datacenter.
    pub name: String,
    #[serde(default)]
    pub kind: AdapterKind,
}

impl NetworkAttachment {
    pub fn new(name: impl Into<String>, kind: AdapterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Names used to place the clone in the inventory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementNames {
    pub datacenter: String,
    pub compute_resource: String,
    /// Child pool of the compute resource's root pool. `None` means the root.
    #[serde(default)]
    pub resource_pool: Option<String>,
    /// Destination folder path below the root VM folder, created on demand.
    #[serde(default)]
    pub folder: Option<String>,
    /// Folder holding templates.
    #[serde(default)]
    pub template_folder: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareOverrides {
    #[serde(default)]
    pub num_cpus: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
}

/// Static or DHCP configuration for one guest interface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAssignment {
    /// Network name of the interface this assignment targets.
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub dns_suffixes: Vec<String>,
}

impl NetworkAssignment {
    /// Assignment that leaves addressing to DHCP.
    pub fn dhcp() -> Self {
        Self::default()
    }

    /// Static address assignment.
    pub fn fixed(ip: impl Into<String>, netmask: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            netmask: Some(netmask.into()),
            ..Default::default()
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// True when neither an address nor a netmask is given.
    pub fn is_dhcp(&self) -> bool {
        self.ip.is_none() && self.netmask.is_none()
    }

    fn has_dns(&self) -> bool {
        !self.dns_servers.is_empty() || !self.dns_suffixes.is_empty()
    }
}

/// Guest OS family of the customization identity block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl FromStr for OsFamily {
    type Err = VcboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "windows" => Ok(OsFamily::Windows),
            _ => Err(VcboxError::UnsupportedPrepType(format!(
                "'{}'. Supported: linux, windows",
                s
            ))),
        }
    }
}

/// Guest customization requested for the clone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationRequest {
    /// OS family name, parsed when the clone request is built.
    pub prep_type: String,
    /// Target hostname, possibly fully qualified.
    pub hostname: String,
    #[serde(default)]
    pub assignments: Vec<NetworkAssignment>,
    /// Windows product key.
    #[serde(default)]
    pub product_key: Option<String>,
}

impl CustomizationRequest {
    pub fn new(prep_type: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            prep_type: prep_type.into(),
            hostname: hostname.into(),
            assignments: Vec::new(),
            product_key: None,
        }
    }

    pub fn os_family(&self) -> Result<OsFamily, VcboxError> {
        self.prep_type.parse()
    }

    /// DNS settings of the last assignment that declares any.
    pub fn dns(&self) -> (Vec<String>, Vec<String>) {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.has_dns())
            .map(|a| (a.dns_servers.clone(), a.dns_suffixes.clone()))
            .unwrap_or_default()
    }
}

/// Immutable input of one provisioning run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// Box identifier the template name is derived from (e.g. `org/base`).
    pub template: String,
    /// Logical machine name.
    pub machine_name: String,
    pub placement: PlacementNames,
    #[serde(default)]
    pub clone_mode: CloneMode,
    #[serde(default)]
    pub hardware: HardwareOverrides,
    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default)]
    pub customization: Option<CustomizationRequest>,
    /// Synthesize a collision-free target name instead of using `machine_name`.
    #[serde(default = "default_auto_name")]
    pub auto_name: bool,
    /// Network whose address is authoritative for remote access.
    #[serde(default)]
    pub primary_network: Option<String>,
}

fn default_auto_name() -> bool {
    true
}

impl ProvisioningRequest {
    pub fn new(
        template: impl Into<String>,
        machine_name: impl Into<String>,
        placement: PlacementNames,
    ) -> Self {
        Self {
            template: template.into(),
            machine_name: machine_name.into(),
            placement,
            clone_mode: CloneMode::Full,
            hardware: HardwareOverrides::default(),
            networks: Vec::new(),
            customization: None,
            auto_name: default_auto_name(),
            primary_network: None,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Platform-assigned durable machine identity.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineUuid(String);

impl MachineUuid {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MachineUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineUuid({})", self.0)
    }
}

impl AsRef<str> for MachineUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Result of a successful clone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOutcome {
    /// The only value a caller must keep across restarts.
    pub uuid: MachineUuid,
    /// Machine name in the inventory.
    pub name: String,
    /// `folder/name`, or just `name` without a destination folder.
    pub path: String,
}

/// Remote access endpoint of a provisioned machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshInfo {
    pub host: String,
    pub port: u16,
}

impl SshInfo {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: ssh::PORT,
        }
    }
}

impl fmt::Display for SshInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_family_parse_is_case_insensitive() {
        assert_eq!("Linux".parse::<OsFamily>().unwrap(), OsFamily::Linux);
        assert_eq!("WINDOWS".parse::<OsFamily>().unwrap(), OsFamily::Windows);
    }

    #[test]
    fn test_os_family_rejects_other_values() {
        let err = "solaris".parse::<OsFamily>().unwrap_err();
        assert!(matches!(err, VcboxError::UnsupportedPrepType(_)));
        assert!(err.to_string().contains("solaris"));
    }

    #[test]
    fn test_assignment_dhcp_detection() {
        assert!(NetworkAssignment::dhcp().is_dhcp());
        assert!(!NetworkAssignment::fixed("10.0.0.5", "255.255.255.0").is_dhcp());
        let half = NetworkAssignment {
            netmask: Some("255.0.0.0".into()),
            ..Default::default()
        };
        assert!(!half.is_dhcp());
    }

    #[test]
    fn test_dns_comes_from_last_declaring_assignment() {
        let mut req = CustomizationRequest::new("linux", "web01");
        req.assignments.push(NetworkAssignment {
            dns_servers: vec!["10.0.0.1".into()],
            ..Default::default()
        });
        req.assignments.push(NetworkAssignment {
            dns_servers: vec!["10.1.0.1".into()],
            dns_suffixes: vec!["corp.local".into()],
            ..Default::default()
        });
        req.assignments.push(NetworkAssignment::dhcp());

        let (servers, suffixes) = req.dns();
        assert_eq!(servers, vec!["10.1.0.1".to_string()]);
        assert_eq!(suffixes, vec!["corp.local".to_string()]);
    }

    #[test]
    fn test_request_serde_defaults() {
        let json = r#"{
            "template": "base",
            "machine_name": "web01",
            "placement": {"datacenter": "DC1", "compute_resource": "Cluster1"}
        }"#;
        let req: ProvisioningRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.clone_mode, CloneMode::Full);
        assert!(req.auto_name, "auto_name should default to true via serde");
        assert!(req.networks.is_empty());
        assert!(req.customization.is_none());
    }

    #[test]
    fn test_ssh_info_uses_fixed_port() {
        let info = SshInfo::new("10.0.0.5");
        assert_eq!(info.port, 22);
        assert_eq!(info.to_string(), "10.0.0.5:22");
    }
}
