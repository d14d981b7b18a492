//! Provider configuration.

use serde::{Deserialize, Serialize};
use vcbox_shared::constants::nic::DISTRIBUTED_PORT_TYPE;
use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::guest::PrimaryInterface;
use crate::types::{
    AdapterKind, CloneMode, CustomizationRequest, HardwareOverrides, NetworkAssignment,
    NetworkAttachment, OsFamily, PlacementNames, ProvisioningRequest,
};

// ============================================================================
// Provider Options
// ============================================================================

/// Per-machine provider settings, as written in the user's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Datacenter holding templates and clones.
    #[serde(default)]
    pub datacenter_name: String,

    /// Host or cluster the clone runs on.
    #[serde(default)]
    pub computer_name: String,

    /// Child pool of the compute resource's root pool.
    #[serde(default)]
    pub resourcepool_name: Option<String>,

    /// Destination folder below the root VM folder. Created when missing.
    #[serde(default)]
    pub folder_name: Option<String>,

    /// Folder the templates live in.
    #[serde(default)]
    pub template_folder_name: Option<String>,

    /// Network whose guest address is used for SSH.
    #[serde(default)]
    pub network_name: Option<String>,

    /// Clone with shared base disks.
    ///
    /// Default: false
    #[serde(default)]
    pub linked_clones: bool,

    /// Use the machine name verbatim instead of a generated unique name.
    ///
    /// Default: false
    #[serde(default)]
    pub disable_auto_vm_name: bool,

    /// Networks to attach, replacing the template's first NIC.
    #[serde(default)]
    pub vm_network_names: Vec<String>,

    /// `DistributedVirtualSwitchPort` binds NICs to a distributed switch
    /// port; anything else uses a direct network reference.
    #[serde(default)]
    pub vm_network_type: Option<String>,

    /// Apply guest customization on first boot.
    ///
    /// Default: true
    #[serde(default = "default_enable_vm_customization")]
    pub enable_vm_customization: bool,

    /// Guest OS family for customization (`linux` or `windows`).
    ///
    /// Default: linux
    #[serde(default = "default_prep_type")]
    pub prep_type: String,

    /// Windows product key.
    #[serde(default)]
    pub product_key: Option<String>,

    #[serde(default)]
    pub num_cpu: Option<u32>,

    /// Memory in MiB.
    #[serde(default)]
    pub memory: Option<u64>,
}

fn default_enable_vm_customization() -> bool {
    true
}

fn default_prep_type() -> String {
    "linux".to_string()
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            datacenter_name: String::new(),
            computer_name: String::new(),
            resourcepool_name: None,
            folder_name: None,
            template_folder_name: None,
            network_name: None,
            linked_clones: false,
            disable_auto_vm_name: false,
            vm_network_names: Vec::new(),
            vm_network_type: None,
            enable_vm_customization: default_enable_vm_customization(),
            prep_type: default_prep_type(),
            product_key: None,
            num_cpu: None,
            memory: None,
        }
    }
}

impl ProviderOptions {
    pub fn builder() -> ProviderOptionsBuilder {
        ProviderOptionsBuilder::new()
    }

    /// Adapter kind for every requested network.
    pub fn adapter_kind(&self) -> AdapterKind {
        match self.vm_network_type.as_deref() {
            Some(DISTRIBUTED_PORT_TYPE) => AdapterKind::DistributedPort,
            _ => AdapterKind::Standard,
        }
    }

    /// Network whose guest address is used for remote access.
    ///
    /// Static `assignments` only count while customization is enabled, the
    /// same as for a provisioned request.
    pub fn primary_interface(&self, assignments: &[NetworkAssignment]) -> PrimaryInterface {
        let assignments = if self.enable_vm_customization {
            assignments
        } else {
            &[]
        };
        PrimaryInterface::select(
            self.network_name.as_deref(),
            assignments,
            self.vm_network_names.first().map(String::as_str),
        )
    }

    /// Check the options before any remote call is made.
    pub fn sanitize(&self) -> VcboxResult<()> {
        if self.datacenter_name.trim().is_empty() {
            return Err(VcboxError::Config("datacenter_name is required".to_string()));
        }
        if self.computer_name.trim().is_empty() {
            return Err(VcboxError::Config("computer_name is required".to_string()));
        }
        if self.num_cpu == Some(0) {
            return Err(VcboxError::Config("num_cpu must be at least 1".to_string()));
        }
        if self.memory == Some(0) {
            return Err(VcboxError::Config("memory must be at least 1 MiB".to_string()));
        }
        if self.enable_vm_customization {
            self.prep_type.parse::<OsFamily>()?;
        }
        Ok(())
    }

    /// Derive the request for one provisioning run.
    ///
    /// The machine name doubles as the guest hostname. `assignments` are the
    /// machine's static/DHCP network declarations, in order.
    pub fn to_request(
        &self,
        machine_name: &str,
        box_name: &str,
        assignments: Vec<NetworkAssignment>,
    ) -> VcboxResult<ProvisioningRequest> {
        self.sanitize()?;

        let placement = PlacementNames {
            datacenter: self.datacenter_name.clone(),
            compute_resource: self.computer_name.clone(),
            resource_pool: self.resourcepool_name.clone(),
            folder: self.folder_name.clone(),
            template_folder: self.template_folder_name.clone(),
        };

        let kind = self.adapter_kind();
        let customization = self.enable_vm_customization.then(|| CustomizationRequest {
            prep_type: self.prep_type.clone(),
            hostname: machine_name.to_string(),
            assignments,
            product_key: self.product_key.clone(),
        });

        let mut request = ProvisioningRequest::new(box_name, machine_name, placement);
        request.clone_mode = if self.linked_clones {
            CloneMode::Linked
        } else {
            CloneMode::Full
        };
        request.hardware = HardwareOverrides {
            num_cpus: self.num_cpu,
            memory_mb: self.memory,
        };
        request.networks = self
            .vm_network_names
            .iter()
            .map(|name| NetworkAttachment::new(name.clone(), kind))
            .collect();
        request.customization = customization;
        request.auto_name = !self.disable_auto_vm_name;
        request.primary_network = self.network_name.clone();
        Ok(request)
    }
}

// ============================================================================
// Provider Options Builder
// ============================================================================

/// Non-consuming builder for [`ProviderOptions`].
///
/// # Example
///
/// ```
/// use vcbox::options::ProviderOptions;
///
/// let options = ProviderOptions::builder()
///     .datacenter("DC1")
///     .compute_resource("Cluster1")
///     .linked_clones(true)
///     .network("VM Network")
///     .build();
/// assert_eq!(options.vm_network_names, vec!["VM Network".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProviderOptionsBuilder {
    inner: ProviderOptions,
}

impl ProviderOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datacenter(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.datacenter_name = name.into();
        self
    }

    pub fn compute_resource(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.computer_name = name.into();
        self
    }

    pub fn resource_pool(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.resourcepool_name = Some(name.into());
        self
    }

    pub fn folder(&mut self, path: impl Into<String>) -> &mut Self {
        self.inner.folder_name = Some(path.into());
        self
    }

    pub fn template_folder(&mut self, path: impl Into<String>) -> &mut Self {
        self.inner.template_folder_name = Some(path.into());
        self
    }

    pub fn primary_network(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.network_name = Some(name.into());
        self
    }

    pub fn linked_clones(&mut self, enabled: bool) -> &mut Self {
        self.inner.linked_clones = enabled;
        self
    }

    pub fn auto_name(&mut self, enabled: bool) -> &mut Self {
        self.inner.disable_auto_vm_name = !enabled;
        self
    }

    /// Add a network to attach.
    pub fn network(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.vm_network_names.push(name.into());
        self
    }

    /// Bind every requested NIC to a distributed switch port.
    pub fn distributed_ports(&mut self) -> &mut Self {
        self.inner.vm_network_type = Some(DISTRIBUTED_PORT_TYPE.to_string());
        self
    }

    pub fn customization(&mut self, enabled: bool) -> &mut Self {
        self.inner.enable_vm_customization = enabled;
        self
    }

    pub fn prep_type(&mut self, prep_type: impl Into<String>) -> &mut Self {
        self.inner.prep_type = prep_type.into();
        self
    }

    pub fn product_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.inner.product_key = Some(key.into());
        self
    }

    pub fn cpus(&mut self, count: u32) -> &mut Self {
        self.inner.num_cpu = Some(count);
        self
    }

    pub fn memory_mb(&mut self, mb: u64) -> &mut Self {
        self.inner.memory = Some(mb);
        self
    }

    pub fn build(&self) -> ProviderOptions {
        self.inner.clone()
    }
}
