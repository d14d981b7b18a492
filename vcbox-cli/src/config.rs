//! Machine configuration files and the flags shared by commands that read them.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use vcbox::guest::PrimaryInterface;
use vcbox::{NetworkAssignment, ProviderOptions, ProvisioningRequest};

/// Provider options plus the machine's own network declarations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MachineConfig {
    #[serde(flatten)]
    pub provider: ProviderOptions,

    /// Static or DHCP assignments. One naming an `interface` applies to that
    /// network's NIC, the others fill the remaining NICs in order.
    #[serde(default)]
    pub networks: Vec<NetworkAssignment>,
}

impl MachineConfig {
    pub fn primary_interface(&self) -> PrimaryInterface {
        self.provider.primary_interface(&self.networks)
    }
}

/// Load a `.yaml`/`.yml` or `.json` machine configuration.
pub fn load(path: &Path) -> anyhow::Result<MachineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported config format: {} (expected .yaml, .yml or .json)",
            path.display()
        ),
    };
    Ok(config)
}

#[derive(Args, Debug)]
pub struct MachineArgs {
    /// Machine configuration file (.yaml, .yml or .json)
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Machine name, also used as the guest hostname
    #[arg(long)]
    pub name: String,

    /// Template to clone, relative to the template folder
    #[arg(long = "box", value_name = "TEMPLATE")]
    pub template: String,

    #[command(flatten)]
    pub network: NetworkArgs,
}

impl MachineArgs {
    /// Build the provisioning request from the config file and flags.
    ///
    /// A static address given on the command line is appended after the
    /// assignments from the file.
    pub fn to_request(&self) -> anyhow::Result<ProvisioningRequest> {
        let mut config = load(&self.config)?;
        config.networks.extend(self.network.assignment());
        let request = config
            .provider
            .to_request(&self.name, &self.template, config.networks)
            .with_context(|| format!("Invalid configuration in {}", self.config.display()))?;
        Ok(request)
    }
}

/// One extra network assignment given on the command line.
#[derive(Args, Debug, Default)]
pub struct NetworkArgs {
    /// Static IPv4 address
    #[arg(long, requires = "netmask")]
    pub ip: Option<String>,

    /// Netmask for --ip
    #[arg(long, requires = "ip")]
    pub netmask: Option<String>,

    /// Default gateway for --ip
    #[arg(long, requires = "ip")]
    pub gateway: Option<String>,

    /// DNS server (can be repeated)
    #[arg(long = "dns", value_name = "ADDR")]
    pub dns_servers: Vec<String>,

    /// DNS search suffix (can be repeated)
    #[arg(long = "dns-suffix", value_name = "SUFFIX")]
    pub dns_suffixes: Vec<String>,

    /// Network the assignment applies to
    #[arg(long, value_name = "NETWORK")]
    pub interface: Option<String>,
}

impl NetworkArgs {
    pub fn assignment(&self) -> Option<NetworkAssignment> {
        if self.ip.is_none()
            && self.interface.is_none()
            && self.dns_servers.is_empty()
            && self.dns_suffixes.is_empty()
        {
            return None;
        }
        Some(NetworkAssignment {
            interface: self.interface.clone(),
            ip: self.ip.clone(),
            netmask: self.netmask.clone(),
            gateway: self.gateway.clone(),
            dns_servers: self.dns_servers.clone(),
            dns_suffixes: self.dns_suffixes.clone(),
        })
    }
}
