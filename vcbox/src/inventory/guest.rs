//! Guest-reported network state.

use serde::{Deserialize, Serialize};

/// One NIC as reported by the guest tools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestNic {
    /// Name of the network the NIC is connected to, when known.
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

/// Point-in-time view of a running machine's guest networking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestNetworkSnapshot {
    /// Best-effort primary guest IP maintained by the platform.
    #[serde(default)]
    pub primary_ip: Option<String>,
    #[serde(default)]
    pub nics: Vec<GuestNic>,
    /// Independently maintained guest IP, populated before the guest tools
    /// fill in per-NIC data.
    #[serde(default)]
    pub fallback_ip: Option<String>,
}

impl GuestNetworkSnapshot {
    /// First reported address of the first NIC attached to `network`.
    pub fn address_on_network(&self, network: &str) -> Option<&str> {
        self.nics
            .iter()
            .filter(|nic| nic.network.as_deref() == Some(network))
            .find_map(|nic| nic.ip_addresses.first())
            .map(String::as_str)
    }
}
