//! Guest address resolution.
//!
//! A running machine may report zero, one or many NICs and addresses. One of
//! them is authoritative for remote access, picked in this order:
//!
//! 1. the platform's primary guest IP, replaced by the first address of the
//!    NIC attached to the primary interface when that NIC reports one;
//! 2. the independently maintained fallback guest IP;
//! 3. nothing yet.
//!
//! Resolution is a single read. Callers poll and own the timeout.

use vcbox_shared::errors::VcboxResult;

use crate::inventory::{GuestNetworkSnapshot, Inventory, InventoryHandle};
use crate::types::{NetworkAssignment, ProvisioningRequest};

/// Network whose NIC address is authoritative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimaryInterface(Option<String>);

impl PrimaryInterface {
    pub fn new(network: Option<String>) -> Self {
        Self(network)
    }

    /// Explicit override, else the interface of the first static assignment,
    /// else the first requested attachment.
    pub fn from_request(request: &ProvisioningRequest) -> Self {
        let assignments = request
            .customization
            .as_ref()
            .map(|c| c.assignments.as_slice())
            .unwrap_or_default();
        Self::select(
            request.primary_network.as_deref(),
            assignments,
            request.networks.first().map(|n| n.name.as_str()),
        )
    }

    pub fn select(
        explicit: Option<&str>,
        assignments: &[NetworkAssignment],
        first_network: Option<&str>,
    ) -> Self {
        let network = explicit
            .or_else(|| {
                assignments
                    .iter()
                    .find(|a| !a.is_dhcp() && a.interface.is_some())
                    .and_then(|a| a.interface.as_deref())
            })
            .or(first_network);
        Self(network.map(str::to_string))
    }

    pub fn network(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the authoritative address out of a snapshot.
pub fn resolve_address(
    snapshot: &GuestNetworkSnapshot,
    primary: &PrimaryInterface,
) -> Option<String> {
    let refined = primary
        .network()
        .and_then(|network| snapshot.address_on_network(network));

    refined
        .and_then(|ip| non_blank(Some(ip)))
        .or_else(|| non_blank(snapshot.primary_ip.as_deref()))
        .or_else(|| non_blank(snapshot.fallback_ip.as_deref()))
        .map(str::to_string)
}

pub struct GuestAddressResolver<'a> {
    inventory: &'a dyn Inventory,
}

impl<'a> GuestAddressResolver<'a> {
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self { inventory }
    }

    /// One address for `vm`, or `None` while the guest has not reported any.
    pub async fn resolve(
        &self,
        vm: &InventoryHandle,
        primary: &PrimaryInterface,
    ) -> VcboxResult<Option<String>> {
        let snapshot = self.inventory.guest_snapshot(vm).await?;
        let address = resolve_address(&snapshot, primary);
        tracing::debug!(vm = %vm, address = ?address, "Resolved guest address");
        Ok(address)
    }
}
