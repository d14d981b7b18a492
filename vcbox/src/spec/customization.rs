//! Guest customization block.
//!
//! Turns a [`CustomizationRequest`] into the platform's customization spec:
//! one adapter mapping per NIC plus the OS identity block.

use vcbox_shared::constants::customization::{SYSPREP_OWNER, SYSPREP_TIME_ZONE};
use vcbox_shared::errors::{VcboxError, VcboxResult};

use super::{
    AdapterMapping, CustomizationSpec, GlobalIpSettings, GuiUnattended, Identification, Identity,
    IpGenerator, IpSettings, LinuxPrep, Sysprep, UserData,
};
use crate::types::{CustomizationRequest, NetworkAssignment, OsFamily};

/// Build the customization spec for a clone attached to `networks`.
///
/// An assignment naming an `interface` goes to the adapter of the requested
/// network with that name. The others fill the remaining adapters in order.
/// Adapters without an assignment get DHCP, and a request with neither
/// assignments nor NICs still gets one DHCP mapping so the identity block
/// always has an adapter to apply to. Without requested networks the
/// template's NICs are kept and every assignment maps by position.
pub fn build(
    request: &CustomizationRequest,
    networks: &[&str],
) -> VcboxResult<CustomizationSpec> {
    let nic_setting_map = nic_setting_map(&request.assignments, networks)?;

    let (dns_server_list, dns_suffix_list) = request.dns();
    let global_ip_settings = GlobalIpSettings {
        dns_server_list,
        dns_suffix_list,
    };

    let identity = identity(
        request.os_family()?,
        &request.hostname,
        request.product_key.as_deref(),
    );

    Ok(CustomizationSpec {
        global_ip_settings,
        identity,
        nic_setting_map,
    })
}

fn nic_setting_map(
    assignments: &[NetworkAssignment],
    networks: &[&str],
) -> VcboxResult<Vec<AdapterMapping>> {
    let wanted = networks.len().max(assignments.len()).max(1);
    let mut slots: Vec<Option<IpSettings>> = vec![None; wanted];
    let mut positional = Vec::new();

    for assignment in assignments {
        let adapter = adapter_mapping(assignment)?;
        let interface = assignment
            .interface
            .as_deref()
            .filter(|_| !networks.is_empty());
        let Some(interface) = interface else {
            positional.push(adapter);
            continue;
        };

        let index = networks
            .iter()
            .position(|name| *name == interface)
            .ok_or_else(|| {
                VcboxError::InvalidNetworkSpec(format!(
                    "interface {} is not one of the requested networks",
                    interface
                ))
            })?;
        if slots[index].is_some() {
            return Err(VcboxError::InvalidNetworkSpec(format!(
                "interface {} has more than one assignment",
                interface
            )));
        }
        slots[index] = Some(adapter);
    }

    let free = slots.iter_mut().filter(|slot| slot.is_none());
    for (slot, adapter) in free.zip(positional) {
        *slot = Some(adapter);
    }

    Ok(slots
        .into_iter()
        .map(|slot| AdapterMapping {
            adapter: slot.unwrap_or_else(IpSettings::dhcp),
        })
        .collect())
}

/// IP settings for one interface: DHCP when neither address nor netmask is
/// given, fixed when both are, an error otherwise.
pub fn adapter_mapping(assignment: &NetworkAssignment) -> VcboxResult<IpSettings> {
    match (&assignment.ip, &assignment.netmask) {
        (None, None) => Ok(IpSettings::dhcp()),
        (Some(ip), Some(netmask)) => Ok(IpSettings {
            ip: IpGenerator::Fixed {
                ip_address: ip.clone(),
            },
            subnet_mask: Some(netmask.clone()),
            gateway: assignment.gateway.iter().cloned().collect(),
        }),
        (Some(ip), None) => Err(VcboxError::InvalidNetworkSpec(format!(
            "ip {} given without a netmask",
            ip
        ))),
        (None, Some(netmask)) => Err(VcboxError::InvalidNetworkSpec(format!(
            "netmask {} given without an ip",
            netmask
        ))),
    }
}

/// Split `web01.corp.local` into `("web01", "corp.local")`.
pub fn split_hostname(hostname: &str) -> (&str, &str) {
    hostname.split_once('.').unwrap_or((hostname, ""))
}

fn identity(os: OsFamily, hostname: &str, product_key: Option<&str>) -> Identity {
    let (short, domain) = split_hostname(hostname);
    match os {
        OsFamily::Linux => Identity::Linux(LinuxPrep {
            domain: domain.to_string(),
            host_name: short.to_string(),
        }),
        OsFamily::Windows => Identity::Windows(Sysprep {
            gui_unattended: GuiUnattended {
                auto_logon: false,
                auto_logon_count: 0,
                time_zone: SYSPREP_TIME_ZONE,
            },
            identification: Identification::default(),
            user_data: UserData {
                computer_name: short.to_string(),
                full_name: SYSPREP_OWNER.to_string(),
                org_name: SYSPREP_OWNER.to_string(),
                product_id: product_key.unwrap_or_default().to_string(),
            },
        }),
    }
}
