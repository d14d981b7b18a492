//! Requested network attachments resolved against the datacenter.

use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::inventory::{Inventory, InventoryHandle, NetworkBacking, NetworkInfo, NicBacking};
use crate::spec::ResolvedNetwork;
use crate::types::{AdapterKind, NetworkAttachment};

/// Look up every attachment, in order. The first missing network aborts.
pub async fn resolve_networks(
    inventory: &dyn Inventory,
    datacenter: &InventoryHandle,
    attachments: &[NetworkAttachment],
) -> VcboxResult<Vec<ResolvedNetwork>> {
    let mut resolved = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let info = inventory
            .find_network(datacenter, &attachment.name)
            .await?
            .ok_or_else(|| {
                VcboxError::NotFound(format!("network '{}' in {}", attachment.name, datacenter))
            })?;
        tracing::debug!(network = %attachment.name, kind = ?attachment.kind, "Resolved network");
        resolved.push(ResolvedNetwork {
            name: attachment.name.clone(),
            backing: nic_backing(&info, attachment.kind)?,
        });
    }
    Ok(resolved)
}

/// How a new NIC plugs into `network` for the requested adapter kind.
pub fn nic_backing(network: &NetworkInfo, kind: AdapterKind) -> VcboxResult<NicBacking> {
    match (kind, &network.backing) {
        (AdapterKind::Standard, _) => Ok(NicBacking::Network {
            network: network.handle.clone(),
            device_name: network.handle.name().to_string(),
        }),
        (
            AdapterKind::DistributedPort,
            NetworkBacking::DistributedPortgroup {
                switch_uuid,
                portgroup_key,
            },
        ) => Ok(NicBacking::DistributedPort {
            switch_uuid: switch_uuid.clone(),
            portgroup_key: portgroup_key.clone(),
        }),
        (AdapterKind::DistributedPort, NetworkBacking::Standard) => Err(VcboxError::Config(format!(
            "network '{}' is not a distributed port group",
            network.handle.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{ObjectKind, SimulatedInventory};

    #[tokio::test]
    async fn test_resolve_in_order() {
        let inv = SimulatedInventory::builder()
            .datacenter("DC1")
            .network("VM Network")
            .distributed_network("dv-prod", "50 1a", "dvportgroup-31")
            .build();
        let dc = inv.find_datacenter("DC1").await.unwrap().unwrap();

        let networks = resolve_networks(
            &inv,
            &dc,
            &[
                NetworkAttachment::new("dv-prod", AdapterKind::DistributedPort),
                NetworkAttachment::new("VM Network", AdapterKind::Standard),
            ],
        )
        .await
        .unwrap();

        assert_eq!(networks[0].name, "dv-prod");
        assert_eq!(
            networks[0].backing,
            NicBacking::DistributedPort {
                switch_uuid: "50 1a".into(),
                portgroup_key: "dvportgroup-31".into(),
            }
        );
        assert!(matches!(
            &networks[1].backing,
            NicBacking::Network { device_name, .. } if device_name == "VM Network"
        ));
    }

    #[tokio::test]
    async fn test_missing_network_is_not_found() {
        let inv = SimulatedInventory::builder().datacenter("DC1").build();
        let dc = inv.find_datacenter("DC1").await.unwrap().unwrap();
        let err = resolve_networks(&inv, &dc, &[NetworkAttachment::new("prod", AdapterKind::Standard)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn test_distributed_kind_needs_portgroup() {
        let info = NetworkInfo {
            handle: InventoryHandle::new(ObjectKind::Network, "network-7", "VM Network"),
            backing: NetworkBacking::Standard,
        };
        let err = nic_backing(&info, AdapterKind::DistributedPort).unwrap_err();
        assert!(matches!(err, VcboxError::Config(_)));
    }
}
