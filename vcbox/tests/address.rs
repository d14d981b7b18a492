//! Guest address resolution through the provisioner.

use vcbox::inventory::{GuestNetworkSnapshot, GuestNic};
use vcbox::types::CustomizationRequest;
use vcbox::{AdapterKind, MachineUuid, NetworkAssignment, NetworkAttachment, SshInfo};
use vcbox_test_utils as fixtures;

#[tokio::test]
async fn test_no_id_means_no_info() {
    let inventory = fixtures::inventory();
    let info = fixtures::provisioner(&inventory)
        .read_ssh_info(&fixtures::request("base", "web01"), None)
        .await
        .unwrap();
    assert_eq!(info, None);
}

#[tokio::test]
async fn test_address_appears_after_guest_reports() {
    let inventory = fixtures::inventory();
    let provisioner = fixtures::provisioner(&inventory);
    let mut request = fixtures::request("base", "web01");
    request.networks = vec![NetworkAttachment::new(
        fixtures::PROD_NETWORK,
        AdapterKind::Standard,
    )];

    let outcome = provisioner.provision(&request).await.unwrap();

    // Freshly cloned: nothing reported yet, which is not an error.
    let info = provisioner
        .read_ssh_info(&request, Some(&outcome.uuid))
        .await
        .unwrap();
    assert_eq!(info, None);

    inventory
        .set_guest_snapshot(
            outcome.uuid.as_str(),
            GuestNetworkSnapshot {
                primary_ip: None,
                nics: vec![
                    GuestNic {
                        network: Some(fixtures::STANDARD_NETWORK.into()),
                        ip_addresses: vec!["192.168.1.20".into()],
                    },
                    GuestNic {
                        network: Some(fixtures::PROD_NETWORK.into()),
                        ip_addresses: vec!["10.0.0.5".into()],
                    },
                ],
                fallback_ip: None,
            },
        )
        .unwrap();

    let info = provisioner
        .read_ssh_info(&request, Some(&outcome.uuid))
        .await
        .unwrap();
    assert_eq!(info, Some(SshInfo::new("10.0.0.5")));
    assert_eq!(info.unwrap().port, 22);
}

#[tokio::test]
async fn test_static_assignment_interface_is_primary() {
    let inventory = fixtures::inventory();
    let provisioner = fixtures::provisioner(&inventory);
    let mut request = fixtures::request("base", "web01");
    request.networks = vec![
        NetworkAttachment::new(fixtures::STANDARD_NETWORK, AdapterKind::Standard),
        NetworkAttachment::new(fixtures::PROD_NETWORK, AdapterKind::Standard),
    ];
    let mut customization = CustomizationRequest::new("linux", "web01");
    customization.assignments = vec![
        NetworkAssignment::dhcp(),
        NetworkAssignment::fixed("10.0.0.5", "255.255.255.0")
            .with_interface(fixtures::PROD_NETWORK),
    ];
    request.customization = Some(customization);

    let outcome = provisioner.provision(&request).await.unwrap();
    inventory
        .set_guest_snapshot(
            outcome.uuid.as_str(),
            GuestNetworkSnapshot {
                primary_ip: Some("192.168.1.20".into()),
                nics: vec![
                    GuestNic {
                        network: Some(fixtures::STANDARD_NETWORK.into()),
                        ip_addresses: vec!["192.168.1.20".into()],
                    },
                    GuestNic {
                        network: Some(fixtures::PROD_NETWORK.into()),
                        ip_addresses: vec!["10.0.0.5".into()],
                    },
                ],
                fallback_ip: None,
            },
        )
        .unwrap();

    let info = provisioner
        .read_ssh_info(&request, Some(&outcome.uuid))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.host, "10.0.0.5");
}

#[tokio::test]
async fn test_fallback_ip_before_tools_report_nics() {
    let inventory = fixtures::inventory();
    let provisioner = fixtures::provisioner(&inventory);
    let request = fixtures::request("base", "web01");
    let outcome = provisioner.provision(&request).await.unwrap();

    inventory
        .set_guest_snapshot(
            outcome.uuid.as_str(),
            GuestNetworkSnapshot {
                fallback_ip: Some("10.9.9.9".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let info = provisioner
        .read_ssh_info(&request, Some(&outcome.uuid))
        .await
        .unwrap();
    assert_eq!(info.map(|i| i.host), Some("10.9.9.9".to_string()));
}

#[tokio::test]
async fn test_unknown_uuid_is_not_found() {
    let inventory = fixtures::inventory();
    let err = fixtures::provisioner(&inventory)
        .read_ssh_info(
            &fixtures::request("base", "web01"),
            Some(&MachineUuid::new("00000000-0000-0000-0000-000000000000")),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
