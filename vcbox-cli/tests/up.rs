use predicates::prelude::*;
use rstest::rstest;
use vcbox::inventory::{GuestNetworkSnapshot, Inventory, InventoryHandle};

mod common;

fn find_vm(ctx: &common::TestContext, uuid: &str) -> Option<InventoryHandle> {
    let inventory = ctx.workspace.load_inventory();
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    rt.block_on(async {
        let dc = inventory.find_datacenter("DC1").await.unwrap().unwrap();
        inventory.find_vm_by_uuid(&dc, uuid).await.unwrap()
    })
}

#[rstest]
#[case::yaml("machine.yaml", common::YAML_OPTIONS)]
#[case::json("machine.json", common::JSON_OPTIONS)]
fn test_up_prints_machine_id(#[case] file: &str, #[case] options: &str) {
    let mut ctx = common::vcbox();
    let config = ctx.options(file, options);

    let output = ctx
        .cmd
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let uuid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(predicate::str::is_match("^[0-9a-f-]{36}$").unwrap().eval(&uuid));
    assert!(find_vm(&ctx, &uuid).is_some());
}

#[test]
fn test_up_json_uses_auto_name() {
    let mut ctx = common::vcbox();
    let config = ctx.options("machine.yaml", common::YAML_OPTIONS);

    ctx.cmd
        .env("USER", "tester")
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"uuid\""))
        .stdout(predicate::str::is_match("\"name\": \"Vagrant-tester-web01-[^\"]+-[0-9a-f]{8}\"").unwrap());
}

#[test]
fn test_up_disabled_auto_name_in_folder() {
    let ctx = common::vcbox();
    let config = ctx.options(
        "machine.yaml",
        "datacenter_name: DC1\n\
         computer_name: Cluster1\n\
         folder_name: vagrant/ci\n\
         disable_auto_vm_name: true\n\
         enable_vm_customization: false\n",
    );

    ctx.new_cmd()
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"path\": \"vagrant/ci/web01\""));

    // Same name in the same folder is rejected by the platform.
    ctx.new_cmd()
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("clone failed"));
}

#[test]
fn test_linked_clones_share_converted_template() {
    let ctx = common::vcbox();
    let config = ctx.options(
        "machine.yaml",
        "datacenter_name: DC1\n\
         computer_name: Cluster1\n\
         linked_clones: true\n\
         enable_vm_customization: false\n",
    );

    let first = ctx.up(&config, "web01", "base");
    let second = ctx.up(&config, "web02", "base");
    assert_ne!(first, second);

    // Template disks were converted by the first run and persisted.
    ctx.new_cmd()
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web03", "--box", "base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"disk_conversions\": []"))
        .stdout(predicate::str::contains("\"disk_move_type\""));
}

#[test]
fn test_up_writes_id_file() {
    let ctx = common::vcbox();
    let config = ctx.options("machine.yaml", common::YAML_OPTIONS);
    let id_file = ctx.workspace.path().join("id");

    let output = ctx
        .new_cmd()
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "templates/org-base"])
        .arg("--id-file")
        .arg(&id_file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert_eq!(std::fs::read_to_string(&id_file).unwrap(), printed);
}

#[test]
fn test_up_missing_template_fails() {
    let mut ctx = common::vcbox();
    let config = ctx.options("machine.yaml", common::YAML_OPTIONS);

    ctx.cmd
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found: template 'nope'"));
}

#[test]
fn test_up_failure_survives_unsaved_inventory() {
    let mut ctx = common::vcbox();
    let config = ctx.options("machine.yaml", common::YAML_OPTIONS);

    // A directory in the way of the temporary state file makes the save fail.
    let mut blocker = ctx.workspace.inventory_path().into_os_string();
    blocker.push(".tmp");
    std::fs::create_dir(&blocker).unwrap();

    ctx.cmd
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found: template 'nope'"))
        .stderr(predicate::str::contains("Failed to save inventory"));
}

#[test]
fn test_up_requires_datacenter() {
    let mut ctx = common::vcbox();
    let config = ctx.options("machine.yaml", "computer_name: Cluster1\n");

    ctx.cmd
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("datacenter_name is required"));
}

#[test]
fn test_up_ip_without_netmask_is_rejected_by_parser() {
    let mut ctx = common::vcbox();
    let config = ctx.options("machine.yaml", common::YAML_OPTIONS);

    ctx.cmd
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--name", "web01", "--box", "base", "--ip", "10.0.0.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--netmask"));
}

#[test]
fn test_up_static_ip_from_flags_sets_guest_identity() {
    let ctx = common::vcbox();
    let config = ctx.options(
        "machine.yaml",
        "datacenter_name: DC1\n\
         computer_name: Cluster1\n\
         vm_network_names: [eth-prod]\n",
    );

    let uuid = {
        let output = ctx
            .new_cmd()
            .arg("up")
            .arg("--config")
            .arg(&config)
            .args(["--name", "web01", "--box", "base"])
            .args(["--ip", "10.0.0.5", "--netmask", "255.255.255.0"])
            .args(["--gateway", "10.0.0.1", "--dns", "10.0.0.2"])
            .args(["--interface", "eth-prod"])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    // The guest reports on both NICs; the static interface wins.
    let inventory = ctx.workspace.load_inventory();
    inventory
        .set_guest_snapshot(
            &uuid,
            GuestNetworkSnapshot {
                primary_ip: Some("192.168.1.20".into()),
                nics: vec![vcbox::inventory::GuestNic {
                    network: Some("eth-prod".into()),
                    ip_addresses: vec!["10.0.0.5".into()],
                }],
                fallback_ip: None,
            },
        )
        .unwrap();
    inventory.save(&ctx.workspace.inventory_path()).unwrap();

    ctx.new_cmd()
        .arg("ssh-info")
        .arg("--config")
        .arg(&config)
        .args(["--id", &uuid])
        .assert()
        .success()
        .stdout(predicate::str::diff("10.0.0.5:22\n"));
}
