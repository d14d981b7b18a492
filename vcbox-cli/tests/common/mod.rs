#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use std::time::Duration;

use vcbox_test_utils::{self as fixtures, Workspace};

/// Options matching the fixture inventory, full clone, no customization.
pub const YAML_OPTIONS: &str = "\
datacenter_name: DC1
computer_name: Cluster1
enable_vm_customization: false
";

pub const JSON_OPTIONS: &str = r#"{
  "datacenter_name": "DC1",
  "computer_name": "Cluster1",
  "enable_vm_customization": false
}"#;

pub struct TestContext {
    pub cmd: Command,
    pub workspace: Workspace,
}

impl TestContext {
    /// Fresh command bound to this context's inventory.
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_vcbox");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("VCBOX_INVENTORY");
    cmd.env_remove("RUST_LOG");
        cmd.env("USER", "tester");
        cmd.arg("--inventory").arg(self.workspace.inventory_path());
        cmd
    }

    pub fn options(&self, name: &str, contents: &str) -> PathBuf {
        self.workspace.write_options(name, contents)
    }

    /// Run `up` and return the printed machine id.
    pub fn up(&self, config: &PathBuf, name: &str, template: &str) -> String {
        let output = self
            .new_cmd()
            .arg("up")
            .arg("--config")
            .arg(config)
            .args(["--name", name, "--box", template])
            .output()
            .expect("Failed to run vcbox up");
        assert!(
            output.status.success(),
            "up failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Context over the standard fixture inventory.
pub fn vcbox() -> TestContext {
    let workspace = Workspace::new(&fixtures::inventory_builder().into_state());
    let bin_path = env!("CARGO_BIN_EXE_vcbox");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("VCBOX_INVENTORY");
    cmd.env_remove("RUST_LOG");
    cmd.arg("--inventory").arg(workspace.inventory_path());

    TestContext { cmd, workspace }
}
