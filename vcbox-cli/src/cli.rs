use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use vcbox::SimulatedInventory;

#[derive(Parser, Debug)]
#[command(
    name = "vcbox",
    version,
    about = "Provision virtual machines from templates"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Inventory state file
    #[arg(
        long,
        global = true,
        env = "VCBOX_INVENTORY",
        default_value = "inventory.json"
    )]
    pub inventory: PathBuf,

    /// Write daily-rotated logs to this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalFlags {
    pub fn open_inventory(&self) -> anyhow::Result<Arc<SimulatedInventory>> {
        let inventory = SimulatedInventory::load(&self.inventory)
            .with_context(|| format!("Failed to open inventory {}", self.inventory.display()))?;
        Ok(Arc::new(inventory))
    }

    pub fn save_inventory(&self, inventory: &SimulatedInventory) -> anyhow::Result<()> {
        inventory
            .save(&self.inventory)
            .with_context(|| format!("Failed to save inventory {}", self.inventory.display()))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone a template into a new machine and print its id
    Up(crate::commands::up::UpArgs),

    /// Show what `up` would do without changing the inventory
    Plan(crate::commands::plan::PlanArgs),

    /// Print the SSH endpoint of a provisioned machine
    SshInfo(crate::commands::ssh_info::SshInfoArgs),
}
