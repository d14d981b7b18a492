use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use vcbox::Provisioner;

use crate::config::MachineArgs;

#[derive(Args, Debug)]
pub struct UpArgs {
    #[command(flatten)]
    pub machine: MachineArgs,

    /// Also write the new machine's id to this file
    #[arg(long, value_name = "FILE")]
    pub id_file: Option<PathBuf>,

    /// Print the full clone outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: UpArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let request = args.machine.to_request()?;
    let inventory = global.open_inventory()?;

    let result = Provisioner::new(inventory.clone())
        .provision(&request)
        .await;

    // Folders and converted disks stay in place when the clone fails.
    let saved = global.save_inventory(&inventory);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(save_err) = &saved {
                tracing::error!(error = %format!("{:#}", save_err), "Inventory state not saved");
            }
            return Err(anyhow::Error::new(err).context(format!(
                "Failed to provision '{}' from '{}'",
                args.machine.name, args.machine.template
            )));
        }
    };
    saved?;
    tracing::info!(uuid = %outcome.uuid, path = %outcome.path, "Machine provisioned");

    if let Some(path) = &args.id_file {
        std::fs::write(path, outcome.uuid.as_str())
            .with_context(|| format!("Failed to write id file {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.uuid);
    }
    Ok(())
}
