use anyhow::Context;
use clap::Args;
use vcbox::Provisioner;

use crate::config::MachineArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub machine: MachineArgs,
}

pub async fn execute(args: PlanArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let request = args.machine.to_request()?;
    let inventory = global.open_inventory()?;

    let plan = Provisioner::new(inventory)
        .plan(&request)
        .await
        .with_context(|| format!("Failed to plan '{}'", args.machine.name))?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
