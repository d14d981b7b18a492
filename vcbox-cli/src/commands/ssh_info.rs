use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio::time::Instant;
use vcbox::{MachineUuid, Provisioner};

use crate::config::NetworkArgs;

#[derive(Args, Debug)]
pub struct SshInfoArgs {
    /// Machine configuration file (.yaml, .yml or .json)
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Machine id printed by `up`
    #[arg(long, conflicts_with = "id_file")]
    pub id: Option<String>,

    /// File written by `up --id-file`
    #[arg(long, value_name = "FILE")]
    pub id_file: Option<PathBuf>,

    /// Seconds to wait for the guest to report an address (0 asks once)
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 1000)]
    pub interval: u64,

    /// Print host and port as JSON
    #[arg(long)]
    pub json: bool,

    /// Same network flags as given to `up`; a static --interface picks the NIC
    #[command(flatten)]
    pub network: NetworkArgs,
}

impl SshInfoArgs {
    /// A missing id file means the machine was never created.
    fn machine_id(&self) -> anyhow::Result<Option<MachineUuid>> {
        if let Some(id) = &self.id {
            return Ok(Some(MachineUuid::new(id.trim())));
        }
        let Some(path) = &self.id_file else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let id = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read id file {}", path.display()))?;
        let id = id.trim();
        Ok((!id.is_empty()).then(|| MachineUuid::new(id)))
    }
}

pub async fn execute(args: SshInfoArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let Some(uuid) = args.machine_id()? else {
        anyhow::bail!("No machine id; run `vcbox up` first");
    };
    let mut config = crate::config::load(&args.config)?;
    config.provider.sanitize()?;
    config.networks.extend(args.network.assignment());
    let primary = config.primary_interface();

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let interval = Duration::from_millis(args.interval.max(1));

    let info = loop {
        // Reopened on every poll to pick up guest reports written since.
        let provisioner = Provisioner::new(global.open_inventory()?);
        let info = provisioner
            .ssh_info(&config.provider.datacenter_name, &primary, &uuid)
            .await?;
        if let Some(info) = info {
            break info;
        }
        if Instant::now() + interval > deadline {
            anyhow::bail!(
                "Machine {} has not reported a guest address after {}s",
                uuid,
                args.timeout
            );
        }
        tracing::debug!(uuid = %uuid, "Waiting for guest address");
        tokio::time::sleep(interval).await;
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", info);
    }
    Ok(())
}
