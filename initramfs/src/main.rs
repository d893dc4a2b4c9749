// ABOUTME: MobileOS initramfs mount helper.
// ABOUTME: Performs the configured mount table through systemd-mount, in order, during early boot.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use mos_initramfs::config::load_mount_tables_from_dir;
use mos_initramfs::{logging, Mounter};

#[derive(Debug, Parser)]
#[command(name = "mos-initramfs-mount", about = "Mount the initramfs mount table via systemd-mount")]
struct Args {
    /// Directory holding *.toml mount tables.
    #[arg(long, default_value = "/etc/mos/mounts.d")]
    config_dir: PathBuf,

    /// Root for the boot-ordering drop-ins; overrides the table's settings.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Mount program; overrides the table's settings.
    #[arg(long)]
    program: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn run(args: Args) -> Result<()> {
    let table = load_mount_tables_from_dir(&args.config_dir)?;

    let mut settings = table.settings.unwrap_or_default();
    if let Some(root) = args.root {
        settings.root_dir = root;
    }
    if let Some(program) = args.program {
        settings.program = program;
    }

    if table.mounts.is_empty() {
        warn!(dir = %args.config_dir.display(), "no mounts configured");
        return Ok(());
    }

    let mounter = Mounter::new(settings);
    for entry in &table.mounts {
        let request = entry.to_request()?;
        mounter
            .do_mount(&request)
            .with_context(|| format!("mount of {} failed", entry.target))?;
    }

    info!(count = table.mounts.len(), "mount table complete");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("initramfs mounts failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
