use anyhow::Result;
use clap::Parser;
use espgate_core::{Disk, FlashError, HostBackend, HostConfig, SystemRunner, TerminalPrompt};
use espgate_imaging::ImageSpec;
use espgate_safety::{eligible, render_table};
use espgate_workflow::{discover, run_flash, select_backend, FlashParams};
use log::{debug, info};
use std::path::PathBuf;

/// Flash an ESP image to a USB drive (DANGEROUS).
#[derive(Debug, Parser)]
#[command(name = "espgate", version)]
struct Cli {
    /// Path to the ESP image
    #[arg(long, default_value = "target/esp.img")]
    image: PathBuf,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,

    /// Include internal disks in the selection (dangerous)
    #[arg(long)]
    include_internal: bool,

    /// Build the UEFI application and the image before flashing
    #[arg(long)]
    build: bool,

    /// Cargo package to build with --build
    #[arg(long, default_value = "zap")]
    package: String,

    /// Target triple to build with --build
    #[arg(long, default_value = "x86_64-unknown-uefi")]
    target: String,

    /// Build in release mode
    #[arg(long)]
    release: bool,

    /// Image size in MiB for --build
    #[arg(long, default_value_t = 100)]
    image_size: u64,

    /// Read the device back after writing and compare SHA-256
    #[arg(long)]
    verify: bool,

    /// Print the selectable disks and exit
    #[arg(long)]
    list: bool,

    /// With --list, print JSON
    #[arg(long, requires = "list")]
    json: bool,
}

impl Cli {
    fn image_spec(&self) -> ImageSpec {
        ImageSpec {
            package: self.package.clone(),
            target: self.target.clone(),
            release: self.release,
            image_path: self.image.clone(),
            size_mib: self.image_size,
            ..ImageSpec::default()
        }
    }

    fn flash_params(&self) -> FlashParams {
        FlashParams {
            image: self.image.clone(),
            auto_yes: self.yes,
            include_internal: self.include_internal,
            verify: self.verify,
            build: self.build.then(|| self.image_spec()),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("error: {}", err);
        if let Some(FlashError::MissingArtifact(path)) = err.downcast_ref::<FlashError>() {
            eprintln!(
                "Build it first (e.g. espgate --build) so {} exists.",
                path.display()
            );
        }
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = HostConfig::detect();
    debug!("host config: {:?}", config);
    let runner = SystemRunner;
    let host = select_backend(&config, &runner)?;

    if cli.list {
        return list_disks(cli, host.as_ref());
    }

    let mut prompt = TerminalPrompt;
    let report = run_flash(&cli.flash_params(), host.as_ref(), &runner, &mut prompt)?;
    if let Some(sha256) = &report.sha256 {
        info!("verified {} sha256={}", report.disk.path(), sha256);
    }
    Ok(())
}

fn list_disks(cli: &Cli, host: &dyn HostBackend) -> Result<()> {
    let disks = eligible(&discover(host)?, cli.include_internal);
    println!("{}", listing(&disks, cli.json)?);
    Ok(())
}

fn listing(disks: &[Disk], json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(disks)?)
    } else {
        Ok(render_table(disks).join("\n"))
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<FlashError>()
        .map(FlashError::exit_code)
        .unwrap_or(1)
}
