pub mod executor;

pub use executor::{FlashExecutor, FlashReport, FlashStage};

use espgate_core::{
    CommandRunner, Disk, FlashError, FlashResult, HostBackend, HostConfig, Platform, Prompt,
};
use espgate_host_linux::LinuxHost;
use espgate_host_macos::MacosHost;
use espgate_imaging::{ensure_image, ImageBuilder, ImageSpec};
use espgate_safety::{choose_disk, confirm_destruction};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FlashParams {
    pub image: PathBuf,
    pub auto_yes: bool,
    pub include_internal: bool,
    pub verify: bool,
    /// Build the image first instead of requiring it on disk.
    pub build: Option<ImageSpec>,
}

/// Picks the platform backend once, from the startup configuration.
pub fn select_backend<'a>(
    config: &'a HostConfig,
    runner: &'a dyn CommandRunner,
) -> FlashResult<Box<dyn HostBackend + 'a>> {
    match &config.platform {
        Platform::Linux => Ok(Box::new(LinuxHost::new(runner, config))),
        Platform::MacOs => Ok(Box::new(MacosHost::new(runner, config))),
        Platform::Other(name) => Err(FlashError::UnsupportedPlatform(name.clone())),
    }
}

/// Lists disks; an empty result is a `Discovery` failure naming the tool.
pub fn discover(host: &dyn HostBackend) -> FlashResult<Vec<Disk>> {
    let disks = host.list_disks()?;
    if disks.is_empty() {
        return Err(FlashError::Discovery(format!(
            "No disks found via {}.",
            host.listing_tool()
        )));
    }
    info!("found {} disk(s) via {}", disks.len(), host.listing_tool());
    Ok(disks)
}

/// Build (or locate) the image, pick a disk, confirm, then flash it.
pub fn run_flash(
    params: &FlashParams,
    host: &dyn HostBackend,
    runner: &dyn CommandRunner,
    prompt: &mut dyn Prompt,
) -> FlashResult<FlashReport> {
    let image = match &params.build {
        Some(spec) => ImageBuilder::new(runner, spec).build()?,
        None => {
            ensure_image(&params.image)?;
            params.image.clone()
        }
    };

    let disks = discover(host)?;
    let disk = choose_disk(&disks, params.include_internal, prompt)?;
    let authorization = confirm_destruction(disk, params.auto_yes, prompt)?;

    let disk = authorization.disk();
    prompt.say(&format!(
        "Using {} disk: {} ({}, {})",
        host.platform().label(),
        disk.path(),
        disk.size(),
        disk.model()
    ));
    let report = FlashExecutor::new(host, runner).execute(authorization, &image, params.verify)?;
    prompt.say("Done. You can now remove the USB drive.");
    Ok(report)
}
