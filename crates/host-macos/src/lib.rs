pub mod classify;
pub mod diskutil;

use diskutil::DiskutilRecord;
use espgate_core::{
    dedup_by_path, Check, CommandRunner, Disk, FlashResult, HostBackend, HostConfig, Invocation,
    Platform,
};
use log::{debug, info};
use std::path::Path;

pub const BLOCK_SIZE: &str = "1m";

/// macOS backend: `diskutil` for discovery, unmount and eject; `dd` onto the raw node.
pub struct MacosHost<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HostConfig,
}

impl<'a> MacosHost<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HostConfig) -> Self {
        Self { runner, config }
    }

    /// `diskutil list`, then one best-effort `diskutil info` per whole disk.
    pub fn records(&self) -> FlashResult<Vec<DiskutilRecord>> {
        let listing = self
            .runner
            .run(&Invocation::new("diskutil", ["list"]), Check::Fatal)?;
        let mut records = Vec::new();
        for header in diskutil::parse_list(&listing.stdout) {
            let node = format!("/dev/{}", header.device);
            let detail = self
                .runner
                .run(&Invocation::new("diskutil", ["info", node.as_str()]), Check::BestEffort)?;
            let info = diskutil::parse_info(&detail.stdout);
            debug!("{}: {:?} {:?}", node, header, info);
            records.push(DiskutilRecord { header, info });
        }
        Ok(records)
    }
}

impl HostBackend for MacosHost<'_> {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn listing_tool(&self) -> &'static str {
        "diskutil"
    }

    fn list_disks(&self) -> FlashResult<Vec<Disk>> {
        let disks = self.records()?.iter().map(classify::classify).collect();
        Ok(dedup_by_path(disks))
    }

    fn unmount(&self, disk: &Disk) -> FlashResult<()> {
        info!("- Unmount all volumes on {}", disk.path());
        let unmount = Invocation::new("diskutil", ["unmountDisk", disk.path()]);
        self.runner.run(&unmount, Check::BestEffort)?;
        Ok(())
    }

    fn write_target<'d>(&self, disk: &'d Disk) -> &'d str {
        disk.display_path()
    }

    // BSD dd has no fsync conversion; conv=sync pads the final block and
    // writes to the raw node are unbuffered.
    fn write_invocation(&self, image: &Path, disk: &Disk) -> Invocation {
        Invocation::elevated(
            self.config.privilege(),
            "dd",
            vec![
                format!("if={}", image.display()),
                format!("of={}", self.write_target(disk)),
                format!("bs={}", BLOCK_SIZE),
                "conv=sync".to_string(),
            ],
        )
    }

    fn readback_invocation(&self, image: &Path, disk: &Disk, len: u64) -> Invocation {
        Invocation::elevated(
            self.config.privilege(),
            "cmp",
            vec![
                "-n".to_string(),
                len.to_string(),
                image.display().to_string(),
                self.write_target(disk).to_string(),
            ],
        )
    }

    fn finalize(&self, disk: &Disk) -> FlashResult<()> {
        let eject = Invocation::new("diskutil", ["eject", disk.path()]);
        self.runner.run(&eject, Check::BestEffort)?;
        Ok(())
    }
}
