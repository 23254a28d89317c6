pub mod classify;
pub mod lsblk;

use espgate_core::{
    dedup_by_path, Check, CommandRunner, Disk, FlashResult, HostBackend, HostConfig, Invocation,
    Platform,
};
use log::{info, warn};
use std::path::Path;

pub const BLOCK_SIZE: &str = "4M";

/// Linux backend: util-linux `lsblk` for discovery, `umount`, `dd`, `udisksctl`.
pub struct LinuxHost<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HostConfig,
}

impl<'a> LinuxHost<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HostConfig) -> Self {
        Self { runner, config }
    }

    fn mounted_children(&self, disk: &Disk) -> Vec<(String, String)> {
        let listing = Invocation::new("lsblk", ["-J", disk.path()]);
        let output = match self.runner.run(&listing, Check::BestEffort) {
            Ok(output) if output.succeeded() => output,
            Ok(_) => return Vec::new(),
            Err(err) => {
                warn!("could not list mounts on {}: {}", disk.path(), err);
                return Vec::new();
            }
        };
        match lsblk::parse(&output.stdout) {
            Ok(tree) => lsblk::mounted_children(&tree),
            Err(err) => {
                warn!("unreadable lsblk output for {}: {}", disk.path(), err);
                Vec::new()
            }
        }
    }
}

impl HostBackend for LinuxHost<'_> {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn listing_tool(&self) -> &'static str {
        "lsblk"
    }

    fn list_disks(&self) -> FlashResult<Vec<Disk>> {
        if !self.config.tools.lsblk {
            warn!("lsblk not found. Please install util-linux.");
            return Ok(Vec::new());
        }
        let listing = Invocation::new("lsblk", ["-J", "-o", lsblk::LIST_COLUMNS]);
        let output = self.runner.run(&listing, Check::Fatal)?;
        let tree = lsblk::parse(&output.stdout)?;
        let disks = tree.blockdevices.iter().filter_map(classify::classify).collect();
        Ok(dedup_by_path(disks))
    }

    fn unmount(&self, disk: &Disk) -> FlashResult<()> {
        for (name, mount_point) in self.mounted_children(disk) {
            info!("- Unmount {} from {}", name, mount_point);
            let umount = Invocation::elevated(self.config.privilege(), "umount", vec![mount_point]);
            self.runner.run(&umount, Check::BestEffort)?;
        }
        Ok(())
    }

    fn write_target<'d>(&self, disk: &'d Disk) -> &'d str {
        disk.path()
    }

    fn write_invocation(&self, image: &Path, disk: &Disk) -> Invocation {
        Invocation::elevated(
            self.config.privilege(),
            "dd",
            vec![
                format!("if={}", image.display()),
                format!("of={}", self.write_target(disk)),
                format!("bs={}", BLOCK_SIZE),
                "conv=fsync".to_string(),
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
        if !self.config.tools.udisksctl {
            info!("udisksctl not available; {} can be removed once activity stops", disk.path());
            return Ok(());
        }
        let power_off = Invocation::new("udisksctl", ["power-off", "-b", disk.path()]);
        self.runner.run(&power_off, Check::BestEffort)?;
        Ok(())
    }
}
