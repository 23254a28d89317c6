use espgate_core::{Check, CommandRunner, Disk, FlashResult, HostBackend, Invocation};
use espgate_imaging::verify_written;
use espgate_safety::Authorization;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStage {
    Unmount,
    Write,
    Sync,
    Verify,
    Finalize,
}

#[derive(Debug, Clone)]
pub struct FlashReport {
    pub disk: Disk,
    pub image: PathBuf,
    pub stages: Vec<FlashStage>,
    /// Digest of the read-back data when verification ran.
    pub sha256: Option<String>,
}

/// Runs UNMOUNT -> WRITE -> SYNC -> (VERIFY) -> FINALIZE, strictly in order.
pub struct FlashExecutor<'a> {
    host: &'a dyn HostBackend,
    runner: &'a dyn CommandRunner,
}

impl<'a> FlashExecutor<'a> {
    pub fn new(host: &'a dyn HostBackend, runner: &'a dyn CommandRunner) -> Self {
        Self { host, runner }
    }

    /// Consumes the authorization; the disk it names is the only possible target.
    pub fn execute(&self, authorization: Authorization, image: &Path, verify: bool) -> FlashResult<FlashReport> {
        let disk = authorization.disk();
        let mut stages = Vec::new();

        self.host.unmount(disk)?;
        stages.push(FlashStage::Unmount);

        let write = self.host.write_invocation(image, disk);
        info!("- Running: {}", write.printable());
        self.runner.run(&write, Check::Fatal)?;
        stages.push(FlashStage::Write);

        self.runner
            .run(&Invocation::new("sync", Vec::<String>::new()), Check::BestEffort)?;
        stages.push(FlashStage::Sync);

        let mut sha256 = None;
        if verify {
            let len = image.metadata()?.len();
            let compare = self.host.readback_invocation(image, disk, len);
            info!("- Verifying: {}", compare.printable());
            sha256 = Some(verify_written(self.runner, &compare, image, self.host.write_target(disk))?);
            stages.push(FlashStage::Verify);
        }

        self.host.finalize(disk)?;
        stages.push(FlashStage::Finalize);

        Ok(FlashReport {
            disk: disk.clone(),
            image: image.to_path_buf(),
            stages,
            sha256,
        })
    }
}
