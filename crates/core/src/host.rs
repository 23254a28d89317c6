use crate::command::Invocation;
use crate::config::Platform;
use crate::disk::Disk;
use crate::error::FlashResult;
use std::path::Path;

/// Per-platform disk discovery and the device-facing steps of a flash.
///
/// Each backend is selected once from `HostConfig` and owns every
/// platform difference; the flash sequence itself lives with the caller.
pub trait HostBackend {
    fn platform(&self) -> Platform;

    /// Listing tool named in diagnostics ("lsblk", "diskutil").
    fn listing_tool(&self) -> &'static str;

    /// Current block devices, classified. Tool failures propagate.
    fn list_disks(&self) -> FlashResult<Vec<Disk>>;

    /// Releases every mount on `disk`. Failures are logged, not returned.
    fn unmount(&self, disk: &Disk) -> FlashResult<()>;

    /// Device node the image is copied onto.
    fn write_target<'d>(&self, disk: &'d Disk) -> &'d str;

    /// Raw block copy of `image` onto `disk`, flushing before it returns.
    fn write_invocation(&self, image: &Path, disk: &Disk) -> Invocation;

    /// Byte comparison of the first `len` bytes of `image` against the write
    /// target, run with the same privilege as the write.
    fn readback_invocation(&self, image: &Path, disk: &Disk, len: u64) -> Invocation;

    /// Eject or power off. Failures are logged, not returned.
    fn finalize(&self, disk: &Disk) -> FlashResult<()>;
}
