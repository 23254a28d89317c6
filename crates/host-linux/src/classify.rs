use crate::lsblk::BlockDev;
use espgate_core::{Disk, Placement};

/// Maps one lsblk entry onto a `Disk`; `None` for anything but whole disks.
pub fn classify(dev: &BlockDev) -> Option<Disk> {
    if dev.dtype != "disk" {
        return None;
    }
    let name = dev.kernel_name();
    let path = format!("/dev/{}", name);
    let model = [dev.vendor.as_deref(), dev.model.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let transport = dev.tran.as_deref().unwrap_or("").trim().to_string();
    let size = dev
        .size
        .as_deref()
        .map(str::trim)
        .filter(|size| !size.is_empty())
        .unwrap_or("?");
    let removable = dev.rm || transport.eq_ignore_ascii_case("usb");
    let placement = if removable {
        Placement::Removable
    } else {
        Placement::Internal
    };
    Some(Disk::new(path.clone(), path, size, model, transport, placement))
}
