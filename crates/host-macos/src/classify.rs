use crate::diskutil::DiskutilRecord;
use espgate_core::{Disk, Placement};

pub fn classify(record: &DiskutilRecord) -> Disk {
    let header = &record.header;
    let info = &record.info;
    let placement = if header.external {
        Placement::Removable
    } else if header.internal {
        Placement::Internal
    } else {
        Placement::Unknown
    };
    let transport = match info.protocol.as_deref() {
        Some(protocol) => protocol.to_string(),
        None if header.external => "USB".to_string(),
        None => String::new(),
    };
    Disk::new(
        format!("/dev/{}", header.device),
        format!("/dev/r{}", header.device),
        info.size.as_deref().unwrap_or("?"),
        info.media_name.as_deref().unwrap_or(""),
        transport,
        placement,
    )
}
