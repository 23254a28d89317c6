/// One `/dev/diskN (flags):` header from `diskutil list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListHeader {
    pub device: String,
    pub internal: bool,
    pub external: bool,
}

/// Fields pulled out of free-text `diskutil info` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoFields {
    pub size: Option<String>,
    pub media_name: Option<String>,
    pub protocol: Option<String>,
}

/// Raw macOS record before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskutilRecord {
    pub header: ListHeader,
    pub info: InfoFields,
}

pub fn parse_list(output: &str) -> Vec<ListHeader> {
    output.lines().filter_map(|line| parse_header(line.trim())).collect()
}

fn parse_header(line: &str) -> Option<ListHeader> {
    let rest = line.strip_prefix("/dev/")?;
    let (device, flags) = rest.split_once(" (")?;
    let flags = flags.strip_suffix("):")?;
    let digits = device.strip_prefix("disk")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || flags.contains(')') {
        return None;
    }
    let flags: Vec<&str> = flags.split(',').map(str::trim).collect();
    Some(ListHeader {
        device: device.to_string(),
        internal: flags.contains(&"internal"),
        external: flags.contains(&"external"),
    })
}

pub fn parse_info(output: &str) -> InfoFields {
    InfoFields {
        size: disk_size(output),
        media_name: field(output, "Device / Media Name:"),
        protocol: field(output, "Protocol:"),
    }
}

fn field(output: &str, key: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once(key)?;
        Some(value.trim().to_string())
    })
    .filter(|value| !value.is_empty())
}

// "Disk Size:   15.5 GB (15502147584 Bytes) ..." -> "15.5 GB"
fn disk_size(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("Disk Size:")?;
        let value = value.trim_start();
        let number_len = value
            .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
            .unwrap_or(value.len());
        if number_len == 0 {
            return None;
        }
        let (number, rest) = value.split_at(number_len);
        let rest = rest.trim_start();
        let unit_len = rest.find(|ch: char| !ch.is_ascii_uppercase()).unwrap_or(rest.len());
        if unit_len == 0 {
            return None;
        }
        Some(format!("{} {}", number, &rest[..unit_len]))
    })
}
