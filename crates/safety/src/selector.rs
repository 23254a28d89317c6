use espgate_core::{Disk, FlashError, FlashResult, Prompt};
use log::debug;
use std::fmt;

/// Disks the operator may pick: removable ones, or every disk with `include_internal`.
pub fn eligible(disks: &[Disk], include_internal: bool) -> Vec<Disk> {
    disks
        .iter()
        .filter(|disk| disk.removable() || include_internal)
        .cloned()
        .collect()
}

/// Why a typed index was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    NotANumber,
    OutOfRange { index: usize, count: usize },
}

impl fmt::Display for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retry::NotANumber => write!(f, "Enter a valid index."),
            Retry::OutOfRange { index, count } => {
                write!(f, "Index out of range ({} not in 0..{}).", index, count)
            }
        }
    }
}

pub fn parse_selection(raw: &str, count: usize) -> Result<usize, Retry> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Retry::NotANumber);
    }
    let index = raw
        .parse::<usize>()
        .map_err(|_| Retry::OutOfRange { index: usize::MAX, count })?;
    if index < count {
        Ok(index)
    } else {
        Err(Retry::OutOfRange { index, count })
    }
}

pub fn render_table(candidates: &[Disk]) -> Vec<String> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, disk)| {
            format!(
                "  [{}] {:12} {:>8}  {}  {}",
                idx,
                disk.path(),
                disk.size(),
                disk.model(),
                disk.tag()
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

/// Lists the eligible disks and asks until a valid index is typed.
pub fn choose_disk(disks: &[Disk], include_internal: bool, prompt: &mut dyn Prompt) -> FlashResult<Disk> {
    let mut candidates = eligible(disks, include_internal);
    if candidates.is_empty() {
        return Err(FlashError::Discovery(
            "No suitable disks found. Try --include-internal to show all.".to_string(),
        ));
    }
    prompt.say("Available disks:");
    for line in render_table(&candidates) {
        prompt.say(&line);
    }
    loop {
        let Some(raw) = prompt.ask("Select disk index to flash: ")? else {
            return Err(FlashError::UserAbort("no disk selected".to_string()));
        };
        match parse_selection(&raw, candidates.len()) {
            Ok(index) => {
                debug!("selected index {}", index);
                return Ok(candidates.swap_remove(index));
            }
            Err(retry) => prompt.say(&retry.to_string()),
        }
    }
}
