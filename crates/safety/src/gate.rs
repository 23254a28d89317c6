use espgate_core::{Disk, FlashError, FlashResult, Prompt};
use log::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDecision {
    Allow,
    Deny(String),
}

/// Proof that the operator agreed to erase exactly this disk.
///
/// Only `confirm_destruction` builds one, and the disk cannot be swapped
/// afterwards: the flash step reads its target from here.
#[derive(Debug)]
pub struct Authorization {
    disk: Disk,
}

impl Authorization {
    pub fn disk(&self) -> &Disk {
        &self.disk
    }
}

pub fn challenge_phrase(disk: &Disk) -> String {
    format!("ERASE {}", disk.path())
}

/// Exact, case-sensitive comparison against the challenge phrase.
pub fn evaluate_response(disk: &Disk, response: Option<&str>) -> SafetyDecision {
    let Some(response) = response else {
        return SafetyDecision::Deny("no confirmation given".to_string());
    };
    if response == challenge_phrase(disk) {
        SafetyDecision::Allow
    } else {
        SafetyDecision::Deny(format!("confirmation did not match for {}", disk.path()))
    }
}

/// Single-attempt confirmation. With `auto_yes` the warning is still shown
/// but nothing is asked.
pub fn confirm_destruction(disk: Disk, auto_yes: bool, prompt: &mut dyn Prompt) -> FlashResult<Authorization> {
    prompt.say("");
    prompt.say("WARNING: This will ERASE all data on:");
    prompt.say(&format!("  {}  ({}, {})", disk.path(), disk.size(), disk.model()));
    prompt.say("");
    if auto_yes {
        warn!("confirmation skipped (--yes) for {}", disk.path());
        return Ok(Authorization { disk });
    }
    let phrase = challenge_phrase(&disk);
    let response = prompt.ask(&format!("Type '{}' to continue: ", phrase))?;
    match evaluate_response(&disk, response.as_deref()) {
        SafetyDecision::Allow => {
            info!("erase of {} confirmed", disk.path());
            Ok(Authorization { disk })
        }
        SafetyDecision::Deny(reason) => {
            prompt.say("Aborted.");
            Err(FlashError::UserAbort(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espgate_core::{Placement, ScriptedPrompt};

    fn stick() -> Disk {
        Disk::new("/dev/sdb", "/dev/sdb", "14.9G", "SanDisk", "usb", Placement::Removable)
    }

    #[test]
    fn phrase_comes_from_path() {
        assert_eq!(challenge_phrase(&stick()), "ERASE /dev/sdb");
    }

    #[test]
    fn only_exact_phrase_allows() {
        let disk = stick();
        assert_eq!(evaluate_response(&disk, Some("ERASE /dev/sdb")), SafetyDecision::Allow);
        for bad in [
            "erase /dev/sdb",
            "ERASE /dev/sdb ",
            " ERASE /dev/sdb",
            "ERASE /dev/sd",
            "ERASE  /dev/sdb",
            "ERASE /dev/sdc",
            "",
        ] {
            assert!(
                matches!(evaluate_response(&disk, Some(bad)), SafetyDecision::Deny(_)),
                "accepted {:?}",
                bad
            );
        }
        assert!(matches!(evaluate_response(&disk, None), SafetyDecision::Deny(_)));
    }

    #[test]
    fn typed_phrase_authorizes_same_disk() {
        let mut prompt = ScriptedPrompt::new(["ERASE /dev/sdb"]);
        let auth = confirm_destruction(stick(), false, &mut prompt).unwrap();
        assert_eq!(auth.disk(), &stick());
        assert_eq!(prompt.asked, 1);
        assert!(prompt.saw("Type 'ERASE /dev/sdb' to continue"));
        assert!(prompt.saw("WARNING: This will ERASE all data on:"));
    }

    #[test]
    fn lowercase_phrase_aborts_with_code_3() {
        let mut prompt = ScriptedPrompt::new(["erase /dev/sdb", "ERASE /dev/sdb"]);
        let err = confirm_destruction(stick(), false, &mut prompt).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(prompt.asked, 1);
        assert!(prompt.saw("Aborted."));
    }

    #[test]
    fn auto_yes_skips_prompt() {
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new());
        let auth = confirm_destruction(stick(), true, &mut prompt).unwrap();
        assert_eq!(auth.disk().path(), "/dev/sdb");
        assert_eq!(prompt.asked, 0);
        assert!(prompt.saw("/dev/sdb  (14.9G, SanDisk)"));
    }
}
