use espgate_core::{Check, CommandRunner, FlashError, FlashResult, Invocation};
use log::info;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// SHA-256 of the first `len` bytes of `path` (fewer if the file is shorter).
pub fn sha256_prefix(path: &Path, len: u64) -> FlashResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file).take(len);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut hasher = Sha256::new();
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Runs `compare` (a `cmp -n <len> <image> <target>`, elevated like the write)
/// and returns the image digest when the device holds the same bytes.
///
/// `cmp` exits 1 on a difference or a short device; anything else is a tool
/// failure and keeps its `CommandExecution` form.
pub fn verify_written(
    runner: &dyn CommandRunner,
    compare: &Invocation,
    image: &Path,
    target: &str,
) -> FlashResult<String> {
    let expected = sha256_prefix(image, image.metadata()?.len())?;
    match runner.run(compare, Check::Fatal) {
        Ok(_) => {
            info!("{} matches {} (sha256 {})", target, image.display(), expected);
            Ok(expected)
        }
        Err(FlashError::CommandExecution {
            status: Some(1),
            stdout,
            stderr,
            ..
        }) => {
            let detail = [stdout.trim(), stderr.trim()]
                .into_iter()
                .find(|text| !text.is_empty())
                .unwrap_or("contents differ")
                .to_string();
            Err(FlashError::VerifyMismatch {
                target: target.to_string(),
                detail,
            })
        }
        Err(err) => Err(err),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use espgate_core::{settle, CommandOutput, MockCommandRunner};
    use mockall::predicate::{always, eq};
    use tempfile::TempDir;

    fn image_in(dir: &TempDir) -> std::path::PathBuf {
        let image = dir.path().join("esp.img");
        std::fs::write(&image, b"abc").unwrap();
        image
    }

    fn compare(image: &Path) -> Invocation {
        Invocation::new(
            "sudo",
            ["cmp", "-n", "3", image.display().to_string().as_str(), "/dev/sdb"],
        )
    }

    #[test]
    fn hashes_prefix_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"abcXYZ").unwrap();
        // sha256("abc")
        assert_eq!(
            sha256_prefix(&path, 3).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn matching_device_returns_image_digest() {
        let dir = TempDir::new().unwrap();
        let image = image_in(&dir);
        let inv = compare(&image);
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq(inv.clone()), eq(Check::Fatal))
            .times(1)
            .returning(|_, _| Ok(CommandOutput::success("")));

        assert_eq!(
            verify_written(&runner, &inv, &image, "/dev/sdb").unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn differing_device_is_a_mismatch() {
        let dir = TempDir::new().unwrap();
        let image = image_in(&dir);
        let inv = compare(&image);
        let mut runner = MockCommandRunner::new();
        runner.expect_run().with(always(), always()).returning(|inv, check| {
            let output = CommandOutput {
                status: Some(1),
                stdout: "esp.img /dev/sdb differ: byte 3, line 1\n".to_string(),
                stderr: String::new(),
            };
            settle(inv, check, output)
        });

        let err = verify_written(&runner, &inv, &image, "/dev/sdb").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "verification failed for /dev/sdb: esp.img /dev/sdb differ: byte 3, line 1"
        );
    }

    #[test]
    fn short_device_reports_cmp_stderr() {
        let dir = TempDir::new().unwrap();
        let image = image_in(&dir);
        let inv = compare(&image);
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|inv, check| settle(inv, check, CommandOutput::failure(1, "cmp: EOF on /dev/sdb")));

        match verify_written(&runner, &inv, &image, "/dev/sdb").unwrap_err() {
            FlashError::VerifyMismatch { target, detail } => {
                assert_eq!(target, "/dev/sdb");
                assert_eq!(detail, "cmp: EOF on /dev/sdb");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cmp_trouble_stays_a_command_failure() {
        let dir = TempDir::new().unwrap();
        let image = image_in(&dir);
        let inv = compare(&image);
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|inv, check| settle(inv, check, CommandOutput::failure(2, "cmp: /dev/sdb: Permission denied")));

        let err = verify_written(&runner, &inv, &image, "/dev/sdb").unwrap_err();
        assert!(matches!(err, FlashError::CommandExecution { status: Some(2), .. }));
    }
}
