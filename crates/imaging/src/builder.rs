use espgate_core::{Check, CommandRunner, FlashError, FlashResult, Invocation};
use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const STARTUP_SCRIPT: &str = "startup.nsh";

#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Cargo package producing the UEFI application.
    pub package: String,
    pub target: String,
    pub release: bool,
    /// Directory holding cargo's `target/` output.
    pub target_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub image_path: PathBuf,
    pub size_mib: u64,
    /// Extra files placed at the image root, relative path and contents.
    pub extra_files: Vec<(PathBuf, Vec<u8>)>,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            package: "zap".to_string(),
            target: "x86_64-unknown-uefi".to_string(),
            release: false,
            target_dir: PathBuf::from("target"),
            staging_dir: PathBuf::from("target/esp"),
            image_path: PathBuf::from("target/esp.img"),
            size_mib: 100,
            extra_files: vec![(
                PathBuf::from("hello.txt"),
                b"Hello from the filesystem!".to_vec(),
            )],
        }
    }
}

impl ImageSpec {
    pub fn profile(&self) -> &'static str {
        if self.release {
            "release"
        } else {
            "debug"
        }
    }

    /// Where cargo leaves the compiled `.efi`.
    pub fn artifact_path(&self) -> PathBuf {
        self.target_dir
            .join(&self.target)
            .join(self.profile())
            .join(format!("{}.efi", self.package))
    }

    /// Removable-media boot file name the firmware looks for.
    pub fn boot_file_name(&self) -> FlashResult<&'static str> {
        let arch = self.target.split('-').next().unwrap_or("");
        match arch {
            "x86_64" => Ok("BOOTX64.EFI"),
            "aarch64" => Ok("BOOTAA64.EFI"),
            "i686" | "i586" | "i386" => Ok("BOOTIA32.EFI"),
            "riscv64" | "riscv64gc" => Ok("BOOTRISCV64.EFI"),
            _ => Err(FlashError::UnsupportedTarget(self.target.clone())),
        }
    }

    pub fn startup_script(&self) -> FlashResult<Vec<u8>> {
        Ok(format!("\\EFI\\BOOT\\{}\r\n", self.boot_file_name()?).into_bytes())
    }
}

/// Compiles the UEFI application and packs it into a FAT-formatted raw image.
pub struct ImageBuilder<'a> {
    runner: &'a dyn CommandRunner,
    spec: &'a ImageSpec,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(runner: &'a dyn CommandRunner, spec: &'a ImageSpec) -> Self {
        Self { runner, spec }
    }

    pub fn build(&self) -> FlashResult<PathBuf> {
        self.compile()?;
        self.stage()?;
        self.assemble()?;
        let size = ensure_image(&self.spec.image_path)?;
        info!("image ready: {} ({} bytes)", self.spec.image_path.display(), size);
        Ok(self.spec.image_path.clone())
    }

    pub fn compile(&self) -> FlashResult<()> {
        let mut args = vec![
            "build".to_string(),
            "-p".to_string(),
            self.spec.package.clone(),
            "--target".to_string(),
            self.spec.target.clone(),
        ];
        if self.spec.release {
            args.push("--release".to_string());
        }
        info!("building {} for {}", self.spec.package, self.spec.target);
        self.runner.run(&Invocation::new("cargo", args), Check::Fatal)?;
        Ok(())
    }

    /// Recreates the staging tree from scratch.
    pub fn stage(&self) -> FlashResult<()> {
        let spec = self.spec;
        let artifact = spec.artifact_path();
        if !artifact.is_file() {
            return Err(FlashError::MissingArtifact(artifact));
        }
        let boot_name = spec.boot_file_name()?;

        if spec.staging_dir.exists() {
            fs::remove_dir_all(&spec.staging_dir)?;
        }
        let boot_dir = spec.staging_dir.join("EFI").join("BOOT");
        fs::create_dir_all(&boot_dir)?;

        for (relative, contents) in &spec.extra_files {
            let dest = spec.staging_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, contents)?;
        }
        fs::copy(&artifact, boot_dir.join(boot_name))?;
        fs::write(spec.staging_dir.join(STARTUP_SCRIPT), spec.startup_script()?)?;
        info!("staged {} as /EFI/BOOT/{}", artifact.display(), boot_name);
        Ok(())
    }

    /// Creates the raw container, formats it FAT and copies the staging tree in.
    pub fn assemble(&self) -> FlashResult<()> {
        let spec = self.spec;
        let image = spec.image_path.display().to_string();
        let size = format!("{}M", spec.size_mib);
        self.runner.run(
            &Invocation::new("qemu-img", ["create", "-f", "raw", image.as_str(), size.as_str()]),
            Check::Fatal,
        )?;
        self.runner.run(
            &Invocation::new("mformat", ["-i", image.as_str(), "-F", "::"]),
            Check::Fatal,
        )?;
        let mut entries = fs::read_dir(&spec.staging_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        for entry in entries {
            let entry = entry.display().to_string();
            self.runner.run(
                &Invocation::new("mcopy", ["-i", image.as_str(), "-s", entry.as_str(), "::"]),
                Check::Fatal,
            )?;
        }
        Ok(())
    }
}

/// The image must exist and be non-empty; returns its length.
pub fn ensure_image(path: &Path) -> FlashResult<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(FlashError::MissingArtifact(path.to_path_buf())),
    }
}

/// Relative paths of every file under `root`.
pub fn staged_files(root: &Path) -> FlashResult<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    collect_files(root, root, &mut files)?;
    Ok(files)
}

fn collect_files(root: &Path, current: &Path, files: &mut BTreeSet<PathBuf>) -> FlashResult<()> {
    for entry in fs::read_dir(current)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            files.insert(relative.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use espgate_core::{CommandOutput, MockCommandRunner};
    use tempfile::TempDir;

    fn spec_in(dir: &Path) -> ImageSpec {
        ImageSpec {
            target_dir: dir.join("target"),
            staging_dir: dir.join("target/esp"),
            image_path: dir.join("target/esp.img"),
            ..ImageSpec::default()
        }
    }

    fn place_artifact(spec: &ImageSpec) {
        let artifact = spec.artifact_path();
        fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        fs::write(artifact, b"MZ fake efi").unwrap();
    }

    // Stands in for the host tools: qemu-img creates the file, the rest succeed.
    fn tool_runner() -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|inv, _| {
            if let Invocation::Argv { program, args } = inv {
                if program == "qemu-img" {
                    fs::write(&args[3], vec![0u8; 4096]).unwrap();
                }
            }
            Ok(CommandOutput::success(""))
        });
        runner
    }

    #[test]
    fn derives_paths_and_boot_name() {
        let spec = ImageSpec::default();
        assert_eq!(
            spec.artifact_path(),
            PathBuf::from("target/x86_64-unknown-uefi/debug/zap.efi")
        );
        assert_eq!(spec.boot_file_name().unwrap(), "BOOTX64.EFI");
        assert_eq!(spec.startup_script().unwrap(), b"\\EFI\\BOOT\\BOOTX64.EFI\r\n".to_vec());

        let arm = ImageSpec {
            target: "aarch64-unknown-uefi".to_string(),
            release: true,
            ..ImageSpec::default()
        };
        assert_eq!(arm.boot_file_name().unwrap(), "BOOTAA64.EFI");
        assert!(arm.artifact_path().ends_with("aarch64-unknown-uefi/release/zap.efi"));

        let odd = ImageSpec {
            target: "mips-unknown-none".to_string(),
            ..ImageSpec::default()
        };
        let err = odd.boot_file_name().unwrap_err();
        assert!(matches!(err, FlashError::UnsupportedTarget(ref t) if t == "mips-unknown-none"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn staging_is_rebuilt_from_scratch() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        place_artifact(&spec);
        fs::create_dir_all(&spec.staging_dir).unwrap();
        fs::write(spec.staging_dir.join("stale.bin"), b"old").unwrap();

        let runner = MockCommandRunner::new();
        let builder = ImageBuilder::new(&runner, &spec);
        builder.stage().unwrap();
        let first = staged_files(&spec.staging_dir).unwrap();
        builder.stage().unwrap();
        let second = staged_files(&spec.staging_dir).unwrap();

        let expected: BTreeSet<PathBuf> = ["EFI/BOOT/BOOTX64.EFI", "hello.txt", "startup.nsh"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(first, expected);
        assert_eq!(first, second);
        assert_eq!(
            fs::read(spec.staging_dir.join("EFI/BOOT/BOOTX64.EFI")).unwrap(),
            b"MZ fake efi"
        );
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        let runner = MockCommandRunner::new();
        match ImageBuilder::new(&runner, &spec).stage() {
            Err(FlashError::MissingArtifact(path)) => assert_eq!(path, spec.artifact_path()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn build_runs_tools_in_order() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        place_artifact(&spec);
        let image = spec.image_path.display().to_string();
        let staging = spec.staging_dir.clone();

        let mut runner = MockCommandRunner::new();
        let mut seq = mockall::Sequence::new();
        runner
            .expect_run()
            .withf(|inv, check| {
                *check == Check::Fatal
                    && *inv
                        == Invocation::new(
                            "cargo",
                            ["build", "-p", "zap", "--target", "x86_64-unknown-uefi"],
                        )
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CommandOutput::success("")));
        let expected = image.clone();
        runner
            .expect_run()
            .withf(move |inv, _| {
                *inv == Invocation::new("qemu-img", ["create", "-f", "raw", expected.as_str(), "100M"])
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|inv, _| {
                if let Invocation::Argv { args, .. } = inv {
                    fs::write(&args[3], vec![0u8; 4096]).unwrap();
                }
                Ok(CommandOutput::success(""))
            });
        let expected = image.clone();
        runner
            .expect_run()
            .withf(move |inv, _| *inv == Invocation::new("mformat", ["-i", expected.as_str(), "-F", "::"]))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CommandOutput::success("")));
        for name in ["EFI", "hello.txt", "startup.nsh"] {
            let entry = staging.join(name).display().to_string();
            let expected = image.clone();
            runner
                .expect_run()
                .withf(move |inv, _| {
                    *inv == Invocation::new("mcopy", ["-i", expected.as_str(), "-s", entry.as_str(), "::"])
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(CommandOutput::success("")));
        }

        let built = ImageBuilder::new(&runner, &spec).build().unwrap();
        assert_eq!(built, spec.image_path);
    }

    #[test]
    fn build_failure_propagates_unchanged() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|inv, _| {
            Err(FlashError::CommandExecution {
                command: inv.printable(),
                status: Some(101),
                stdout: String::new(),
                stderr: "error[E0425]: cannot find value".to_string(),
            })
        });
        match ImageBuilder::new(&runner, &spec).build() {
            Err(FlashError::CommandExecution { status, stderr, .. }) => {
                assert_eq!(status, Some(101));
                assert!(stderr.contains("E0425"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!spec.staging_dir.exists());
    }

    #[test]
    fn silent_tool_failure_is_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        place_artifact(&spec);
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::success("")));
        match ImageBuilder::new(&runner, &spec).build() {
            Err(FlashError::MissingArtifact(path)) => assert_eq!(path, spec.image_path),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn full_build_with_stub_tools() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(dir.path());
        place_artifact(&spec);
        let runner = tool_runner();
        ImageBuilder::new(&runner, &spec).build().unwrap();
        assert_eq!(ensure_image(&spec.image_path).unwrap(), 4096);
    }

    #[test]
    fn empty_image_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("esp.img");
        assert!(matches!(ensure_image(&path), Err(FlashError::MissingArtifact(_))));
        fs::write(&path, b"").unwrap();
        assert!(matches!(ensure_image(&path), Err(FlashError::MissingArtifact(_))));
        fs::write(&path, b"x").unwrap();
        assert_eq!(ensure_image(&path).unwrap(), 1);
    }
}
