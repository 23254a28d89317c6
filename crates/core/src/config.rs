use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Other(String),
}

impl Platform {
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            other => Platform::Other(other.to_string()),
        }
    }

    pub fn current() -> Self {
        Self::from_os(env::consts::OS)
    }

    /// Name shown to the operator; `Display` gives the `std::env::consts::OS` form.
    pub fn label(&self) -> &str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Other(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => f.write_str("linux"),
            Platform::MacOs => f.write_str("macos"),
            Platform::Other(name) => f.write_str(name),
        }
    }
}

/// Optional host tools whose absence changes behaviour rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSet {
    pub lsblk: bool,
    pub udisksctl: bool,
}

/// Everything about the host the pipeline depends on, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub platform: Platform,
    pub tools: ToolSet,
    /// Prefix for privileged commands (`dd`, `umount`); `None` when already root.
    pub privilege: Option<String>,
}

impl HostConfig {
    pub fn detect() -> Self {
        let search_path = env::var_os("PATH").unwrap_or_default();
        let dirs: Vec<PathBuf> = env::split_paths(&search_path).collect();
        let tools = ToolSet {
            lsblk: find_in_dirs("lsblk", &dirs).is_some(),
            udisksctl: find_in_dirs("udisksctl", &dirs).is_some(),
        };
        Self {
            platform: Platform::current(),
            tools,
            privilege: if running_as_root() { None } else { Some("sudo".to_string()) },
        }
    }

    pub fn privilege(&self) -> Option<&str> {
        self.privilege.as_deref()
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// First executable regular file named `program` in `dirs`.
pub fn find_in_dirs(program: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
