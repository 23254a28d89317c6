use serde::Serialize;

/// How the platform reports a disk's attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Removable,
    Internal,
    Unknown,
}

/// One physical block device as seen during a single enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    path: String,         // /dev/sdb, /dev/disk4
    display_path: String, // opened for writing, /dev/rdisk4 on macOS
    size: String,         // platform formatted, never renormalised
    model: String,
    transport: String,
    removable: bool,
    internal: bool,
}

impl Disk {
    /// `removable` and `internal` both come from `placement`, so they can
    /// never be asserted together. An empty model falls back to the last
    /// component of `path`.
    pub fn new(
        path: impl Into<String>,
        display_path: impl Into<String>,
        size: impl Into<String>,
        model: impl Into<String>,
        transport: impl Into<String>,
        placement: Placement,
    ) -> Self {
        let path = path.into();
        let mut model = model.into().trim().to_string();
        if model.is_empty() {
            model = device_name(&path).to_string();
        }
        Self {
            display_path: display_path.into(),
            size: size.into(),
            model,
            transport: transport.into(),
            removable: placement == Placement::Removable,
            internal: placement == Placement::Internal,
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn removable(&self) -> bool {
        self.removable
    }

    pub fn internal(&self) -> bool {
        self.internal
    }

    pub fn placement(&self) -> Placement {
        match (self.removable, self.internal) {
            (true, _) => Placement::Removable,
            (false, true) => Placement::Internal,
            (false, false) => Placement::Unknown,
        }
    }

    /// Short tag shown next to the disk in the selection table.
    pub fn tag(&self) -> &'static str {
        match self.placement() {
            Placement::Removable => "USB",
            Placement::Internal => "INTERNAL",
            Placement::Unknown => "",
        }
    }
}

/// `/dev/sdb` -> `sdb`
pub fn device_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Drops later records that repeat an earlier `path`, keeping enumeration order.
pub fn dedup_by_path(disks: Vec<Disk>) -> Vec<Disk> {
    let mut seen = std::collections::HashSet::new();
    disks
        .into_iter()
        .filter(|disk| seen.insert(disk.path.clone()))
        .collect()
}
