use serde::{Deserialize, Deserializer};

/// Columns requested for enumeration.
pub const LIST_COLUMNS: &str = "NAME,KNAME,TYPE,RM,SIZE,MODEL,TRAN,VENDOR";

#[derive(Debug, Deserialize)]
pub struct Lsblk {
    #[serde(default)]
    pub blockdevices: Vec<BlockDev>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockDev {
    pub name: String,
    #[serde(default)]
    pub kname: Option<String>,
    #[serde(rename = "type", default)]
    pub dtype: String,
    #[serde(default, deserialize_with = "flag")]
    pub rm: bool,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tran: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    // util-linux < 2.37
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub mountpoints: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub children: Vec<BlockDev>,
}

impl BlockDev {
    pub fn kernel_name(&self) -> &str {
        self.kname.as_deref().filter(|k| !k.is_empty()).unwrap_or(&self.name)
    }

    /// Every mount point of this node, from either lsblk schema.
    pub fn mount_points(&self) -> Vec<&str> {
        let mut points: Vec<&str> = self
            .mountpoints
            .iter()
            .flatten()
            .flatten()
            .map(String::as_str)
            .filter(|mp| !mp.is_empty())
            .collect();
        if let Some(mp) = self.mountpoint.as_deref().filter(|mp| !mp.is_empty()) {
            if !points.contains(&mp) {
                points.push(mp);
            }
        }
        points
    }
}

pub fn parse(json: &str) -> serde_json::Result<Lsblk> {
    serde_json::from_str(json)
}

/// `(name, mount point)` for every mounted descendant of the listed devices.
pub fn mounted_children(tree: &Lsblk) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for dev in &tree.blockdevices {
        collect_mounts(&dev.children, &mut out);
    }
    out
}

fn collect_mounts(nodes: &[BlockDev], out: &mut Vec<(String, String)>) {
    for node in nodes {
        for mp in node.mount_points() {
            out.push((node.name.clone(), mp.to_string()));
        }
        collect_mounts(&node.children, out);
    }
}

// lsblk has printed RM as true/false, 0/1 and "0"/"1" across releases.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(value)) => value,
        Some(Raw::Num(value)) => value != 0,
        Some(Raw::Text(value)) => matches!(value.trim(), "1" | "true"),
        None => false,
    })
}
