use crate::ledger::Ledger;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Build the path of a file living next to `path`, named after it with `.suffix` appended.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// `MountRecord` is the persisted form of one ledger entry.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MountRecord {
    #[serde(rename = "containerid")]
    pub container_id: String,
    #[serde(rename = "volumedriver")]
    pub driver: String,
    #[serde(rename = "volumename")]
    pub volume: String,
    #[serde(rename = "mountoptions")]
    pub options: String,
}

/// `MountList` is the content of the mount list file, a snapshot of the whole ledger.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MountList {
    pub mounts: Vec<MountRecord>,
}

impl MountList {
    /// Load the mount list from a file.
    ///
    /// A missing or malformed file gives an empty list, and records missing a field are skipped.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("no mount list found at {}", path.display());
                return MountList::default();
            }
            Err(e) => {
                log::warn!("failed to read mount list {}: {}", path.display(), e);
                return MountList::default();
            }
        };

        let value = match serde_json::from_str::<Value>(&content) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("failed to parse mount list {}: {}", path.display(), e);
                return MountList::default();
            }
        };

        let records = match value.get("mounts").and_then(Value::as_array) {
            Some(records) => records,
            None => {
                log::warn!("mount list {} has no mounts array", path.display());
                return MountList::default();
            }
        };

        let mounts = records
            .iter()
            .filter_map(|record| {
                serde_json::from_value::<MountRecord>(record.clone())
                    .map_err(|e| log::warn!("skipping mount record {}: {}", record, e))
                    .ok()
            })
            .collect::<Vec<MountRecord>>();

        log::debug!(
            "parsed {} and found {} mount records",
            path.display(),
            mounts.len()
        );

        MountList { mounts }
    }

    /// Save the mount list into the file.
    ///
    /// The content is written to `<path>.tmp` which then replaces `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self).map_err(Error::SerializeLedger)?;

        let tmp_path = sibling_path(path, "tmp");
        File::create(&tmp_path)
            .and_then(|mut file| file.write_all(serialized.as_bytes()))
            .map_err(Error::PersistLedger)?;

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Error::PersistLedger(e)
        })
    }
}

impl From<&Ledger> for MountList {
    fn from(ledger: &Ledger) -> Self {
        MountList {
            mounts: ledger
                .iter()
                .map(|(container, mount)| MountRecord {
                    container_id: container.to_string(),
                    driver: mount.driver.clone(),
                    volume: mount.volume.clone(),
                    options: mount.options.clone(),
                })
                .collect(),
        }
    }
}
