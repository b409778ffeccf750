use std::path::PathBuf;

/// The file holding the mount list between agent restarts.
pub const DEFAULT_MOUNT_LIST: &str = "/var/run/dvdi/mounts.json";
/// The volume driver tool.
pub const DEFAULT_DVDCLI: &str = "/usr/bin/dvdcli";
/// The driver used when a request does not name one.
pub const DEFAULT_VOLUME_DRIVER: &str = "rexray";

/// Configuration of a `VolumeIsolator`.
#[derive(Clone, Debug, PartialEq)]
pub struct IsolatorConfig {
    pub mount_list: PathBuf,
    pub dvdcli: PathBuf,
    pub default_driver: String,
    /// Refuse to start unless running as root.
    pub require_root: bool,
}

impl Default for IsolatorConfig {
    fn default() -> Self {
        IsolatorConfig {
            mount_list: PathBuf::from(DEFAULT_MOUNT_LIST),
            dvdcli: PathBuf::from(DEFAULT_DVDCLI),
            default_driver: DEFAULT_VOLUME_DRIVER.to_string(),
            require_root: true,
        }
    }
}
