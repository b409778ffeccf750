use std::fmt;

/// Characters refused in any value that ends up on the `dvdcli` command line.
pub const PROHIBITED_CHARS: [char; 20] = [
    '%', '/', ':', ';', '\0', '<', '>', '|', '`', '$', '\'', '?', '+', '&', '\\', '"', ' ', '\t',
    '\r', '\n',
];

/// Check if a value contains any of the `PROHIBITED_CHARS`.
pub fn contains_prohibited_chars(value: &str) -> bool {
    value.contains(&PROHIBITED_CHARS[..])
}

/// `MountIdentity` is what makes two mount requests refer to the same attachment.
///
/// Mount options are not part of it: two requests that only differ by their options
/// share the attachment made by whichever of them was attached first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountIdentity {
    pub driver: String,
    pub volume: String,
}

impl fmt::Display for MountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.driver, self.volume)
    }
}

/// `ExternalMount` describes an external volume attached to the host through a volume driver.
///
/// The driver name stored here is always the effective one, the default driver has already
/// been substituted when the request did not name one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalMount {
    /// The volume driver name, such as `rexray`.
    pub driver: String,
    /// The volume name, never empty once the mount is in the ledger.
    pub volume: String,
    /// Comma separated driver options, may be empty.
    pub options: String,
}

impl ExternalMount {
    /// Build a mount, falling back to `default_driver` when `driver` is empty.
    pub fn new(driver: &str, volume: &str, options: &str, default_driver: &str) -> Self {
        let driver = if driver.is_empty() {
            default_driver
        } else {
            driver
        };

        ExternalMount {
            driver: driver.to_string(),
            volume: volume.to_string(),
            options: options.to_string(),
        }
    }

    pub fn identity(&self) -> MountIdentity {
        MountIdentity {
            driver: self.driver.clone(),
            volume: self.volume.clone(),
        }
    }

    /// The mount options split into tokens, empty tokens skipped.
    pub fn option_tokens(&self) -> impl Iterator<Item = &str> {
        self.options.split(',').filter(|token| !token.is_empty())
    }
}

impl fmt::Display for ExternalMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "driver={} volume={} options={}",
            self.driver, self.volume, self.options
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_driver_is_substituted() {
        let mount = ExternalMount::new("", "vol1", "", "rexray");
        assert_eq!(mount.driver, "rexray");

        let mount = ExternalMount::new("nfs", "vol1", "", "rexray");
        assert_eq!(mount.driver, "nfs");
    }

    #[test]
    fn test_identity_ignores_options() {
        let a = ExternalMount::new("d1", "v1", "size=5", "rexray");
        let b = ExternalMount::new("d1", "v1", "size=10,iops=100", "rexray");
        let c = ExternalMount::new("d2", "v1", "size=5", "rexray");

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn test_explicit_default_driver_matches_implicit_one() {
        let implicit = ExternalMount::new("", "v1", "", "rexray");
        let explicit = ExternalMount::new("rexray", "v1", "", "rexray");
        assert_eq!(implicit.identity(), explicit.identity());
    }

    #[test]
    fn test_option_tokens() {
        let mount = ExternalMount::new("d1", "v1", "size=5,,iops=10", "rexray");
        assert_eq!(
            mount.option_tokens().collect::<Vec<&str>>(),
            vec!["size=5", "iops=10"]
        );

        let mount = ExternalMount::new("d1", "v1", "", "rexray");
        assert_eq!(mount.option_tokens().count(), 0);
    }

    #[test]
    fn test_prohibited_chars() {
        assert!(!contains_prohibited_chars("size=5,iops=10"));
        assert!(!contains_prohibited_chars("my-volume_1.data"));
        assert!(contains_prohibited_chars("vol;rm -rf"));
        assert!(contains_prohibited_chars("$(whoami)"));
        assert!(contains_prohibited_chars("a b"));
        assert!(contains_prohibited_chars("../etc"));
    }
}
