use crate::environment::Environment;
use crate::mount::{contains_prohibited_chars, ExternalMount};
use crate::{Error, Result};

/// Environment variable naming the volume to mount.
pub const VOLUME_NAME_VAR: &str = "DVDI_VOLUME_NAME";
/// Environment variable naming the volume driver.
pub const VOLUME_DRIVER_VAR: &str = "DVDI_VOLUME_DRIVER";
/// Environment variable holding comma separated mount options.
pub const VOLUME_OPTS_VAR: &str = "DVDI_VOLUME_OPTS";

/// One unsuffixed slot plus the slots `1` to `9`.
const SLOTS: usize = 10;

#[derive(Default, Clone)]
struct Slot {
    volume: String,
    driver: String,
    options: String,
}

/// Return the slot addressed by `name`, given it starts with `base`.
///
/// `None` means the name only shares the prefix and does not address any slot.
fn slot_index(name: &str, base: &str) -> Option<usize> {
    match name[base.len()..].as_bytes() {
        [] => Some(0),
        [digit @ b'1'..=b'9'] => Some((digit - b'0') as usize),
        _ => None,
    }
}

/// Extract the external mounts requested through the container environment.
///
/// Every variable starting with one of the known prefixes is validated, and a single
/// prohibited value rejects the whole request. The mounts are returned in slot order,
/// slots without a volume name are skipped, duplicates are kept.
pub fn parse_requests(env: &Environment, default_driver: &str) -> Result<Vec<ExternalMount>> {
    let mut slots = vec![Slot::default(); SLOTS];

    for (name, value) in env.iter() {
        let base = [VOLUME_NAME_VAR, VOLUME_DRIVER_VAR, VOLUME_OPTS_VAR]
            .into_iter()
            .find(|base| name.starts_with(*base));

        let base = match base {
            Some(base) => base,
            None => continue,
        };

        if contains_prohibited_chars(value) {
            log::error!(
                "environment variable {} rejected because its value contains prohibited characters",
                name
            );
            return Err(Error::ProhibitedCharacters(name.to_string()));
        }

        let index = match slot_index(name, base) {
            Some(index) => index,
            None => {
                log::debug!("ignoring environment variable {}", name);
                continue;
            }
        };

        let slot = &mut slots[index];
        match base {
            VOLUME_NAME_VAR => {
                log::info!("external volume name ({}) parsed from environment", value);
                slot.volume = value.to_string();
            }
            VOLUME_DRIVER_VAR => slot.driver = value.to_string(),
            _ => slot.options = value.to_string(),
        }
    }

    Ok(slots
        .iter()
        .filter(|slot| !slot.volume.is_empty())
        .map(|slot| ExternalMount::new(&slot.driver, &slot.volume, &slot.options, default_driver))
        .collect())
}
