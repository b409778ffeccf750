use crate::{Error, Result};
use oci_spec::runtime::{Process, Spec};
use std::path::Path;

/// The OCI runtime configuration file found at the root of a bundle.
const OCI_RUNTIME_SPEC_FILE: &str = "config.json";

/// Implementation of the container environment.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    /// Build an environment from `KEY=VALUE` entries.
    ///
    /// The value is everything after the first `=`. Entries without `=` are skipped.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = Vec::<(String, String)>::new();
        for entry in entries {
            match entry.as_ref().split_once('=') {
                Some((key, value)) => vars.push((key.to_string(), value.to_string())),
                None => log::warn!(
                    "ignoring environment entry without a value: {}",
                    entry.as_ref()
                ),
            }
        }

        Environment { vars }
    }

    /// Read the process environment declared in the `config.json` of an OCI bundle.
    ///
    /// Returns `None` if the bundle declares no process environment.
    pub fn load_bundle(bundle: &Path) -> Result<Option<Self>> {
        let spec = Spec::load(&bundle.join(OCI_RUNTIME_SPEC_FILE)).map_err(Error::LoadBundle)?;
        Ok(Environment::from_process(spec.process()))
    }

    fn from_process(process: &Option<Process>) -> Option<Self> {
        process
            .as_ref()
            .and_then(|process| process.env().as_ref())
            .map(Environment::parse)
    }

    /// Append the variables of `other` after ours.
    pub fn extend(&mut self, other: Environment) {
        self.vars.extend(other.vars);
    }

    /// Iterate over the variables as `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_ref(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oci_spec::runtime::SpecBuilder;
    use tempdir::TempDir;

    #[test]
    fn test_environment_parse() {
        let environment = Environment::parse([
            "DVDI_VOLUME_NAME=data",
            "DVDI_VOLUME_OPTS=size=5,iops=10",
            "BROKEN",
        ]);

        assert_eq!(environment.len(), 2);
        assert_eq!(
            environment.iter().collect::<Vec<(&str, &str)>>(),
            vec![
                ("DVDI_VOLUME_NAME", "data"),
                ("DVDI_VOLUME_OPTS", "size=5,iops=10")
            ]
        );
    }

    #[test]
    fn test_environment_from_process() {
        let mut process = Process::default();
        process.set_env(Some(vec![
            "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
            "DVDI_VOLUME_NAME=data".to_string(),
        ]));

        let environment = Environment::from_process(&Some(process)).unwrap();

        assert_eq!(environment.len(), 2);
        assert_eq!(environment.iter().nth(1), Some(("DVDI_VOLUME_NAME", "data")));
        assert!(Environment::from_process(&None).is_none());
    }

    #[test]
    fn test_load_bundle() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("dvdi_bundle")?;

        let mut process = Process::default();
        process.set_env(Some(vec!["DVDI_VOLUME_NAME=data".to_string()]));
        SpecBuilder::default()
            .version(String::from("1.0"))
            .process(process)
            .build()?
            .save(dir.path().join(OCI_RUNTIME_SPEC_FILE))?;

        let environment = Environment::load_bundle(dir.path())?.unwrap();
        assert_eq!(environment.iter().next(), Some(("DVDI_VOLUME_NAME", "data")));

        assert!(Environment::load_bundle(&dir.path().join("missing")).is_err());

        Ok(())
    }
}
