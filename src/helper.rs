use isolator::{IsolatorConfig, SystemExecutor, VolumeIsolator};
use std::sync::Arc;

/// Create an isolator instance working on the mount list as it is on disk.
pub fn get_isolator_instance(config: &IsolatorConfig) -> isolator::Result<VolumeIsolator> {
    VolumeIsolator::open(config.clone(), Arc::new(SystemExecutor))
}

/// Create an isolator instance with an empty ledger, to be rebuilt by a recovery.
pub fn get_recovering_isolator_instance(
    config: &IsolatorConfig,
) -> isolator::Result<VolumeIsolator> {
    VolumeIsolator::new(config.clone(), Arc::new(SystemExecutor))
}
