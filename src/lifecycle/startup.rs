//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any descriptor build error is fatal
//! - Descriptors are all built before the first deploy

use crate::config::{ConfigError, RouterConfig};
use crate::container::ApplicationContainer;

/// Deploy every configured application. Returns how many were deployed.
pub fn deploy_all(
    config: &RouterConfig,
    container: &ApplicationContainer,
) -> Result<usize, ConfigError> {
    let descriptors = config.build_descriptors()?;
    let count = descriptors.len();
    for descriptor in descriptors {
        container.deploy(descriptor);
    }
    tracing::info!(applications = count, "Applications deployed");
    Ok(count)
}
