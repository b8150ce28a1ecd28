//! Scoped driver registration for relay sessions.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::DriverDirectory;
use crate::domain::{Driver, DriverId, PackageSlug};

/// Registers a driver on creation and unregisters it when dropped.
///
/// Dropping covers every way a session ends: a clean close, a read error,
/// a panic in the session task, or the task being aborted.
pub struct DriverRegistration {
    directory: Arc<dyn DriverDirectory>,
    driver: Driver,
}

impl DriverRegistration {
    /// Register `driver_id` for `package_slug` until the guard is dropped.
    pub fn acquire(
        directory: Arc<dyn DriverDirectory>,
        driver_id: DriverId,
        package_slug: PackageSlug,
    ) -> Self {
        let driver = directory.register(driver_id, package_slug);
        Self { directory, driver }
    }

    /// The record stored at registration time.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl Drop for DriverRegistration {
    fn drop(&mut self) {
        let removed = self.directory.unregister(&self.driver.id);
        debug!(driver_id = %self.driver.id, removed, "driver registration released");
    }
}
