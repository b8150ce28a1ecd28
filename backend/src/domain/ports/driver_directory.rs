//! Driven port over the set of online drivers.
//!
//! The directory lives in process memory, so its operations are synchronous.
//! That lets relay sessions release a registration from a `Drop` guard.

use crate::domain::{Driver, DriverId, PackageSlug};

/// Registry of drivers currently able to take trips.
#[cfg_attr(test, mockall::automock)]
pub trait DriverDirectory: Send + Sync {
    /// Bring `driver_id` online for `package_slug` and return the record
    /// riders will see. Registering an id that is already online replaces its
    /// record.
    fn register(&self, driver_id: DriverId, package_slug: PackageSlug) -> Driver;

    /// Take `driver_id` offline. Returns `false` when it was not registered.
    fn unregister(&self, driver_id: &DriverId) -> bool;

    /// Ids of online drivers for `package_slug`, in registration order.
    fn find_available(&self, package_slug: PackageSlug) -> Vec<DriverId>;
}
