//! In-memory registry of online drivers.
//!
//! Entries are kept in a `Vec` behind a `RwLock` so matching returns drivers
//! in the order they came online. Profile generation and geohashing happen
//! before the write lock is taken; the lock only covers the mutation.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::driver::{Driver, DriverProfileGenerator};
use super::fare::PackageSlug;
use super::geo::{DRIVER_GEOHASH_PRECISION, geohash};
use super::identity::DriverId;
use super::ports::DriverDirectory;

/// Process-wide set of online drivers.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use dispatch_backend::domain::{
///     DriverId, DriverRegistry, PackageSlug, SeededProfileGenerator,
/// };
/// use dispatch_backend::domain::ports::DriverDirectory;
///
/// let registry = DriverRegistry::new(Arc::new(SeededProfileGenerator::from_seed(1)));
/// let id = DriverId::new("driver-1").expect("valid id");
/// registry.register(id.clone(), PackageSlug::Sedan);
/// assert_eq!(registry.find_available(PackageSlug::Sedan), vec![id]);
/// assert!(registry.find_available(PackageSlug::Suv).is_empty());
/// ```
pub struct DriverRegistry {
    drivers: RwLock<Vec<Driver>>,
    profiles: Arc<dyn DriverProfileGenerator>,
}

impl DriverRegistry {
    /// Create an empty registry drawing profiles from `profiles`.
    pub fn new(profiles: Arc<dyn DriverProfileGenerator>) -> Self {
        Self {
            drivers: RwLock::new(Vec::new()),
            profiles,
        }
    }

    /// Snapshot of one driver's record.
    pub fn get(&self, driver_id: &DriverId) -> Option<Driver> {
        let drivers = self.drivers.read().unwrap_or_else(PoisonError::into_inner);
        drivers.iter().find(|d| &d.id == driver_id).cloned()
    }

    /// Number of online drivers.
    pub fn len(&self) -> usize {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no driver is online.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("online", &self.len())
            .finish_non_exhaustive()
    }
}

impl DriverDirectory for DriverRegistry {
    fn register(&self, driver_id: DriverId, package_slug: PackageSlug) -> Driver {
        let profile = self.profiles.generate(&driver_id, package_slug);
        let cell = geohash(profile.location, DRIVER_GEOHASH_PRECISION).unwrap_or_else(|error| {
            warn!(driver_id = %driver_id, error = %error, "driver location has no geohash");
            String::new()
        });
        let driver = Driver {
            geohash: cell,
            id: driver_id,
            name: profile.name,
            profile_picture: profile.profile_picture,
            car_plate: profile.car_plate,
            package_slug,
            location: profile.location,
        };

        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);
        match drivers.iter_mut().find(|d| d.id == driver.id) {
            Some(existing) => {
                debug!(driver_id = %driver.id, "replacing existing driver registration");
                *existing = driver.clone();
            }
            None => drivers.push(driver.clone()),
        }
        let online = drivers.len();
        drop(drivers);

        info!(
            driver_id = %driver.id,
            package_slug = %package_slug,
            geohash = %driver.geohash,
            online,
            "driver registered"
        );
        driver
    }

    fn unregister(&self, driver_id: &DriverId) -> bool {
        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);
        let before = drivers.len();
        drivers.retain(|d| &d.id != driver_id);
        let removed = drivers.len() != before;
        drop(drivers);

        if removed {
            info!(driver_id = %driver_id, "driver unregistered");
        } else {
            debug!(driver_id = %driver_id, "unregister ignored for unknown driver");
        }
        removed
    }

    fn find_available(&self, package_slug: PackageSlug) -> Vec<DriverId> {
        let drivers = self.drivers.read().unwrap_or_else(PoisonError::into_inner);
        drivers
            .iter()
            .filter(|d| d.package_slug == package_slug)
            .map(|d| d.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::driver::{DEFAULT_DRIVER_NAME, DriverProfile, MockDriverProfileGenerator};
    use crate::domain::{Coordinate, SeededProfileGenerator};

    fn id(raw: &str) -> DriverId {
        DriverId::new(raw).expect("valid driver id")
    }

    #[fixture]
    fn registry() -> Arc<DriverRegistry> {
        Arc::new(DriverRegistry::new(Arc::new(
            SeededProfileGenerator::from_seed(7),
        )))
    }

    #[test]
    fn register_uses_generated_profile_and_geohash() {
        let mut profiles = MockDriverProfileGenerator::new();
        profiles.expect_generate().times(1).returning(|_, _| DriverProfile {
            name: DEFAULT_DRIVER_NAME.to_owned(),
            profile_picture: "https://example.test/a.jpg".to_owned(),
            car_plate: "ABC-123".to_owned(),
            location: Coordinate {
                latitude: 57.64911,
                longitude: 10.40744,
            },
        });
        let registry = DriverRegistry::new(Arc::new(profiles));

        let driver = registry.register(id("d1"), PackageSlug::Suv);

        assert_eq!(driver.geohash, "u4pruydqq");
        assert_eq!(driver.car_plate, "ABC-123");
        assert_eq!(registry.get(&id("d1")), Some(driver));
    }

    #[rstest]
    fn re_registering_keeps_ids_unique_and_position(registry: Arc<DriverRegistry>) {
        registry.register(id("d1"), PackageSlug::Suv);
        registry.register(id("d2"), PackageSlug::Suv);
        registry.register(id("d1"), PackageSlug::Suv);

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.find_available(PackageSlug::Suv),
            vec![id("d1"), id("d2")]
        );
    }

    #[rstest]
    fn re_registering_can_change_tier(registry: Arc<DriverRegistry>) {
        registry.register(id("d1"), PackageSlug::Suv);
        registry.register(id("d1"), PackageSlug::Van);

        assert!(registry.find_available(PackageSlug::Suv).is_empty());
        assert_eq!(registry.find_available(PackageSlug::Van), vec![id("d1")]);
    }

    #[rstest]
    fn matching_filters_by_tier_in_insertion_order(registry: Arc<DriverRegistry>) {
        registry.register(id("a"), PackageSlug::Suv);
        registry.register(id("b"), PackageSlug::Sedan);
        registry.register(id("c"), PackageSlug::Suv);

        assert_eq!(
            registry.find_available(PackageSlug::Suv),
            vec![id("a"), id("c")]
        );
        assert_eq!(registry.find_available(PackageSlug::Sedan), vec![id("b")]);
        assert_eq!(registry.find_available(PackageSlug::Luxury), Vec::new());
    }

    #[rstest]
    fn unregister_removes_only_the_named_driver(registry: Arc<DriverRegistry>) {
        registry.register(id("a"), PackageSlug::Suv);
        registry.register(id("b"), PackageSlug::Suv);

        assert!(registry.unregister(&id("a")));
        assert!(!registry.unregister(&id("a")));
        assert!(!registry.unregister(&id("missing")));
        assert_eq!(registry.find_available(PackageSlug::Suv), vec![id("b")]);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_registrations_are_all_recorded(registry: Arc<DriverRegistry>) {
        const DRIVERS: usize = 1000;

        let tasks: Vec<_> = (0..DRIVERS)
            .map(|n| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let slug = PackageSlug::ALL[n % PackageSlug::ALL.len()];
                    registry.register(id(&format!("driver-{n}")), slug);
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("registration task completes");
        }

        assert_eq!(registry.len(), DRIVERS);

        let lookups: Vec<_> = (0..DRIVERS)
            .map(|n| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let slug = PackageSlug::ALL[n % PackageSlug::ALL.len()];
                    (slug, registry.find_available(slug))
                })
            })
            .collect();
        let mut by_tier: HashMap<PackageSlug, Vec<DriverId>> = HashMap::new();
        for lookup in lookups {
            let (slug, found) = lookup.await.expect("lookup task completes");
            let first = by_tier.entry(slug).or_insert_with(|| found.clone());
            assert_eq!(*first, found, "lookups for {slug} disagree");
        }

        let mut seen: HashMap<DriverId, usize> = HashMap::new();
        for found in by_tier.into_values() {
            for driver_id in found {
                *seen.entry(driver_id).or_default() += 1;
            }
        }
        assert_eq!(seen.len(), DRIVERS);
        assert!(seen.values().all(|count| *count == 1));
        let expected: HashSet<DriverId> =
            (0..DRIVERS).map(|n| id(&format!("driver-{n}"))).collect();
        assert_eq!(seen.into_keys().collect::<HashSet<_>>(), expected);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_register_and_unregister_leave_no_residue(registry: Arc<DriverRegistry>) {
        const DRIVERS: usize = 1000;

        let tasks: Vec<_> = (0..DRIVERS)
            .map(|n| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let driver_id = id(&format!("driver-{n}"));
                    registry.register(driver_id.clone(), PackageSlug::Sedan);
                    let _ = registry.find_available(PackageSlug::Sedan);
                    assert!(registry.unregister(&driver_id));
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("task completes");
        }

        assert!(registry.is_empty());
    }
}
