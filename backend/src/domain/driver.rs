//! Driver records and the profile generator used at registration.
//!
//! A connecting driver only tells us who they are and which tier they drive.
//! Everything else shown to riders (start point, plate, avatar, name) comes
//! from a [`DriverProfileGenerator`] so tests can pin it down.

use std::sync::{Mutex, PoisonError};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::fare::PackageSlug;
use super::geo::Coordinate;
use super::identity::DriverId;
use super::trip::TripDriver;

/// Display name given to every generated driver.
pub const DEFAULT_DRIVER_NAME: &str = "Lando Norris";

/// Start points drivers are placed at when they come online.
pub const START_POINTS: [Coordinate; 8] = [
    Coordinate {
        latitude: 37.7749,
        longitude: -122.4194,
    },
    Coordinate {
        latitude: 37.7858,
        longitude: -122.4064,
    },
    Coordinate {
        latitude: 37.7599,
        longitude: -122.4148,
    },
    Coordinate {
        latitude: 37.8024,
        longitude: -122.4058,
    },
    Coordinate {
        latitude: 37.7694,
        longitude: -122.4862,
    },
    Coordinate {
        latitude: 37.7946,
        longitude: -122.3999,
    },
    Coordinate {
        latitude: 37.7562,
        longitude: -122.4416,
    },
    Coordinate {
        latitude: 37.7793,
        longitude: -122.3892,
    },
];

const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ";

/// An online driver as held by the registry and shown to riders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub profile_picture: String,
    pub car_plate: String,
    pub package_slug: PackageSlug,
    pub location: Coordinate,
    pub geohash: String,
}

impl From<&Driver> for TripDriver {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id.clone(),
            name: driver.name.clone(),
            profile_picture: driver.profile_picture.clone(),
            car_plate: driver.car_plate.clone(),
        }
    }
}

/// Generated presentation attributes for a newly registered driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverProfile {
    pub name: String,
    pub profile_picture: String,
    pub car_plate: String,
    pub location: Coordinate,
}

/// Source of driver presentation attributes.
#[cfg_attr(test, mockall::automock)]
pub trait DriverProfileGenerator: Send + Sync {
    /// Produce a profile for `driver_id` driving `package_slug`.
    fn generate(&self, driver_id: &DriverId, package_slug: PackageSlug) -> DriverProfile;
}

/// Random profiles from a [`SmallRng`]; seed it for reproducible output.
///
/// # Examples
/// ```
/// use dispatch_backend::domain::{
///     DriverId, DriverProfileGenerator, PackageSlug, SeededProfileGenerator,
/// };
///
/// let id = DriverId::new("driver-1").expect("valid id");
/// let a = SeededProfileGenerator::from_seed(7).generate(&id, PackageSlug::Suv);
/// let b = SeededProfileGenerator::from_seed(7).generate(&id, PackageSlug::Suv);
/// assert_eq!(a, b);
/// ```
#[derive(Debug)]
pub struct SeededProfileGenerator {
    rng: Mutex<SmallRng>,
}

impl SeededProfileGenerator {
    /// Deterministic generator.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Generator seeded from operating system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }
}

impl DriverProfileGenerator for SeededProfileGenerator {
    fn generate(&self, _driver_id: &DriverId, _package_slug: PackageSlug) -> DriverProfile {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let index = rng.gen_range(0..START_POINTS.len());
        let car_plate = random_plate(&mut *rng);
        DriverProfile {
            name: DEFAULT_DRIVER_NAME.to_owned(),
            profile_picture: avatar_url(index),
            car_plate,
            location: START_POINTS[index],
        }
    }
}

/// Avatar picture for the start point at `index`.
pub fn avatar_url(index: usize) -> String {
    format!("https://randomuser.me/api/portraits/lego/{}.jpg", index % 10)
}

fn random_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let letters: String = (0..3)
        .map(|_| char::from(PLATE_LETTERS[rng.gen_range(0..PLATE_LETTERS.len())]))
        .collect();
    let digits: u16 = rng.gen_range(0..1000);
    format!("{letters}-{digits:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn driver_id() -> DriverId {
        DriverId::new("driver-1").expect("valid driver id")
    }

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(u64::MAX)]
    fn generated_profiles_use_the_route_table(#[case] seed: u64) {
        let generator = SeededProfileGenerator::from_seed(seed);
        for _ in 0..32 {
            let profile = generator.generate(&driver_id(), PackageSlug::Sedan);
            assert!(START_POINTS.contains(&profile.location));
            assert_eq!(profile.name, DEFAULT_DRIVER_NAME);
            assert!(profile.profile_picture.starts_with("https://"));
        }
    }

    #[test]
    fn plates_have_three_letters_and_three_digits() {
        let generator = SeededProfileGenerator::from_seed(9);
        let plate = generator.generate(&driver_id(), PackageSlug::Van).car_plate;
        let (letters, digits) = plate.split_once('-').expect("plate has a separator");
        assert_eq!(letters.len(), 3);
        assert!(letters.bytes().all(|b| PLATE_LETTERS.contains(&b)));
        assert_eq!(digits.len(), 3);
        assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let left = SeededProfileGenerator::from_seed(1234);
        let right = SeededProfileGenerator::from_seed(1234);
        for _ in 0..8 {
            assert_eq!(
                left.generate(&driver_id(), PackageSlug::Suv),
                right.generate(&driver_id(), PackageSlug::Suv)
            );
        }
    }

    #[test]
    fn trip_driver_projection_keeps_presentation_fields() {
        let driver = Driver {
            id: driver_id(),
            name: DEFAULT_DRIVER_NAME.to_owned(),
            profile_picture: avatar_url(3),
            car_plate: "ABC-123".to_owned(),
            package_slug: PackageSlug::Luxury,
            location: START_POINTS[3],
            geohash: "9q8zn".to_owned(),
        };
        let projected = TripDriver::from(&driver);
        assert_eq!(projected.id, driver.id);
        assert_eq!(projected.car_plate, "ABC-123");
    }
}
