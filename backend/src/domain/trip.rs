//! Trip aggregate and server-generated identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::fare::RideFare;
use super::identity::{DriverId, UserId};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        #[schema(value_type = String, format = Uuid)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Borrow the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Identifier of a [`Trip`].
    TripId
}

uuid_id! {
    /// Identifier of a [`RideFare`].
    RideFareId
}

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TripStatus {
    Pending,
    Assigned,
    Cancelled,
    Completed,
}

/// Driver details attached to a trip once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripDriver {
    pub id: DriverId,
    pub name: String,
    pub profile_picture: String,
    pub car_plate: String,
}

/// A rider's request to travel on a previously quoted fare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub user_id: UserId,
    pub status: TripStatus,
    pub fare: RideFare,
    #[serde(default)]
    pub driver: Option<TripDriver>,
}

impl Trip {
    /// Open a new pending trip for the fare's owner.
    pub fn pending(fare: RideFare) -> Self {
        Self {
            id: TripId::random(),
            user_id: fare.user_id.clone(),
            status: TripStatus::Pending,
            fare,
            driver: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PackageSlug;

    #[test]
    fn pending_trip_copies_fare_owner() {
        let fare = RideFare {
            id: RideFareId::random(),
            user_id: UserId::new("rider-1").expect("valid user id"),
            package_slug: PackageSlug::Van,
            total_price_cents: 400.0,
            route: None,
        };
        let trip = Trip::pending(fare.clone());
        assert_eq!(trip.status, TripStatus::Pending);
        assert_eq!(trip.user_id, fare.user_id);
        assert!(trip.driver.is_none());
        assert_eq!(trip.fare, fare);
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let id = TripId::random();
        let parsed: TripId = id.to_string().parse().expect("uuid parses");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<RideFareId>().is_err());
    }
}
