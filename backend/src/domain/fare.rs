//! Vehicle tiers and fare pricing.
//!
//! Pricing is linear: a tier base price plus per-metre and per-second rates.
//! [`estimate_price`] is a pure function of its inputs; fares are rounded to
//! whole cents only when persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::geo::Route;
use super::identity::UserId;
use super::trip::RideFareId;

/// Vehicle tier offered to riders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackageSlug {
    Suv,
    Sedan,
    Van,
    Luxury,
}

impl PackageSlug {
    /// Every tier in the order fares are quoted.
    pub const ALL: [PackageSlug; 4] = [Self::Suv, Self::Sedan, Self::Van, Self::Luxury];

    /// Wire spelling of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suv => "suv",
            Self::Sedan => "sedan",
            Self::Van => "van",
            Self::Luxury => "luxury",
        }
    }
}

impl fmt::Display for PackageSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown tier name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown package slug: {0}")]
pub struct UnknownPackageSlug(pub String);

impl FromStr for PackageSlug {
    type Err = UnknownPackageSlug;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slug| slug.as_str() == s)
            .ok_or_else(|| UnknownPackageSlug(s.to_owned()))
    }
}

/// Per-unit rates applied on top of the tier base price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    /// Price per metre of route distance.
    pub price_per_distance_unit: f64,
    /// Price per second of route duration.
    pub price_per_time_unit: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_distance_unit: 1.5,
            price_per_time_unit: 0.25,
        }
    }
}

/// Base price of a tier in cents.
pub fn base_price(slug: PackageSlug) -> f64 {
    match slug {
        PackageSlug::Suv => 200.0,
        PackageSlug::Sedan => 350.0,
        PackageSlug::Van => 400.0,
        PackageSlug::Luxury => 1000.0,
    }
}

/// Unrounded price of a tier over `route`.
///
/// # Examples
/// ```
/// use dispatch_backend::domain::{PackageSlug, PricingConfig, Route, estimate_price};
///
/// let route = Route { polyline: Vec::new(), distance: 10.0, duration: 5.0 };
/// let price = estimate_price(PackageSlug::Suv, &route, &PricingConfig::default());
/// assert_eq!(price, 216.25);
/// ```
pub fn estimate_price(slug: PackageSlug, route: &Route, pricing: &PricingConfig) -> f64 {
    base_price(slug)
        + route.distance * pricing.price_per_distance_unit
        + route.duration * pricing.price_per_time_unit
}

/// Round a price in cents to a whole cent, half away from zero.
///
/// # Examples
/// ```
/// use dispatch_backend::domain::round_cents;
///
/// assert_eq!(round_cents(216.25), 216.0);
/// assert_eq!(round_cents(216.5), 217.0);
/// ```
pub fn round_cents(value: f64) -> f64 {
    value.round()
}

/// Quoted price for one tier, owned by the rider who previewed it.
///
/// Fares are immutable once the preview returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RideFare {
    pub id: RideFareId,
    pub user_id: UserId,
    pub package_slug: PackageSlug,
    /// Whole cents.
    #[schema(example = 216.0)]
    pub total_price_cents: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}
