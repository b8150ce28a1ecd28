//! Wire-level definitions for the relay endpoints.
//!
//! Query parameters are parsed into typed connect parameters before the
//! upgrade so malformed requests fail with `400` and leave no trace in the
//! registry. Outbound frames are `{type, data}` JSON objects.

use serde::Deserialize;
use serde_json::json;

use crate::domain::{
    DomainError, Driver, DriverId, PackageSlug, RelayFrame, UserId, frame_types,
};

/// Raw query of `GET /ws/drivers`.
#[derive(Debug, Default, Deserialize)]
pub struct DriverQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    #[serde(rename = "packageSlug")]
    pub package_slug: Option<String>,
}

/// Raw query of `GET /ws/riders`.
#[derive(Debug, Default, Deserialize)]
pub struct RiderQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Validated driver connect parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConnect {
    pub driver_id: DriverId,
    pub package_slug: PackageSlug,
}

/// Validated rider connect parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiderConnect {
    pub user_id: UserId,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DomainError> {
    value.ok_or_else(|| {
        DomainError::invalid_request(format!("missing query parameter {field}"))
            .with_details(json!({ "field": field }))
    })
}

fn invalid(field: &'static str, reason: impl ToString) -> DomainError {
    DomainError::invalid_request(format!("invalid query parameter {field}"))
        .with_details(json!({ "field": field, "reason": reason.to_string() }))
}

impl TryFrom<DriverQuery> for DriverConnect {
    type Error = DomainError;

    fn try_from(query: DriverQuery) -> Result<Self, Self::Error> {
        let driver_id = DriverId::new(required(query.user_id, "userID")?)
            .map_err(|err| invalid("userID", err))?;
        let package_slug = required(query.package_slug, "packageSlug")?
            .parse::<PackageSlug>()
            .map_err(|err| invalid("packageSlug", err))?;
        Ok(Self {
            driver_id,
            package_slug,
        })
    }
}

impl TryFrom<RiderQuery> for RiderConnect {
    type Error = DomainError;

    fn try_from(query: RiderQuery) -> Result<Self, Self::Error> {
        let user_id =
            UserId::new(required(query.user_id, "userID")?).map_err(|err| invalid("userID", err))?;
        Ok(Self { user_id })
    }
}

/// First frame sent to a driver once registered.
pub fn register_frame(driver: &Driver) -> serde_json::Result<RelayFrame> {
    RelayFrame::new(frame_types::DRIVER_REGISTER, driver)
}
