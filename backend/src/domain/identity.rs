//! Caller-supplied subject identifiers.
//!
//! Riders and drivers identify themselves with opaque strings chosen by the
//! client (the relay receives them as connection parameters). The domain only
//! insists they are non-blank and carry no surrounding whitespace, so two
//! spellings of the same id can never coexist in the registry.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum accepted identifier length in characters.
pub const SUBJECT_ID_MAX: usize = 128;

/// Validation errors returned when constructing subject identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectIdValidationError {
    /// The identifier was empty or whitespace only.
    #[error("identifier must not be empty")]
    Empty,
    /// The identifier had leading or trailing whitespace.
    #[error("identifier must not contain surrounding whitespace")]
    SurroundingWhitespace,
    /// The identifier exceeded [`SUBJECT_ID_MAX`].
    #[error("identifier must be at most {max} characters")]
    TooLong { max: usize },
}

fn validate_subject_id(raw: &str) -> Result<(), SubjectIdValidationError> {
    if raw.trim().is_empty() {
        return Err(SubjectIdValidationError::Empty);
    }
    if raw.trim() != raw {
        return Err(SubjectIdValidationError::SurroundingWhitespace);
    }
    if raw.chars().count() > SUBJECT_ID_MAX {
        return Err(SubjectIdValidationError::TooLong {
            max: SUBJECT_ID_MAX,
        });
    }
    Ok(())
}

/// Identifier of a rider (the user requesting trips).
///
/// # Examples
/// ```
/// use dispatch_backend::domain::UserId;
///
/// let id = UserId::new("rider-42").expect("valid id");
/// assert_eq!(id.as_ref(), "rider-42");
/// assert!(UserId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct UserId(String);

impl UserId {
    /// Validate and construct a [`UserId`].
    pub fn new(id: impl Into<String>) -> Result<Self, SubjectIdValidationError> {
        let id = id.into();
        validate_subject_id(&id)?;
        Ok(Self(id))
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl TryFrom<String> for UserId {
    type Error = SubjectIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Identifier of a driver; unique within the driver registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct DriverId(String);

impl DriverId {
    /// Validate and construct a [`DriverId`].
    pub fn new(id: impl Into<String>) -> Result<Self, SubjectIdValidationError> {
        let id = id.into();
        validate_subject_id(&id)?;
        Ok(Self(id))
    }
}

impl AsRef<str> for DriverId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<DriverId> for String {
    fn from(value: DriverId) -> Self {
        value.0
    }
}

impl TryFrom<String> for DriverId {
    type Error = SubjectIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
