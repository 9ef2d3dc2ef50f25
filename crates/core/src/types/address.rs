//! Shipping address with field validation.

use serde::{Deserialize, Serialize};

use super::contact::{ContactError, PhoneNumber, PostalCode};

const MAX_FIELD_LENGTH: usize = 200;
const DEFAULT_COUNTRY: &str = "India";

/// Errors that can occur when validating an address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error(transparent)]
    Contact(#[from] ContactError),
}

/// Unvalidated address fields as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// A validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: PhoneNumber,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: PostalCode,
    pub country: String,
}

impl TryFrom<AddressInput> for ShippingAddress {
    type Error = AddressError;

    fn try_from(input: AddressInput) -> Result<Self, Self::Error> {
        Ok(Self {
            full_name: required("full_name", &input.full_name)?,
            phone: PhoneNumber::parse(&input.phone)?,
            line1: required("line1", &input.line1)?,
            line2: optional("line2", input.line2.as_deref())?,
            city: required("city", &input.city)?,
            state: required("state", &input.state)?,
            postal_code: PostalCode::parse(&input.postal_code)?,
            country: optional("country", input.country.as_deref())?
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_owned()),
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, AddressError> {
    optional(field, Some(value))?.ok_or(AddressError::Missing(field))
}

fn optional(field: &'static str, value: Option<&str>) -> Result<Option<String>, AddressError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(AddressError::TooLong(field));
    }
    Ok(Some(value.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: "  Lakshmi Rao ".into(),
            phone: "+91 98450 12345".into(),
            line1: "12, 4th Cross, Jayanagar".into(),
            line2: Some("   ".into()),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            postal_code: "560011".into(),
            country: None,
        }
    }

    #[test]
    fn test_valid_address_is_normalized() {
        let address = ShippingAddress::try_from(input()).unwrap();
        assert_eq!(address.full_name, "Lakshmi Rao");
        assert_eq!(address.phone.as_str(), "9845012345");
        assert_eq!(address.line2, None);
        assert_eq!(address.country, "India");
    }

    #[test]
    fn test_missing_field() {
        let mut bad = input();
        bad.city = " ".into();
        assert_eq!(
            ShippingAddress::try_from(bad),
            Err(AddressError::Missing("city"))
        );
    }

    #[test]
    fn test_invalid_pin() {
        let mut bad = input();
        bad.postal_code = "5600".into();
        assert_eq!(
            ShippingAddress::try_from(bad),
            Err(AddressError::Contact(ContactError::InvalidPostalCode))
        );
    }

    #[test]
    fn test_too_long() {
        let mut bad = input();
        bad.line1 = "x".repeat(201);
        assert_eq!(
            ShippingAddress::try_from(bad),
            Err(AddressError::TooLong("line1"))
        );
    }
}
