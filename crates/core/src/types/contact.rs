//! Contact details: email addresses, Indian mobile numbers and PIN codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("email must be at most {max} characters")]
    EmailTooLong { max: usize },
    #[error("email must contain a single @ with text on both sides")]
    MalformedEmail,
    #[error("phone number must have 10 digits")]
    InvalidPhone,
    #[error("PIN code must be 6 digits and cannot start with 0")]
    InvalidPostalCode,
}

/// An email address, lowercased on parse.
///
/// ```
/// use milletmart_core::Email;
///
/// assert_eq!(Email::parse(" Ravi@Example.com ").unwrap().as_str(), "ravi@example.com");
/// assert!(Email::parse("ravi@").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns a [`ContactError`] if the input is empty, too long, or not of
    /// the form `local@domain`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::EmptyEmail);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let mut parts = s.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_lowercase()))
            }
            _ => Err(ContactError::MalformedEmail),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// A 10-digit Indian mobile number.
///
/// Accepts common input shapes (`+91 98765 43210`, `098765-43210`) and
/// stores the bare 10 digits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidPhone`] unless exactly 10 digits remain
    /// after stripping separators and an optional `+91`/`0` prefix.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        let trimmed = s.trim_start();

        let national = if trimmed.starts_with('+') && digits.len() == 12 {
            digits.strip_prefix("91")
        } else if digits.len() == 11 {
            digits.strip_prefix('0')
        } else {
            Some(digits.as_str())
        };

        match national {
            Some(n) if n.len() == 10 && !n.starts_with('0') => Ok(Self(n.to_owned())),
            _ => Err(ContactError::InvalidPhone),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A 6-digit Indian postal (PIN) code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Parse a PIN code. A single inner space (`560 001`) is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidPostalCode`] for anything else.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let compact: String = s.split_whitespace().collect();
        let valid = compact.len() == 6
            && compact.chars().all(|c| c.is_ascii_digit())
            && !compact.starts_with('0');
        if valid {
            Ok(Self(compact))
        } else {
            Err(ContactError::InvalidPostalCode)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("user+tag@sub.example.co.in").is_ok());
        assert_eq!(Email::parse("A@B.C").unwrap().as_str(), "a@b.c");
    }

    #[test]
    fn test_email_invalid() {
        assert_eq!(Email::parse("   "), Err(ContactError::EmptyEmail));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("@x.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c"), Err(ContactError::MalformedEmail));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(ContactError::EmailTooLong { .. })
        ));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(Email::parse("ravi@milletmart.in").unwrap().domain(), "milletmart.in");
    }

    #[test]
    fn test_email_deserialize_validates() {
        assert!(serde_json::from_str::<Email>("\"bad\"").is_err());
        let email: Email = serde_json::from_str("\"X@Y.in\"").unwrap();
        assert_eq!(email.as_str(), "x@y.in");
    }

    #[test]
    fn test_phone_shapes() {
        assert_eq!(PhoneNumber::parse("9876543210").unwrap().as_str(), "9876543210");
        assert_eq!(PhoneNumber::parse("+91 98765 43210").unwrap().as_str(), "9876543210");
        assert_eq!(PhoneNumber::parse("098765-43210").unwrap().as_str(), "9876543210");
    }

    #[test]
    fn test_phone_invalid() {
        assert!(PhoneNumber::parse("12345").is_err());
        assert!(PhoneNumber::parse("0123456789").is_err());
        assert!(PhoneNumber::parse("+1 415 555 0100").is_err());
    }

    #[test]
    fn test_postal_code() {
        assert_eq!(PostalCode::parse("560 001").unwrap().as_str(), "560001");
        assert!(PostalCode::parse("056001").is_err());
        assert!(PostalCode::parse("5600").is_err());
        assert!(PostalCode::parse("56000a").is_err());
    }
}
