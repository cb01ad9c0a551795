//! E.164 phone number value object.
//!
//! The phone number is the subscriber's stable external identity. It is
//! normalized once at the boundary and immutable afterwards.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

static E164: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("E.164 pattern compiles"));

/// A phone number normalized to E.164 (`+` followed by up to 15 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parses and normalizes a phone number.
    ///
    /// Spaces, dashes, dots and parentheses are stripped before validation,
    /// so `+1 (555) 000-1111` normalizes to `+15550001111`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("phone"));
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        if !E164.is_match(&normalized) {
            return Err(ValidationError::invalid_format(
                "phone",
                "expected E.164 format, e.g. +15550001111",
            ));
        }

        Ok(Self(normalized))
    }

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
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_plain_e164() {
        let phone = PhoneNumber::parse("+15550001111").unwrap();
        assert_eq!(phone.as_str(), "+15550001111");
    }

    #[test]
    fn strips_formatting_characters() {
        let phone = PhoneNumber::parse(" +1 (555) 000-1111 ").unwrap();
        assert_eq!(phone.as_str(), "+15550001111");
    }

    #[test]
    fn rejects_missing_plus() {
        assert!(PhoneNumber::parse("15550001111").is_err());
    }

    #[test]
    fn rejects_leading_zero_country_code() {
        assert!(PhoneNumber::parse("+05550001111").is_err());
    }

    #[test]
    fn rejects_letters() {
        assert!(PhoneNumber::parse("+1555CALLNOW").is_err());
    }

    #[test]
    fn rejects_more_than_fifteen_digits() {
        assert!(PhoneNumber::parse("+1234567890123456").is_err());
    }

    #[test]
    fn rejects_empty_input_as_empty_field() {
        assert_eq!(
            PhoneNumber::parse("   "),
            Err(ValidationError::empty_field("phone"))
        );
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: Result<PhoneNumber, _> = serde_json::from_str("\"+447700900123\"");
        assert!(ok.is_ok());
        let bad: Result<PhoneNumber, _> = serde_json::from_str("\"0044\"");
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn any_well_formed_number_is_accepted(first in 1u8..=9, rest in "[0-9]{1,14}") {
            let raw = format!("+{}{}", first, rest);
            let parsed = PhoneNumber::parse(&raw).unwrap();
            prop_assert_eq!(parsed.as_str(), raw.as_str());
        }

        #[test]
        fn normalization_is_idempotent(first in 1u8..=9, rest in "[0-9]{1,14}") {
            let raw = format!("+{} {}", first, rest);
            let once = PhoneNumber::parse(&raw).unwrap();
            let twice = PhoneNumber::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
