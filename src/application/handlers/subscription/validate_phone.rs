//! ValidatePhoneHandler - local syntax check before subscribing.

use serde::Serialize;

use crate::domain::subscription::PhoneNumber;

#[derive(Debug, Clone)]
pub struct ValidatePhoneCommand {
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneValidation {
    pub valid: bool,
    /// Normalized E.164 form when valid.
    pub normalized: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatePhoneHandler;

impl ValidatePhoneHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, cmd: ValidatePhoneCommand) -> PhoneValidation {
        match PhoneNumber::parse(&cmd.phone) {
            Ok(phone) => PhoneValidation {
                valid: true,
                normalized: Some(phone.as_str().to_string()),
                message: "Phone valid. Proceed to subscribe.".to_string(),
            },
            Err(_) => PhoneValidation {
                valid: false,
                normalized: None,
                message: "Invalid phone format".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn check(raw: &str) -> PhoneValidation {
        ValidatePhoneHandler::new().handle(ValidatePhoneCommand {
            phone: raw.to_string(),
        })
    }

    #[test]
    fn accepts_formatted_number() {
        let result = check("+1 (555) 000-1111");
        assert!(result.valid);
        assert_eq!(result.normalized.as_deref(), Some("+15550001111"));
        assert_eq!(result.message, "Phone valid. Proceed to subscribe.");
    }

    #[test]
    fn rejects_missing_plus() {
        let result = check("15550001111");
        assert!(!result.valid);
        assert_eq!(result.message, "Invalid phone format");
    }

    #[test]
    fn rejects_blank() {
        assert!(!check("  ").valid);
    }

    proptest! {
        #[test]
        fn any_e164_digits_are_valid(first in 1u8..=9, rest in "[0-9]{1,14}") {
            let raw = format!("+{}{}", first, rest);
            let result = check(&raw);
            prop_assert!(result.valid);
            prop_assert_eq!(result.normalized, Some(raw));
        }

        #[test]
        fn letters_are_never_valid(s in "\\+[0-9]{0,5}[a-zA-Z]{1,3}[0-9]{0,5}") {
            prop_assert!(!check(&s).valid);
        }
    }
}
