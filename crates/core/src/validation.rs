use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_email,
    r"[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+");
re!(re_dangerous, r#"[<>"';&|\\`]"#);
re!(re_upper, r"[A-Z]");
re!(re_lower, r"[a-z]");
re!(re_digit, r"[0-9]");
re!(re_symbol, r"[$@#!.]");

/// Minimum accepted password length, in UTF-16 code units.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("Password must not be empty")]
    Empty,
    #[error("Password must be at least 8 characters")]
    TooShort,
    #[error("Password must contain an uppercase letter")]
    MissingUppercase,
    #[error("Password must contain a lowercase letter")]
    MissingLowercase,
    #[error("Password must contain a digit")]
    MissingDigit,
    #[error("Password must contain a symbol ($, @, #, !, .)")]
    MissingSymbol,
    #[error("Passwords do not match")]
    Mismatch,
}

/// Unanchored: an address embedded in surrounding text also matches.
pub fn is_valid_email(email: &str) -> bool {
    re_email().is_match(email)
}

/// Rejects markup, quote, shell and backslash characters.
pub fn is_safe_input(input: &str) -> bool {
    !re_dangerous().is_match(input)
}

/// First failing password rule, checked in a fixed order.
pub fn password_error(password: &str) -> Option<PasswordError> {
    if password.trim().is_empty() {
        return Some(PasswordError::Empty);
    }
    if password.encode_utf16().count() < MIN_PASSWORD_LEN {
        return Some(PasswordError::TooShort);
    }
    if !re_upper().is_match(password) {
        return Some(PasswordError::MissingUppercase);
    }
    if !re_lower().is_match(password) {
        return Some(PasswordError::MissingLowercase);
    }
    if !re_digit().is_match(password) {
        return Some(PasswordError::MissingDigit);
    }
    if !re_symbol().is_match(password) {
        return Some(PasswordError::MissingSymbol);
    }
    None
}

pub fn confirm_password_error(password: &str, confirm: &str) -> Option<PasswordError> {
    (password != confirm).then_some(PasswordError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_formats() {
        assert!(is_valid_email("budi@example.co.id"));
        assert!(is_valid_email("first.last+tag@mail.com"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn dangerous_characters_rejected() {
        assert!(is_safe_input("Nasi Goreng Spesial"));
        assert!(!is_safe_input("<script>"));
        assert!(!is_safe_input("a; drop"));
        assert!(!is_safe_input("back`tick"));
        assert!(!is_safe_input(r"back\slash"));
    }

    #[test]
    fn password_rules_in_order() {
        assert_eq!(password_error("   "), Some(PasswordError::Empty));
        assert_eq!(password_error("Ab1!"), Some(PasswordError::TooShort));
        assert_eq!(password_error("abcdefg1!"), Some(PasswordError::MissingUppercase));
        assert_eq!(password_error("ABCDEFG1!"), Some(PasswordError::MissingLowercase));
        assert_eq!(password_error("Abcdefgh!"), Some(PasswordError::MissingDigit));
        assert_eq!(password_error("Abcdefg12"), Some(PasswordError::MissingSymbol));
        assert_eq!(password_error("Abcdefg1."), None);
    }

    #[test]
    fn only_ascii_digits_count() {
        assert_eq!(password_error("Abcdefg\u{0663}!"), Some(PasswordError::MissingDigit));
        assert_eq!(password_error("Abcdefg\u{FF11}!"), Some(PasswordError::MissingDigit));
    }

    #[test]
    fn length_is_measured_in_utf16_units() {
        // Two astral emoji are four units, so six chars reach the minimum.
        assert_eq!(password_error("Ab1!\u{1F600}\u{1F600}"), None);
        assert_eq!(password_error("Ab1!\u{E9}\u{E9}"), Some(PasswordError::TooShort));
    }

    #[test]
    fn confirmation_must_match() {
        assert_eq!(confirm_password_error("Secret1!", "Secret1!"), None);
        assert_eq!(
            confirm_password_error("Secret1!", "Secret2!"),
            Some(PasswordError::Mismatch)
        );
    }

    #[test]
    fn error_messages_are_readable() {
        assert_eq!(
            PasswordError::TooShort.to_string(),
            "Password must be at least 8 characters"
        );
    }
}
