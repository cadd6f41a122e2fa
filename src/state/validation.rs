// SPDX-License-Identifier: MPL-2.0

use crate::config::MIN_PASSWORD_LEN;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("invalid username pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("Username must be 3-32 letters, digits or underscores")]
    InvalidUsername,
    #[error("You cannot add yourself as a friend")]
    SelfFriendship,
}

/// Trimmed name, or None when nothing is left
pub fn normalize_name(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn validate_password_change(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

pub fn validate_username(input: &str) -> Result<String, ValidationError> {
    let username = input.trim();
    if USERNAME_RE.is_match(username) {
        Ok(username.to_string())
    } else {
        Err(ValidationError::InvalidUsername)
    }
}

/// Avatar placeholder text: first two graphemes of the name, upper-cased
pub fn initials(name: &str) -> String {
    let letters: String = name.trim().graphemes(true).take(2).collect();
    if letters.is_empty() {
        "U".to_string()
    } else {
        letters.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  general  "), Some("general".to_string()));
        assert_eq!(normalize_name(" \t\n"), None);
        assert_eq!(normalize_name(""), None);
    }

    #[test]
    fn test_password_change() {
        assert_eq!(validate_password_change("secret1", "secret1"), Ok(()));
        assert_eq!(
            validate_password_change("secret1", "secret2"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_password_change("abc", "abc"),
            Err(ValidationError::PasswordTooShort(6))
        );
    }

    #[test]
    fn test_mismatch_reported_before_length() {
        assert_eq!(
            validate_password_change("a", "b"),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn test_username() {
        assert_eq!(validate_username(" alice_01 "), Ok("alice_01".to_string()));
        assert!(validate_username("al").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("dash-ed").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("alice"), "AL");
        assert_eq!(initials("  z"), "Z");
        assert_eq!(initials(""), "U");
        // Combining marks stay with their base letter
        assert_eq!(initials("e\u{301}lan"), "E\u{301}L");
    }
}
